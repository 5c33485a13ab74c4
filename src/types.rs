//! Data structures shared by the query, format and publish stages.
//!
//! An [`EndpointConfig`] is produced once by the registry and never
//! changes afterwards.  A [`Snapshot`] is created fresh every cycle by
//! the poller and dropped as soon as it has been formatted; nothing here
//! is persisted except the endpoint key, which the ledger uses.

use std::fmt;

/// One monitored game server.
///
/// Identity is `host:port` (see [`EndpointConfig::key`]), never the
/// display name, which may be missing or shared between entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
    pub name: Option<String>,
    /// Channel the status card is published to.  Endpoints without one
    /// are still queried but never published.
    pub channel_id: Option<String>,
}

impl EndpointConfig {
    pub fn key(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}:{})",
            self.name.as_deref().unwrap_or("Unnamed"),
            self.host,
            self.port
        )
    }
}

/// Live details reported by a reachable server.
///
/// Text fields are `None` when the server left them blank; the formatter
/// renders those as "Unknown".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OnlineStatus {
    pub server_name: Option<String>,
    pub map_name: Option<String>,
    pub mission: Option<String>,
    pub current_players: u32,
    pub max_players: u32,
    pub ping_ms: Option<u64>,
    pub passworded: bool,
    pub version: Option<String>,
    pub connect_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerStatus {
    Online(OnlineStatus),
    Offline,
}

/// Result of probing one endpoint during one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub endpoint: EndpointConfig,
    pub status: ServerStatus,
}

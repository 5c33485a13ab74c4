//! Outbound game server queries.
//!
//! The poller only depends on the [`ServerQuery`] trait; the concrete
//! wire protocol lives in a submodule.

use async_trait::async_trait;
use thiserror::Error;

pub mod steam;
pub use steam::A2sQuery;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query failed: {0}")]
    Protocol(String),
    #[error("query timed out")]
    Timeout,
    #[error("query port for game port {0} is out of range")]
    PortOutOfRange(u16),
}

/// Server state as reported by the remote end.
///
/// Fields are taken over verbatim, so text may be empty and the ping may
/// be missing; turning that into typed values is the poller's job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerState {
    pub name: String,
    pub map: String,
    pub numplayers: u32,
    pub maxplayers: u32,
    pub ping: Option<u64>,
    pub password: bool,
    pub version: String,
    /// Address players use to join, `host:port`.
    pub connect: String,
    /// Free-form game description; Arma 3 puts the mission name here.
    pub game: String,
}

#[async_trait]
pub trait ServerQuery: Send + Sync {
    /// Query the server whose game port is `port` on `host`.
    async fn query(&self, host: &str, port: u16) -> Result<ServerState, QueryError>;
}

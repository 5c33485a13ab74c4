use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const ARMA3_LOGO: &str = "https://arma3.com/assets/img/logos/arma3.png";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Figment(#[from] figment::Error),
    #[error("SERVERS is not a valid JSON array of servers: {0}")]
    Servers(#[from] serde_json::Error),
    #[error("DISCORD_TOKEN is not set")]
    MissingToken,
    #[error("update interval must be at least one minute")]
    ZeroInterval,
    #[error("{0} server entries are missing required fields")]
    InvalidServers(usize),
}

/// A server entry as written by the operator.
///
/// Every field is optional here so the registry can report exactly what
/// is missing instead of failing on the first deserialization error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawEndpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        rename = "channelId",
        alias = "channel_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub channel_id: Option<String>,
}

#[derive(Clone, Deserialize, Serialize)]
pub struct Config {
    pub discord_token: String,
    pub update_interval_minutes: u64,
    pub post_id_file: PathBuf,
    /// Added to each server's game port to obtain its query port.
    pub query_port_offset: u16,
    pub query_timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub servers: Vec<RawEndpoint>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            update_interval_minutes: 5,
            post_id_file: PathBuf::from("./post_id.json"),
            query_port_offset: 1,
            query_timeout_ms: 2000,
            thumbnail_url: Some(ARMA3_LOGO.into()),
            servers: Vec::new(),
        }
    }
}

// Hand-written so the bot token never ends up in a log line.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"<redacted>")
            .field("update_interval_minutes", &self.update_interval_minutes)
            .field("post_id_file", &self.post_id_file)
            .field("query_port_offset", &self.query_port_offset)
            .field("query_timeout_ms", &self.query_timeout_ms)
            .field("thumbnail_url", &self.thumbnail_url)
            .field("servers", &self.servers.len())
            .finish()
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let mut config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("gamestatus.toml"))
            .merge(Json::file("gamestatus.json"))
            .merge(Env::raw().only(&[
                "DISCORD_TOKEN",
                "UPDATE_INTERVAL_MINUTES",
                "POST_ID_FILE",
            ]))
            .merge(Env::prefixed("GAMESTATUS_"))
            .extract()?;

        // SERVERS carries a JSON document, which figment's env parser
        // does not understand.
        if let Ok(raw) = std::env::var("SERVERS") {
            if !raw.trim().is_empty() {
                config.servers = serde_json::from_str(&raw)?;
            }
        }

        if config.discord_token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if config.update_interval_minutes == 0 {
            return Err(ConfigError::ZeroInterval);
        }

        Ok(config)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_minutes * 60)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

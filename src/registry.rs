//! Validation of the configured server list.
//!
//! The registry turns raw operator entries into [`EndpointConfig`]s once
//! at startup.  Entries without a host or port are fatal, and so is a
//! second entry for the same `host:port`, since both would share one
//! ledger key.  Missing names and channels only produce warnings.

use std::collections::HashMap;

use log::{error, info, warn};

use crate::config::{ConfigError, RawEndpoint};
use crate::types::EndpointConfig;

/// Validate every raw entry, preserving order.
///
/// All entries are checked before failing so the operator sees every
/// broken one in a single run.
pub fn load(raw: &[RawEndpoint]) -> Result<Vec<EndpointConfig>, ConfigError> {
    if raw.is_empty() {
        warn!("No servers configured in SERVERS environment variable.");
        return Ok(Vec::new());
    }

    let mut endpoints = Vec::with_capacity(raw.len());
    let mut invalid = 0;
    let mut seen = HashMap::new();

    for (idx, entry) in raw.iter().enumerate() {
        let host = entry
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty());
        let port = entry.port.filter(|p| *p != 0);

        let (host, port) = match (host, port) {
            (Some(host), Some(port)) => (host.to_string(), port),
            (host, port) => {
                if host.is_none() {
                    error!("Server at index {} missing required field \"host\"", idx);
                }
                if port.is_none() {
                    error!("Server at index {} missing required field \"port\"", idx);
                }
                invalid += 1;
                continue;
            }
        };

        let key = format!("{}:{}", host, port);
        if let Some(first) = seen.get(&key) {
            error!(
                "Server at index {} duplicates {} already configured at index {}",
                idx, key, first
            );
            invalid += 1;
            continue;
        }
        seen.insert(key, idx);

        let name = non_blank(&entry.name);
        let channel_id = non_blank(&entry.channel_id);
        if name.is_none() {
            warn!(
                "Server at index {} ({}:{}) missing \"name\" field",
                idx, host, port
            );
        }
        if channel_id.is_none() {
            warn!(
                "Server at index {} ({}:{}) missing \"channelId\" - will be skipped",
                idx, host, port
            );
        }

        let endpoint = EndpointConfig {
            host,
            port,
            name,
            channel_id,
        };
        info!("✓ Server {}: {}", idx + 1, endpoint);
        endpoints.push(endpoint);
    }

    if invalid > 0 {
        return Err(ConfigError::InvalidServers(invalid));
    }
    Ok(endpoints)
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

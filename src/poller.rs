//! Concurrent status polling.

use futures_util::future::join_all;
use log::{info, warn};

use crate::query::{ServerQuery, ServerState};
use crate::types::{EndpointConfig, OnlineStatus, ServerStatus, Snapshot};

pub struct Poller<Q> {
    query: Q,
}

impl<Q: ServerQuery> Poller<Q> {
    pub fn new(query: Q) -> Self {
        Self { query }
    }

    /// Query every endpoint concurrently.
    ///
    /// Returns one snapshot per endpoint, in input order.  A failed query
    /// becomes an `Offline` snapshot and never affects the other endpoints.
    pub async fn poll_all(&self, endpoints: &[EndpointConfig]) -> Vec<Snapshot> {
        if endpoints.is_empty() {
            return Vec::new();
        }
        info!("Querying {} servers...", endpoints.len());
        join_all(endpoints.iter().map(|endpoint| self.poll(endpoint))).await
    }

    async fn poll(&self, endpoint: &EndpointConfig) -> Snapshot {
        let status = match self.query.query(&endpoint.host, endpoint.port).await {
            Ok(state) => {
                let online = into_online(state);
                info!(
                    "{} is online: {}/{} players",
                    endpoint, online.current_players, online.max_players
                );
                ServerStatus::Online(online)
            }
            Err(e) => {
                warn!("{} is offline: {}", endpoint, e);
                ServerStatus::Offline
            }
        };
        Snapshot {
            endpoint: endpoint.clone(),
            status,
        }
    }
}

fn into_online(state: ServerState) -> OnlineStatus {
    OnlineStatus {
        server_name: present(state.name),
        map_name: present(state.map),
        mission: present(state.game),
        current_players: state.numplayers,
        max_players: state.maxplayers,
        // A zero round-trip means the collaborator did not measure it.
        ping_ms: state.ping.filter(|ping| *ping > 0),
        passworded: state.password,
        version: present(state.version),
        connect_address: state.connect,
    }
}

fn present(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

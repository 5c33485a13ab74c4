use super::{QueryError, ServerQuery, ServerState};
use a2s::info::Info;
use a2s::A2SClient;
use async_trait::async_trait;
use log::debug;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// Steam A2S_INFO client.
///
/// Arma 3 answers queries on the game port plus `port_offset`.
pub struct A2sQuery {
    timeout: Duration,
    port_offset: u16,
}

impl A2sQuery {
    pub fn new(timeout: Duration, port_offset: u16) -> Self {
        Self {
            timeout,
            port_offset,
        }
    }
}

#[async_trait]
impl ServerQuery for A2sQuery {
    async fn query(&self, host: &str, port: u16) -> Result<ServerState, QueryError> {
        let query_port = port
            .checked_add(self.port_offset)
            .ok_or(QueryError::PortOutOfRange(port))?;
        // One socket per query so concurrent queries never share replies.
        let client = A2SClient::new()
            .await
            .map_err(|e| QueryError::Protocol(e.to_string()))?;

        let started = Instant::now();
        let info = timeout(self.timeout, client.info((host, query_port)))
            .await
            .map_err(|_| QueryError::Timeout)?
            .map_err(|e| QueryError::Protocol(e.to_string()))?;
        let ping = started.elapsed().as_millis() as u64;
        debug!("{}:{} answered in {}ms", host, query_port, ping);

        Ok(into_state(info, host, port, ping))
    }
}

fn into_state(info: Info, host: &str, port: u16, ping: u64) -> ServerState {
    let game_port = info.extended_server_info.port.unwrap_or(port);
    ServerState {
        name: info.name,
        map: info.map,
        numplayers: u32::from(info.players),
        maxplayers: u32::from(info.max_players),
        ping: Some(ping),
        password: info.visibility,
        version: info.version,
        connect: format!("{}:{}", host, game_port),
        game: info.game,
    }
}

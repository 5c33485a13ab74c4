//! Rendering of snapshots into status cards.
//!
//! [`DisplayPayload`] mirrors a Discord embed; the publisher turns it
//! into the wire form.

use chrono::{SecondsFormat, Utc};
use rand::Rng;

use crate::types::{OnlineStatus, ServerStatus, Snapshot};

pub const OFFLINE_COLOR: u32 = 0xff0000;
const UNKNOWN: &str = "Unknown";
const UNKNOWN_SERVER: &str = "Unknown Server";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayPayload {
    pub title: String,
    pub description: Option<String>,
    pub color: u32,
    pub thumbnail: Option<Thumbnail>,
    pub fields: Vec<Field>,
    pub footer: Footer,
    pub timestamp: String,
}

impl DisplayPayload {
    #[cfg(test)]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footer {
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct Formatter {
    thumbnail_url: Option<String>,
}

impl Formatter {
    pub fn new(thumbnail_url: Option<String>) -> Self {
        Self {
            thumbnail_url: thumbnail_url.filter(|url| !url.is_empty()),
        }
    }

    /// Render a snapshot.  Total: absent values show up as "Unknown".
    pub fn format(&self, snapshot: &Snapshot) -> DisplayPayload {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        match &snapshot.status {
            ServerStatus::Offline => DisplayPayload {
                title: snapshot
                    .endpoint
                    .name
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_SERVER.into()),
                description: Some("Status: 🔴 Offline".into()),
                color: OFFLINE_COLOR,
                thumbnail: None,
                fields: Vec::new(),
                footer: Footer {
                    text: format!("IP: {}", snapshot.endpoint.key()),
                },
                timestamp,
            },
            ServerStatus::Online(online) => DisplayPayload {
                title: online
                    .server_name
                    .clone()
                    .or_else(|| snapshot.endpoint.name.clone())
                    .unwrap_or_else(|| UNKNOWN_SERVER.into()),
                description: None,
                color: rand::thread_rng().gen_range(0..=0xffffff),
                thumbnail: self.thumbnail_url.clone().map(|url| Thumbnail { url }),
                fields: online_fields(online),
                footer: Footer {
                    text: format!("IP: {}", online.connect_address),
                },
                timestamp,
            },
        }
    }
}

fn online_fields(online: &OnlineStatus) -> Vec<Field> {
    vec![
        field("🔱 Mission", or_unknown(&online.mission), false),
        field("🗺️ Map", or_unknown(&online.map_name), true),
        field(
            "👥 Players",
            format!("{}/{}", online.current_players, online.max_players),
            true,
        ),
        field(
            "⚡ Ping",
            online
                .ping_ms
                .map(|ms| format!("{} ms", ms))
                .unwrap_or_else(|| UNKNOWN.into()),
            true,
        ),
        field(
            "🔐 Password",
            if online.passworded { "Yes" } else { "No" }.into(),
            true,
        ),
        field("🔰 Game Version", or_unknown(&online.version), true),
    ]
}

fn field(name: &str, value: String, inline: bool) -> Field {
    Field {
        name: name.into(),
        value,
        inline,
    }
}

fn or_unknown(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| UNKNOWN.into())
}

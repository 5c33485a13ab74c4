//! Outbound publishing of status cards.
//!
//! The reconciler talks to the messaging platform only through the
//! [`Publisher`] trait so it can be driven by an in-memory fake in tests.

use async_trait::async_trait;
use thiserror::Error;

use crate::format::DisplayPayload;

pub mod discord;
pub use discord::DiscordPublisher;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("discord request failed: {0}")]
    Discord(#[from] serenity::Error),
    #[error("not found")]
    NotFound,
    #[error("{0:?} is not a valid snowflake id")]
    InvalidId(String),
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Check that `channel_id` exists and is visible to us.
    async fn fetch_channel(&self, channel_id: &str) -> Result<(), PublishError>;

    /// Check that a previously sent message still exists.
    async fn fetch_message(&self, channel_id: &str, message_id: &str)
        -> Result<(), PublishError>;

    /// Replace the content of an existing message.
    async fn edit(
        &self,
        channel_id: &str,
        message_id: &str,
        payload: &DisplayPayload,
    ) -> Result<(), PublishError>;

    /// Post a new message and return its id.
    async fn send(&self, channel_id: &str, payload: &DisplayPayload)
        -> Result<String, PublishError>;
}

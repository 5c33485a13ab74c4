use super::{PublishError, Publisher};
use crate::format::DisplayPayload;
use async_trait::async_trait;
use log::warn;
use serenity::all::{
    ChannelId, CreateEmbed, CreateEmbedFooter, CreateMessage, EditMessage, Http, MessageId,
    Timestamp,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

const MAX_ATTEMPTS: u32 = 3;
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(1);

/// Publishes status cards through serenity's HTTP client.
///
/// Serenity's ratelimiter already waits out most 429s; any that still
/// surface are retried here, so a rate-limited edit is never mistaken for
/// a deleted message.
pub struct DiscordPublisher {
    http: Arc<Http>,
    backoff: Duration,
}

impl DiscordPublisher {
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            backoff: RATE_LIMIT_BACKOFF,
        }
    }

    #[cfg(test)]
    fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    async fn retrying<T, F, Fut>(&self, mut call: F) -> Result<T, PublishError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = serenity::Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if status_of(&e) == Some(429) && attempt < MAX_ATTEMPTS => {
                    warn!("Rate limited by Discord (attempt {}), retrying", attempt);
                    sleep(self.backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) if status_of(&e) == Some(404) => return Err(PublishError::NotFound),
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn status_of(err: &serenity::Error) -> Option<u16> {
    match err {
        serenity::Error::Http(http) => http.status_code().map(|status| status.as_u16()),
        _ => None,
    }
}

fn snowflake(id: &str) -> Result<u64, PublishError> {
    id.trim()
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| PublishError::InvalidId(id.to_string()))
}

fn channel(id: &str) -> Result<ChannelId, PublishError> {
    snowflake(id).map(ChannelId::new)
}

fn message(id: &str) -> Result<MessageId, PublishError> {
    snowflake(id).map(MessageId::new)
}

fn embed(payload: &DisplayPayload) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(&payload.title)
        .colour(payload.color)
        .footer(CreateEmbedFooter::new(&payload.footer.text));
    if let Some(description) = &payload.description {
        embed = embed.description(description);
    }
    if let Some(thumbnail) = &payload.thumbnail {
        embed = embed.thumbnail(&thumbnail.url);
    }
    for field in &payload.fields {
        embed = embed.field(&field.name, &field.value, field.inline);
    }
    if let Ok(timestamp) = Timestamp::parse(&payload.timestamp) {
        embed = embed.timestamp(timestamp);
    }
    embed
}

#[async_trait]
impl Publisher for DiscordPublisher {
    async fn fetch_channel(&self, channel_id: &str) -> Result<(), PublishError> {
        let channel = channel(channel_id)?;
        let http: &Http = &self.http;
        self.retrying(move || http.get_channel(channel)).await?;
        Ok(())
    }

    async fn fetch_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), PublishError> {
        let (channel, message) = (channel(channel_id)?, message(message_id)?);
        let http: &Http = &self.http;
        self.retrying(move || channel.message(http, message)).await?;
        Ok(())
    }

    async fn edit(
        &self,
        channel_id: &str,
        message_id: &str,
        payload: &DisplayPayload,
    ) -> Result<(), PublishError> {
        let (channel, message) = (channel(channel_id)?, message(message_id)?);
        let http: &Http = &self.http;
        self.retrying(move || {
            channel.edit_message(http, message, EditMessage::new().embed(embed(payload)))
        })
        .await?;
        Ok(())
    }

    async fn send(
        &self,
        channel_id: &str,
        payload: &DisplayPayload,
    ) -> Result<String, PublishError> {
        let channel = channel(channel_id)?;
        let http: &Http = &self.http;
        let sent = self
            .retrying(move || {
                channel.send_message(http, CreateMessage::new().embed(embed(payload)))
            })
            .await?;
        Ok(sent.id.to_string())
    }
}

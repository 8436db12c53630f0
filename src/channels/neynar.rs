//! Farcaster access through the Neynar HTTP API.
//!
//! One client covers all three platform calls the bot makes: publishing a
//! reply cast, reading the channel feed for the poller and checking that
//! the signer is approved.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::channels::poller::FeedSource;
use crate::channels::publisher::Publisher;
use crate::config::BotConfig;
use crate::error::ChannelError;
use crate::pipeline::Event;

pub struct NeynarClient {
    client: reqwest::Client,
    api_key: SecretString,
    signer_uuid: String,
    base_url: String,
    channel_id: String,
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    casts: Vec<Cast>,
}

#[derive(Debug, Deserialize)]
struct Cast {
    hash: String,
    #[serde(default)]
    text: String,
    timestamp: Option<String>,
    author: Option<CastAuthor>,
}

#[derive(Debug, Deserialize)]
struct CastAuthor {
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignerResponse {
    status: String,
}

impl NeynarClient {
    pub fn new(
        api_key: SecretString,
        signer_uuid: String,
        config: &BotConfig,
    ) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| ChannelError::Http(format!("failed to build client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            signer_uuid,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            channel_id: config.channel_id.clone(),
        })
    }

    /// Whether the signer may publish. Polling is skipped when it may not.
    pub async fn signer_approved(&self) -> Result<bool, ChannelError> {
        let url = format!("{}/signer", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .query(&[("signer_uuid", self.signer_uuid.as_str())])
            .send()
            .await
            .map_err(|e| ChannelError::Http(format!("signer lookup failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChannelError::Http(format!(
                "signer lookup returned {status}: {body}"
            )));
        }

        let signer: SignerResponse = resp
            .json()
            .await
            .map_err(|e| ChannelError::InvalidPayload(format!("signer response: {e}")))?;
        debug!(status = %signer.status, "Signer status");
        Ok(signer.status == "approved")
    }
}

fn cast_to_event(cast: Cast) -> Event {
    let timestamp = cast
        .timestamp
        .as_deref()
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(|| {
            warn!(hash = %cast.hash, "Cast without a usable timestamp, using now");
            Utc::now()
        });

    let event = Event::new(cast.hash, cast.text, timestamp);
    match cast.author.and_then(|a| a.username) {
        Some(username) => event.with_author(username),
        None => event,
    }
}

#[async_trait]
impl FeedSource for NeynarClient {
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<Event>, ChannelError> {
        let url = format!("{}/feed", self.base_url);
        let limit = limit.to_string();
        let resp = self
            .client
            .get(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .query(&[
                ("feed_type", "filter"),
                ("filter_type", "channel_id"),
                ("channel_id", self.channel_id.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ChannelError::Http(format!("feed fetch failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChannelError::Http(format!("feed returned {status}: {body}")));
        }

        let feed: FeedResponse = resp
            .json()
            .await
            .map_err(|e| ChannelError::InvalidPayload(format!("feed response: {e}")))?;
        Ok(feed.casts.into_iter().map(cast_to_event).collect())
    }
}

#[async_trait]
impl Publisher for NeynarClient {
    async fn publish(&self, text: &str, in_reply_to: &str) -> Result<(), ChannelError> {
        let url = format!("{}/cast", self.base_url);
        let body = serde_json::json!({
            "signer_uuid": self.signer_uuid,
            "text": text,
            "parent": in_reply_to,
            "channel_id": self.channel_id,
        });

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                in_reply_to: in_reply_to.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                in_reply_to: in_reply_to.to_string(),
                reason: format!("{status}: {body}"),
            });
        }
        Ok(())
    }
}

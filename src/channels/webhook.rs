//! Push ingress: platform webhook payloads normalized to [`Event`]s.
//!
//! A payload names its platform in `platform`. Without one it is read as a
//! Farcaster event, and additionally as a Twitter mention when it carries
//! the tweet fields (`data.id`, `data.text`, `data.author_id`).

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::ValidationError;
use crate::pipeline::{Event, Platform};

/// The only Farcaster event type the bot acts on.
pub const CAST_CREATED: &str = "cast.created";

/// Placeholder id some senders use when the hash is missing. Never processed.
const UNKNOWN_HASH: &str = "unknown-hash";

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub data: WebhookData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookData {
    pub hash: Option<String>,
    pub id: Option<String>,
    pub text: Option<String>,
    pub timestamp: Option<String>,
    /// Either a username string or a user object with a `username` field.
    pub author: Option<Value>,
    /// Twitter user id of the mention's author.
    pub author_id: Option<String>,
}

impl WebhookPayload {
    /// The declared platform. Unrecognised values count as undeclared.
    pub fn platform(&self) -> Option<Platform> {
        let raw = self.platform.as_deref()?;
        match raw.parse() {
            Ok(platform) => Some(platform),
            Err(e) => {
                warn!(error = %e, "Ignoring webhook platform field");
                None
            }
        }
    }

    /// Every event this payload describes, each either usable or invalid.
    ///
    /// Ignored Farcaster event types contribute nothing.
    pub fn into_events(self) -> Vec<Result<Event, ValidationError>> {
        match self.platform() {
            Some(Platform::Twitter) => vec![self.data.mention()],
            Some(Platform::Farcaster) => self.cast_event().into_iter().collect(),
            None => {
                let mut events: Vec<_> = self.cast_event().into_iter().collect();
                if self.data.looks_like_mention() {
                    events.push(self.data.mention());
                }
                events
            }
        }
    }

    /// `None` for event types the bot ignores.
    fn cast_event(&self) -> Option<Result<Event, ValidationError>> {
        if self.event_type != CAST_CREATED {
            return None;
        }
        Some(self.data.cast())
    }
}

impl WebhookData {
    fn cast(&self) -> Result<Event, ValidationError> {
        let id = self
            .hash
            .as_deref()
            .or(self.id.as_deref())
            .map(str::trim)
            .filter(|id| !id.is_empty() && *id != UNKNOWN_HASH)
            .ok_or_else(|| ValidationError::InvalidPayload("cast has no hash or id".into()))?;

        let author = self.author.as_ref().and_then(|author| match author {
            Value::String(name) => Some(name.clone()),
            Value::Object(map) => map
                .get("username")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        });

        let event = Event::new(id, self.text.clone().unwrap_or_default(), self.timestamp());
        Ok(match author {
            Some(author) => event.with_author(author),
            None => event,
        })
    }

    fn mention(&self) -> Result<Event, ValidationError> {
        let id = self.id.as_deref().map(str::trim).filter(|id| !id.is_empty());
        let text = self.text.as_deref().filter(|t| !t.trim().is_empty());
        let (Some(id), Some(text)) = (id, text) else {
            return Err(ValidationError::InvalidPayload(
                "twitter mention needs an id and text".into(),
            ));
        };

        let event = Event::new(id, text, self.timestamp()).with_platform(Platform::Twitter);
        Ok(match &self.author_id {
            Some(author_id) => event.with_author(author_id.clone()),
            None => event,
        })
    }

    /// Undeclared payloads only count as tweets when they carry an author id,
    /// which casts never do.
    fn looks_like_mention(&self) -> bool {
        self.id.is_some() && self.text.is_some() && self.author_id.is_some()
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc))
            .unwrap_or_else(Utc::now)
    }
}

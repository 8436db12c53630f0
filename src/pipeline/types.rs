//! Canonical event and outcome types shared by every ingress adapter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Social network an event came from and its reply goes back to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Farcaster,
    Twitter,
}

impl Platform {
    pub fn label(self) -> &'static str {
        match self {
            Platform::Farcaster => "farcaster",
            Platform::Twitter => "twitter",
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "farcaster" => Ok(Platform::Farcaster),
            "twitter" => Ok(Platform::Twitter),
            other => Err(format!("unknown platform '{other}'")),
        }
    }
}

/// A normalized bot invocation, whatever path it arrived by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Platform-assigned id: a cast hash or a tweet id.
    pub id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub platform: Platform,
}

impl Event {
    pub fn new(id: impl Into<String>, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            timestamp,
            author: None,
            platform: Platform::Farcaster,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Key in the processed-id set. Cast hashes are stored bare so existing
    /// snapshots stay valid; other platforms are namespaced.
    pub fn dedup_key(&self) -> String {
        match self.platform {
            Platform::Farcaster => self.id.clone(),
            Platform::Twitter => format!("twitter:{}", self.id),
        }
    }
}

/// Which adapter delivered an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    Webhook,
    Poll,
}

impl EventSource {
    pub fn label(self) -> &'static str {
        match self {
            EventSource::Webhook => "webhook",
            EventSource::Poll => "poll",
        }
    }
}

/// What happened to one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// A reading was generated and handed to the publisher.
    Published,
    /// Not addressed to the bot.
    NotInvocation,
    /// No publisher is configured for the event's platform. Nothing was claimed.
    NoPublisher,
    /// Another delivery of this id already claimed it.
    Duplicate,
    /// Dropped by the global debounce; the claim was released.
    RateLimited,
    /// Generation or publishing failed. The id stays claimed.
    Failed(String),
}

impl ProcessOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ProcessOutcome::Published => "published",
            ProcessOutcome::NotInvocation => "not_invocation",
            ProcessOutcome::NoPublisher => "no_publisher",
            ProcessOutcome::Duplicate => "duplicate",
            ProcessOutcome::RateLimited => "rate_limited",
            ProcessOutcome::Failed(_) => "failed",
        }
    }
}

/// Wire shape of a finished reading on the HTTP API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingResponse {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl From<&crate::tarot::Reading> for ReadingResponse {
    fn from(reading: &crate::tarot::Reading) -> Self {
        Self {
            text: reading.text(),
            image_url: reading.image_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_round_trips_with_iso_timestamp() {
        let raw = r#"{"id":"0xabc","text":"@pentacle-tarot hi","timestamp":"2025-01-02T03:04:05Z"}"#;
        let event: Event = serde_json::from_str(raw).unwrap();
        assert_eq!(event.id, "0xabc");
        assert_eq!(event.timestamp.to_rfc3339(), "2025-01-02T03:04:05+00:00");
        assert!(event.author.is_none());
        assert_eq!(event.platform, Platform::Farcaster);
    }

    #[test]
    fn tweets_get_a_namespaced_dedup_key() {
        let cast = Event::new("123", "hi", Utc::now());
        assert_eq!(cast.dedup_key(), "123");

        let tweet = Event::new("123", "hi", Utc::now())
            .with_platform(Platform::Twitter)
            .with_author("42");
        assert_eq!(tweet.dedup_key(), "twitter:123");
        assert_eq!(tweet.author.as_deref(), Some("42"));
    }

    #[test]
    fn platform_parses_case_insensitively() {
        assert_eq!("Twitter".parse::<Platform>(), Ok(Platform::Twitter));
        assert_eq!(" farcaster".parse::<Platform>(), Ok(Platform::Farcaster));
        assert!("lens".parse::<Platform>().is_err());
    }

    #[test]
    fn reading_response_uses_camel_case() {
        let resp = ReadingResponse {
            text: "t".into(),
            image_url: Some("u".into()),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["imageUrl"], "u");

        let resp = ReadingResponse {
            text: "t".into(),
            image_url: None,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("imageUrl").is_none());
    }
}

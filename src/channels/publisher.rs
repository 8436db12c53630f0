//! Outbound replies.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::ChannelError;
use crate::pipeline::Platform;

/// Posts a reply on the social platform.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `text` as a reply to the event `in_reply_to`.
    async fn publish(&self, text: &str, in_reply_to: &str) -> Result<(), ChannelError>;
}

/// Dry-run publisher: logs the reply and reports success.
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, text: &str, in_reply_to: &str) -> Result<(), ChannelError> {
        info!(in_reply_to = %in_reply_to, reply = %text, "Dry run, reply not published");
        Ok(())
    }
}

/// Reply routes, one publisher per platform.
#[derive(Clone, Default)]
pub struct Publishers {
    routes: HashMap<Platform, Arc<dyn Publisher>>,
}

impl Publishers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route replies for `platform` to `publisher`, replacing any earlier route.
    pub fn with(mut self, platform: Platform, publisher: Arc<dyn Publisher>) -> Self {
        self.routes.insert(platform, publisher);
        self
    }

    pub fn get(&self, platform: Platform) -> Option<&Arc<dyn Publisher>> {
        self.routes.get(&platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn routes_by_platform() {
        let publishers = Publishers::new().with(Platform::Farcaster, Arc::new(LogPublisher));
        assert!(publishers.get(Platform::Twitter).is_none());

        let publisher = publishers.get(Platform::Farcaster).unwrap();
        assert!(publisher.publish("hello", "0x1").await.is_ok());
    }
}

//! Replies on Twitter through the v2 API.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::channels::publisher::Publisher;
use crate::config::TwitterConfig;
use crate::error::ChannelError;

pub struct TwitterClient {
    client: reqwest::Client,
    token: SecretString,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct ReplyRequest<'a> {
    text: &'a str,
    reply: ReplyTarget<'a>,
}

#[derive(Debug, Serialize)]
struct ReplyTarget<'a> {
    in_reply_to_tweet_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct TweetResponse {
    data: Option<TweetData>,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
}

impl TwitterClient {
    pub fn new(token: SecretString, config: &TwitterConfig) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChannelError::Http(format!("failed to build client: {e}")))?;
        Ok(Self {
            client,
            token,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Publisher for TwitterClient {
    async fn publish(&self, text: &str, in_reply_to: &str) -> Result<(), ChannelError> {
        let url = format!("{}/tweets", self.base_url);
        let body = ReplyRequest {
            text,
            reply: ReplyTarget {
                in_reply_to_tweet_id: in_reply_to,
            },
        };

        let send_failed = |reason: String| ChannelError::SendFailed {
            in_reply_to: in_reply_to.to_string(),
            reason,
        };

        let resp = self
            .client
            .post(&url)
            .bearer_auth(self.token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| send_failed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(send_failed(format!("{status}: {body}")));
        }

        let created: TweetResponse = resp
            .json()
            .await
            .map_err(|e| send_failed(format!("bad tweet response: {e}")))?;
        let tweet = created
            .data
            .ok_or_else(|| send_failed("response carried no tweet id".to_string()))?;
        debug!(tweet_id = %tweet.id, in_reply_to = %in_reply_to, "Tweet reply created");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn reply_body_targets_the_mention() {
        let body = ReplyRequest {
            text: "✧ The Star",
            reply: ReplyTarget {
                in_reply_to_tweet_id: "1850000000000000001",
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["text"], "✧ The Star");
        assert_eq!(json["reply"]["in_reply_to_tweet_id"], "1850000000000000001");
    }

    #[test]
    fn created_tweet_id_is_read() {
        let resp: TweetResponse =
            serde_json::from_str(r#"{"data":{"id":"99","text":"hi","edit_history_tweet_ids":["99"]}}"#)
                .unwrap();
        assert_eq!(resp.data.unwrap().id, "99");

        let resp: TweetResponse = serde_json::from_str(r#"{"errors":[{"message":"nope"}]}"#).unwrap();
        assert!(resp.data.is_none());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = TwitterConfig {
            api_base_url: "https://api.example/2/".into(),
            timeout: Duration::from_secs(5),
            ..TwitterConfig::default()
        };
        let client = TwitterClient::new("t".into(), &config).unwrap();
        assert_eq!(client.base_url, "https://api.example/2");
    }
}

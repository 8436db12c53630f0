//! Adapter that exposes a rig `CompletionModel` as an `LlmProvider`.

use async_trait::async_trait;
use rig::completion::CompletionModel;
use rig::completion::message::{AssistantContent, Message};

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};

/// Wraps any rig completion model behind the crate's provider trait.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let prompt = request.user_text();
        let mut builder = self.model.completion_request(Message::user(prompt));
        if let Some(preamble) = request.system_text() {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_error(&self.model_name, &e.to_string()))?;

        let content = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(t) => Some(t.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if content.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.model_name.clone(),
                reason: "no text content in completion".to_string(),
            });
        }

        Ok(CompletionResponse {
            content,
            input_tokens: saturate(response.usage.input_tokens),
            output_tokens: saturate(response.usage.output_tokens),
            finish_reason: FinishReason::Stop,
            response_id: None,
        })
    }
}

fn saturate(tokens: u64) -> u32 {
    u32::try_from(tokens).unwrap_or(u32::MAX)
}

/// Map a rig error message onto the provider error taxonomy.
fn classify_error(provider: &str, message: &str) -> LlmError {
    let lower = message.to_lowercase();
    let provider = provider.to_string();
    if lower.contains("401") || lower.contains("unauthorized") || lower.contains("invalid api key")
    {
        LlmError::AuthFailed { provider }
    } else if lower.contains("429") || lower.contains("rate limit") {
        LlmError::RateLimited { provider }
    } else if lower.contains("json") || lower.contains("deserializ") {
        LlmError::InvalidResponse {
            provider,
            reason: message.to_string(),
        }
    } else {
        LlmError::RequestFailed {
            provider,
            reason: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_are_classified() {
        let err = classify_error("gpt-4", "HttpError: 401 Unauthorized");
        assert!(matches!(err, LlmError::AuthFailed { .. }));
    }

    #[test]
    fn rate_limits_are_classified() {
        let err = classify_error("gpt-4", "ProviderError: Rate limit reached for requests");
        assert!(matches!(err, LlmError::RateLimited { .. }));
    }

    #[test]
    fn decode_failures_are_invalid_responses() {
        let err = classify_error("gpt-4", "JsonError: expected value at line 1");
        assert!(matches!(err, LlmError::InvalidResponse { .. }));
    }

    #[test]
    fn anything_else_is_a_request_failure() {
        let err = classify_error("gpt-4", "connection reset by peer");
        match err {
            LlmError::RequestFailed { provider, reason } => {
                assert_eq!(provider, "gpt-4");
                assert!(reason.contains("reset"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn token_counts_saturate() {
        assert_eq!(saturate(12), 12);
        assert_eq!(saturate(u64::MAX), u32::MAX);
    }
}

//! Error types for the tarot bot.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Rate limit error: {0}")]
    RateLimit(#[from] RateLimitError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Bad or missing caller input. Maps to a 4xx response.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Question is required")]
    MissingQuestion,

    #[error("{message}")]
    BlockedContent { message: String },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// Caller exceeded a limit. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("{message}")]
    Exceeded { message: String },
}

/// Text-generation provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited")]
    RateLimited { provider: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },
}

/// Failure to produce the reading text. Surfaced to the caller, never retried.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Model returned an empty interpretation")]
    EmptyOutput,

    #[error("Spread needs {expected} cards, got {actual}")]
    CardCountMismatch { expected: usize, actual: usize },

    #[error("Deck exhausted: requested {requested} cards, only {available} available")]
    DeckExhausted { requested: usize, available: usize },
}

/// Image generation or upload failures. Always absorbed by the fallback pool.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Image request failed: {0}")]
    RequestFailed(String),

    #[error("Image provider returned status {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("Malformed image response: {0}")]
    Malformed(String),

    #[error("Image generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Image upload failed: {0}")]
    Upload(String),
}

/// Dedup-store failures. Logged, never abort a reply.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(String),
}

/// Social platform I/O errors (feed fetch, publish).
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Failed to publish reply to {in_reply_to}: {reason}")]
    SendFailed { in_reply_to: String, reason: String },

    #[error("Invalid feed payload: {0}")]
    InvalidPayload(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

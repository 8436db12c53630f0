//! Tarot Bot: answers mentions on Farcaster with tarot readings.

pub mod api;
pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod tarot;

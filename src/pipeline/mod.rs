//! Event pipeline: dedup, throttling, reading generation and the shared
//! per-event processor.

pub mod dedup;
pub mod processor;
pub mod rate;
pub mod reading;
pub mod store;
pub mod types;

pub use dedup::{EventDeduplicator, EvictionPolicy};
pub use processor::EventProcessor;
pub use rate::{IpRateLimiter, RateDecision, RateGate};
pub use reading::{ReadingPipeline, ReadingSource};
pub use store::{JsonFileStore, LibSqlStore, MemoryStore, ProcessedStore, open_store};
pub use types::{Event, EventSource, Platform, ProcessOutcome, ReadingResponse};

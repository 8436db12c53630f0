//! The shared per-event state machine.
//!
//! ```text
//! RECEIVE → (not an invocation: drop) → DEDUP-CHECK → (duplicate: drop)
//!         → RATE-CHECK → (busy: release claim, drop)
//!         → GENERATE → PUBLISH → MARK-PROCESSED
//! ```
//!
//! Both ingress adapters hand their normalized events to the same
//! `EventProcessor`, so a cast delivered by webhook and poll is replied to
//! once. Replies go back through the publisher registered for the event's
//! platform.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::channels::Publishers;
use crate::pipeline::dedup::EventDeduplicator;
use crate::pipeline::rate::RateGate;
use crate::pipeline::reading::ReadingSource;
use crate::pipeline::types::{Event, EventSource, Platform, ProcessOutcome};

pub struct EventProcessor {
    source: Arc<dyn ReadingSource>,
    dedup: Arc<EventDeduplicator>,
    gate: Arc<RateGate>,
    publishers: Publishers,
    invocation_prefix: String,
}

impl EventProcessor {
    pub fn new(
        source: Arc<dyn ReadingSource>,
        dedup: Arc<EventDeduplicator>,
        gate: Arc<RateGate>,
        publishers: Publishers,
        invocation_prefix: impl Into<String>,
    ) -> Self {
        Self {
            source,
            dedup,
            gate,
            publishers,
            invocation_prefix: invocation_prefix.into().to_lowercase(),
        }
    }

    /// Whether `text` addresses the bot. An empty prefix accepts everything.
    pub fn is_invocation(&self, text: &str) -> bool {
        text.trim_start()
            .to_lowercase()
            .starts_with(&self.invocation_prefix)
    }

    /// Twitter mentions are already filtered to the bot's handle upstream.
    fn addresses_bot(&self, event: &Event) -> bool {
        match event.platform {
            Platform::Farcaster => self.is_invocation(&event.text),
            Platform::Twitter => true,
        }
    }

    /// Run one event through the pipeline.
    pub async fn process(&self, event: Event, via: EventSource) -> ProcessOutcome {
        let outcome = self.run(&event, via).await;
        debug!(
            event_id = %event.id,
            platform = event.platform.label(),
            source = via.label(),
            outcome = outcome.label(),
            "Event handled"
        );
        outcome
    }

    async fn run(&self, event: &Event, via: EventSource) -> ProcessOutcome {
        if !self.addresses_bot(event) {
            return ProcessOutcome::NotInvocation;
        }

        let Some(publisher) = self.publishers.get(event.platform) else {
            warn!(
                event_id = %event.id,
                platform = event.platform.label(),
                "No publisher for platform, dropping event"
            );
            return ProcessOutcome::NoPublisher;
        };

        let key = event.dedup_key();
        if !self.dedup.should_process(&key).await {
            debug!(event_id = %event.id, source = via.label(), "Skipping duplicate event");
            return ProcessOutcome::Duplicate;
        }

        if !self.gate.try_acquire() {
            // Give the id back so a later delivery can still be answered.
            self.dedup.release(&key).await;
            info!(event_id = %event.id, source = via.label(), "Rate gate closed, skipping");
            return ProcessOutcome::RateLimited;
        }

        info!(
            event_id = %event.id,
            platform = event.platform.label(),
            source = via.label(),
            author = event.author.as_deref().unwrap_or("unknown"),
            "Processing invocation"
        );

        let reading = match self.source.generate_reading(&event.text).await {
            Ok(reading) => reading,
            Err(e) => {
                error!(event_id = %event.id, error = %e, "Failed to generate reading");
                return ProcessOutcome::Failed(e.to_string());
            }
        };

        let outcome = match publisher.publish(&reading.reply_text(), &event.id).await {
            Ok(()) => {
                info!(
                    event_id = %event.id,
                    spread = reading.spread.map(|s| s.label()).unwrap_or("info"),
                    cards = %reading.cards_header,
                    "Reply published"
                );
                ProcessOutcome::Published
            }
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "Failed to publish reply");
                ProcessOutcome::Failed(e.to_string())
            }
        };

        self.dedup.mark_processed(&key).await;
        outcome
    }
}

//! Pull ingress: periodically reads the channel feed and feeds recent
//! casts through the shared [`EventProcessor`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::ChannelError;
use crate::pipeline::{Event, EventProcessor, EventSource, ProcessOutcome};

/// Source of recent platform events, newest or oldest first.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<Event>, ChannelError>;
}

/// Midnight UTC of the day containing `now`.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}

/// Keep events at or after `reference`, oldest first.
pub fn filter_since(mut events: Vec<Event>, reference: DateTime<Utc>) -> Vec<Event> {
    events.retain(|e| e.timestamp >= reference);
    events.sort_by_key(|e| e.timestamp);
    events
}

/// Spawn the feed poller.
///
/// Returns a `JoinHandle` and a shutdown flag. Set the flag to stop polling.
pub fn spawn_feed_poller(
    feed: Arc<dyn FeedSource>,
    processor: Arc<EventProcessor>,
    interval: Duration,
    limit: usize,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), limit, "Feed poller started");

        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Feed poller shutting down");
                return;
            }

            poll_once(feed.as_ref(), &processor, limit, start_of_day(Utc::now())).await;
        }
    });

    (handle, shutdown_flag)
}

/// Run one poll cycle. Returns how many replies were published.
pub async fn poll_once(
    feed: &dyn FeedSource,
    processor: &EventProcessor,
    limit: usize,
    reference: DateTime<Utc>,
) -> usize {
    let events = match feed.fetch_recent(limit).await {
        Ok(events) => events,
        Err(e) => {
            error!(error = %e, "Feed poll failed");
            return 0;
        }
    };

    let fetched = events.len();
    let events = filter_since(events, reference);
    if events.is_empty() {
        return 0;
    }
    debug!(fetched, recent = events.len(), "Polled feed");

    let mut published = 0;
    for event in events {
        if processor.process(event, EventSource::Poll).await == ProcessOutcome::Published {
            published += 1;
        }
    }
    published
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{Duration as ChronoDuration, TimeZone};

    use super::*;
    use crate::channels::{Publisher, Publishers};
    use crate::error::GenerationError;
    use crate::pipeline::{EventDeduplicator, EvictionPolicy, Platform, RateGate, ReadingSource};
    use crate::tarot::Reading;

    struct StaticFeed {
        events: Vec<Event>,
        fail: bool,
    }

    #[async_trait]
    impl FeedSource for StaticFeed {
        async fn fetch_recent(&self, limit: usize) -> Result<Vec<Event>, ChannelError> {
            if self.fail {
                return Err(ChannelError::Http("offline".into()));
            }
            Ok(self.events.iter().take(limit).cloned().collect())
        }
    }

    struct EchoSource;

    #[async_trait]
    impl ReadingSource for EchoSource {
        async fn generate_reading(&self, question: &str) -> Result<Reading, GenerationError> {
            Ok(Reading::informational(question.to_string()))
        }
    }

    #[derive(Default)]
    struct Sink {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Publisher for Sink {
        async fn publish(&self, _text: &str, in_reply_to: &str) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push(in_reply_to.to_string());
            Ok(())
        }
    }

    fn processor(sink: Arc<Sink>) -> EventProcessor {
        EventProcessor::new(
            Arc::new(EchoSource),
            Arc::new(EventDeduplicator::new(100, EvictionPolicy::default())),
            Arc::new(RateGate::new(Duration::ZERO)),
            Publishers::new().with(Platform::Farcaster, sink),
            "@pentacle-tarot",
        )
    }

    #[test]
    fn start_of_day_is_midnight_utc() {
        let now = Utc.with_ymd_and_hms(2025, 6, 7, 15, 30, 12).unwrap();
        assert_eq!(
            start_of_day(now),
            Utc.with_ymd_and_hms(2025, 6, 7, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn filter_since_drops_old_and_sorts() {
        let reference = Utc.with_ymd_and_hms(2025, 6, 7, 0, 0, 0).unwrap();
        let events = vec![
            Event::new("late", "x", reference + ChronoDuration::hours(3)),
            Event::new("old", "x", reference - ChronoDuration::seconds(1)),
            Event::new("edge", "x", reference),
        ];
        let kept: Vec<_> = filter_since(events, reference)
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(kept, vec!["edge", "late"]);
    }

    #[tokio::test]
    async fn poll_once_processes_recent_invocations() {
        let now = Utc::now();
        let feed = StaticFeed {
            events: vec![
                Event::new("0x1", "@pentacle-tarot will it?", now),
                Event::new("0x2", "unrelated", now),
                Event::new("0x3", "@pentacle-tarot yesterday", now - ChronoDuration::days(2)),
            ],
            fail: false,
        };
        let sink = Arc::new(Sink::default());
        let processor = processor(sink.clone());

        let published = poll_once(&feed, &processor, 20, start_of_day(now)).await;
        assert_eq!(published, 1);
        assert_eq!(*sink.sent.lock().unwrap(), vec!["0x1".to_string()]);

        // A second cycle sees the same feed and publishes nothing new.
        assert_eq!(poll_once(&feed, &processor, 20, start_of_day(now)).await, 0);
    }

    #[tokio::test]
    async fn feed_errors_are_swallowed() {
        let feed = StaticFeed {
            events: Vec::new(),
            fail: true,
        };
        let processor = processor(Arc::new(Sink::default()));
        assert_eq!(poll_once(&feed, &processor, 20, Utc::now()).await, 0);
    }

    #[tokio::test]
    async fn spawned_poller_stops_on_flag() {
        let feed = Arc::new(StaticFeed {
            events: vec![Event::new("0x9", "@pentacle-tarot hi", Utc::now())],
            fail: false,
        });
        let sink = Arc::new(Sink::default());
        let processor = Arc::new(processor(sink.clone()));

        let (handle, shutdown) =
            spawn_feed_poller(feed, processor, Duration::from_millis(10), 20);
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.store(true, Ordering::Relaxed);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(*sink.sent.lock().unwrap(), vec!["0x9".to_string()]);
    }
}

//! Platform I/O: webhook and feed ingress, reply publishing.

pub mod neynar;
pub mod poller;
pub mod publisher;
pub mod twitter;
pub mod webhook;

pub use neynar::NeynarClient;
pub use poller::{FeedSource, poll_once, spawn_feed_poller};
pub use publisher::{LogPublisher, Publisher, Publishers};
pub use twitter::TwitterClient;
pub use webhook::WebhookPayload;

//! Tarot domain: deck, drawing, classification, composition and imagery.

pub mod composer;
pub mod deck;
pub mod filter;
pub mod image;
pub mod info;
pub mod model;
pub mod selector;
pub mod spread;

pub use composer::{ComposerConfig, ReadingComposer};
pub use deck::{Arcana, Card, full_deck};
pub use filter::ContentFilter;
pub use image::{FallbackPool, ImageGenerator, ImageStore, ImageSynthesizer};
pub use info::{InfoQuery, InformationResponder, classify_information_query};
pub use model::{Answer, Reading};
pub use selector::{CardSelector, DrawnCard, OsRandom, RandomSource, SequenceRandom};
pub use spread::{SpreadType, determine_spread_type, strip_invocation_prefix};

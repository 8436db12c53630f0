//! Card drawing backed by a cryptographically secure random source.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use rand::RngCore;
use rand::rngs::OsRng;
use serde::Serialize;
use tracing::debug;

use crate::error::GenerationError;
use crate::tarot::deck::{Card, full_deck};
use crate::tarot::spread::SpreadType;

/// Reversal happens when the orientation draw is strictly above this.
pub const REVERSAL_THRESHOLD: f64 = 0.5;

/// Source of uniform values in `[0, 1)`.
pub trait RandomSource: Send + Sync {
    fn next_unit(&self) -> f64;

    /// Uniform index in `0..len`. `len` must be non-zero.
    fn next_index(&self, len: usize) -> usize {
        ((self.next_unit() * len as f64) as usize).min(len.saturating_sub(1))
    }
}

/// Operating-system CSPRNG. Outcomes cannot be predicted from earlier draws.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn next_unit(&self) -> f64 {
        OsRng.next_u32() as f64 / (u32::MAX as f64 + 1.0)
    }
}

/// Replays a fixed sequence of values, cycling when exhausted.
///
/// Used to make draws reproducible in tests and demos.
#[derive(Debug)]
pub struct SequenceRandom {
    values: Mutex<VecDeque<f64>>,
}

impl SequenceRandom {
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        let values: VecDeque<f64> = values.into_iter().map(|v| v.clamp(0.0, 0.999_999)).collect();
        Self {
            values: Mutex::new(values),
        }
    }
}

impl RandomSource for SequenceRandom {
    fn next_unit(&self) -> f64 {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        match values.pop_front() {
            Some(v) => {
                values.push_back(v);
                v
            }
            None => 0.0,
        }
    }
}

/// A card as drawn for one reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawnCard {
    #[serde(flatten)]
    pub card: Card,
    pub is_reversed: bool,
    pub position: Option<String>,
}

impl DrawnCard {
    /// Card name with the reversal glyph when upside down.
    pub fn display_name(&self) -> String {
        if self.is_reversed {
            format!("{} ℝ", self.card.name)
        } else {
            self.card.name.clone()
        }
    }
}

/// Draws cards without replacement.
pub struct CardSelector {
    deck: Vec<Card>,
    random: Arc<dyn RandomSource>,
}

impl CardSelector {
    /// Selector over the full 78-card deck.
    pub fn new(random: Arc<dyn RandomSource>) -> Self {
        Self::with_deck(full_deck().to_vec(), random)
    }

    pub fn with_deck(deck: Vec<Card>, random: Arc<dyn RandomSource>) -> Self {
        Self { deck, random }
    }

    /// Draw the cards for a spread, labelled with its positions.
    pub fn select_cards(&self, spread: SpreadType) -> Result<Vec<DrawnCard>, GenerationError> {
        let positions = spread.positions();
        let mut drawn = self.draw(positions.len())?;
        for (card, position) in drawn.iter_mut().zip(positions) {
            card.position = Some((*position).to_string());
        }

        debug!(
            spread = %spread,
            cards = ?drawn.iter().map(DrawnCard::display_name).collect::<Vec<_>>(),
            "Cards selected"
        );
        Ok(drawn)
    }

    /// Draw `count` distinct cards with independent orientation.
    pub fn draw(&self, count: usize) -> Result<Vec<DrawnCard>, GenerationError> {
        if count > self.deck.len() {
            return Err(GenerationError::DeckExhausted {
                requested: count,
                available: self.deck.len(),
            });
        }

        let mut available = self.deck.clone();
        let mut selected = Vec::with_capacity(count);

        while selected.len() < count {
            let index = self.random.next_index(available.len());
            let card = available.swap_remove(index);
            let is_reversed = self.random.next_unit() > REVERSAL_THRESHOLD;
            selected.push(DrawnCard {
                card,
                is_reversed,
                position: None,
            });
        }

        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn os_selector() -> CardSelector {
        CardSelector::new(Arc::new(OsRandom))
    }

    #[test]
    fn every_spread_gets_its_cardinality_without_repeats() {
        let selector = os_selector();
        for spread in SpreadType::all() {
            for _ in 0..50 {
                let cards = selector.select_cards(spread).unwrap();
                assert_eq!(cards.len(), spread.cardinality());
                let ids: HashSet<u8> = cards.iter().map(|c| c.card.id).collect();
                assert_eq!(ids.len(), cards.len(), "duplicate card in {spread} draw");
            }
        }
    }

    #[test]
    fn positions_follow_spread_order() {
        let cards = os_selector().select_cards(SpreadType::PastPresentFuture).unwrap();
        let positions: Vec<_> = cards.iter().map(|c| c.position.as_deref().unwrap()).collect();
        assert_eq!(positions, vec!["Past", "Present", "Future"]);
    }

    #[test]
    fn scripted_source_is_deterministic() {
        let draw = || {
            CardSelector::new(Arc::new(SequenceRandom::new([0.1, 0.9])))
                .select_cards(SpreadType::YesNo)
                .unwrap()
        };
        let first = draw();
        let second = draw();
        assert_eq!(first, second);

        // floor(0.1 * 78) = 7 -> The Chariot; 0.9 > 0.5 -> reversed.
        assert_eq!(first[0].card.name, "The Chariot");
        assert!(first[0].is_reversed);
    }

    #[test]
    fn different_sequences_give_different_draws() {
        let a = CardSelector::new(Arc::new(SequenceRandom::new([0.1, 0.9])))
            .select_cards(SpreadType::YesNo)
            .unwrap();
        let b = CardSelector::new(Arc::new(SequenceRandom::new([0.5, 0.2])))
            .select_cards(SpreadType::YesNo)
            .unwrap();
        assert_ne!(a[0].card.id, b[0].card.id);
        assert_ne!(a[0].is_reversed, b[0].is_reversed);
    }

    #[test]
    fn exact_threshold_is_upright() {
        let cards = CardSelector::new(Arc::new(SequenceRandom::new([0.0, 0.5])))
            .draw(1)
            .unwrap();
        assert!(!cards[0].is_reversed);
    }

    #[test]
    fn same_index_twice_still_yields_distinct_cards() {
        let cards = CardSelector::new(Arc::new(SequenceRandom::new([0.0])))
            .draw(3)
            .unwrap();
        let ids: HashSet<u8> = cards.iter().map(|c| c.card.id).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn small_deck_is_exhausted() {
        let deck = full_deck()[..2].to_vec();
        let selector = CardSelector::with_deck(deck, Arc::new(OsRandom));
        let err = selector.select_cards(SpreadType::Love).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::DeckExhausted {
                requested: 3,
                available: 2
            }
        ));
    }

    #[test]
    fn os_random_stays_in_unit_interval() {
        for _ in 0..1000 {
            let v = OsRandom.next_unit();
            assert!((0.0..1.0).contains(&v));
        }
        assert!(OsRandom.next_index(78) < 78);
    }

    #[test]
    fn display_name_marks_reversal() {
        let mut cards = os_selector().draw(1).unwrap();
        cards[0].is_reversed = true;
        assert!(cards[0].display_name().ends_with(" ℝ"));
        cards[0].is_reversed = false;
        assert!(!cards[0].display_name().contains('ℝ'));
    }
}

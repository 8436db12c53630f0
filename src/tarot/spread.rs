//! Spread types and the free-text spread classifier.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A named card layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpreadType {
    #[serde(rename = "yesno")]
    YesNo,
    Love,
    Career,
    PastPresentFuture,
}

impl SpreadType {
    /// Number of cards drawn for this spread.
    pub fn cardinality(self) -> usize {
        self.positions().len()
    }

    /// Ordered position labels, one per card.
    pub fn positions(self) -> &'static [&'static str] {
        match self {
            SpreadType::YesNo => &["Answer"],
            SpreadType::Love => &["You", "Your Partner", "The Connection"],
            SpreadType::Career => &["Where You Stand", "The Obstacle", "Where It Leads"],
            SpreadType::PastPresentFuture => &["Past", "Present", "Future"],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SpreadType::YesNo => "yesno",
            SpreadType::Love => "love",
            SpreadType::Career => "career",
            SpreadType::PastPresentFuture => "pastPresentFuture",
        }
    }

    pub fn all() -> [SpreadType; 4] {
        [
            SpreadType::YesNo,
            SpreadType::Love,
            SpreadType::Career,
            SpreadType::PastPresentFuture,
        ]
    }
}

impl fmt::Display for SpreadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

static LEADING_MENTIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:@[\w.\-]+[\s,:]*)+").unwrap());

static YES_NO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(will|should|do|does|am|are|is|has|can|could|would|have)\b").unwrap()
});

static LOVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(love|loves|loving|relationships?|crush(es)?|romance|romantic|dating|partner|soulmate|boyfriend|girlfriend|marriage)\b")
        .unwrap()
});

static CAREER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(jobs?|work(ing)?|careers?|business(es)?|promotion|boss|interview|salary|profession(al)?)\b")
        .unwrap()
});

/// Remove leading mention tokens (`@pentacle-tarot`, `@bot, `) from a question.
pub fn strip_invocation_prefix(text: &str) -> &str {
    match LEADING_MENTIONS.find(text) {
        Some(m) => text[m.end()..].trim(),
        None => text.trim(),
    }
}

/// Lower-cased, prefix-stripped text used by every classifier.
pub fn normalize_question(text: &str) -> String {
    strip_invocation_prefix(text).to_lowercase()
}

/// Pick a spread for a question.
///
/// The yes/no check runs before keyword checks so "Will I find love?" stays a
/// one-card answer.
pub fn determine_spread_type(question: &str) -> SpreadType {
    let text = normalize_question(question);

    if YES_NO.is_match(&text) {
        SpreadType::YesNo
    } else if LOVE.is_match(&text) {
        SpreadType::Love
    } else if CAREER.is_match(&text) {
        SpreadType::Career
    } else {
        SpreadType::PastPresentFuture
    }
}

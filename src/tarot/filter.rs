//! Question moderation for the direct HTTP path.
//!
//! Blocked patterns reject the question; flagged patterns are allowed but logged.

use regex::Regex;
use tracing::warn;

use crate::error::ValidationError;

const DEFAULT_BLOCKED: &[&str] = &[
    r"(?i)\b(kill(s|ing)?|murder(s|ed|ing)?|stab(s|bed|bing)?|shoot(s|ing)?|attack)\b",
    r"(?i)\b(hurt|harm|damage|destroy)\b",
    r"(?i)\b(steal|rob|theft|drugs?|cocaine|heroin)\b",
    r"(?i)\b(bomb(s|ing)?|assault(s|ed|ing)?|rape(s|d|ing)?|violence|violent|bash(es|ing)?)\b",
];

const DEFAULT_FLAGGED: &[&str] = &[r"(?i)\b(death|die|dead|suicide)\b", r"(?i)\b(crime|criminal)\b"];

/// Shown to the caller instead of a reading when a question is blocked.
pub const REPLACEMENT_MESSAGE: &str = "I'm here to help you think through things constructively. Let's keep it respectful so I can give you a meaningful reading.";

/// Regex-based question filter.
pub struct ContentFilter {
    blocked: Vec<Regex>,
    flagged: Vec<Regex>,
}

impl ContentFilter {
    /// Filter with the built-in pattern lists.
    pub fn default_rules() -> Self {
        Self {
            blocked: DEFAULT_BLOCKED.iter().map(|p| Regex::new(p).unwrap()).collect(),
            flagged: DEFAULT_FLAGGED.iter().map(|p| Regex::new(p).unwrap()).collect(),
        }
    }

    /// Filter with caller-supplied lists.
    pub fn with_patterns(blocked: &[&str], flagged: &[&str]) -> Result<Self, regex::Error> {
        Ok(Self {
            blocked: blocked.iter().map(|p| Regex::new(p)).collect::<Result<_, _>>()?,
            flagged: flagged.iter().map(|p| Regex::new(p)).collect::<Result<_, _>>()?,
        })
    }

    pub fn validate(&self, question: &str) -> Result<(), ValidationError> {
        let cleaned = question.trim();

        if let Some(pattern) = self.blocked.iter().find(|r| r.is_match(cleaned)) {
            warn!(pattern = %pattern.as_str(), "Blocked question");
            return Err(ValidationError::BlockedContent {
                message: REPLACEMENT_MESSAGE.to_string(),
            });
        }

        if self.flagged.iter().any(|r| r.is_match(cleaned)) {
            warn!(question = %cleaned, "Flagged question for review");
        }

        Ok(())
    }
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::default_rules()
    }
}

//! Reading output types.

use std::fmt;

use serde::Serialize;

use crate::tarot::selector::DrawnCard;
use crate::tarot::spread::SpreadType;

/// Separator between card names in the header line.
pub const HEADER_SEPARATOR: &str = " ┆ ";

/// The verdict of a yes/no spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Answer {
    Yes,
    No,
}

impl Answer {
    /// Upright means yes, reversed means no. Nothing else is consulted.
    pub fn from_card(card: &DrawnCard) -> Self {
        if card.is_reversed { Answer::No } else { Answer::Yes }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Answer::Yes => "Yes",
            Answer::No => "No",
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finished reading (or information answer). Not persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// `None` for information queries, which draw no cards.
    pub spread: Option<SpreadType>,
    pub cards: Vec<DrawnCard>,
    pub cards_header: String,
    pub answer: Option<Answer>,
    pub interpretation: String,
    pub image_url: Option<String>,
}

impl Reading {
    /// A reply with no cards, used for information queries.
    pub fn informational(text: impl Into<String>) -> Self {
        Self {
            spread: None,
            cards: Vec::new(),
            cards_header: String::new(),
            answer: None,
            interpretation: text.into(),
            image_url: None,
        }
    }

    /// Header, optional verdict, then the interpretation.
    pub fn text(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(3);
        if !self.cards_header.is_empty() {
            parts.push(self.cards_header.clone());
        }
        if let Some(answer) = self.answer {
            parts.push(format!("Answer: {answer}"));
        }
        parts.push(self.interpretation.clone());
        parts.join("\n\n")
    }

    /// Text as posted on the social platform: the image URL goes on its own
    /// line after a blank line so clients embed it.
    pub fn reply_text(&self) -> String {
        match self.image_url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => format!("{}\n\n{url}", self.text()),
            None => self.text(),
        }
    }
}

/// `The Fool ┆ Death ℝ ┆ The Sun`
pub fn cards_header(cards: &[DrawnCard]) -> String {
    cards
        .iter()
        .map(DrawnCard::display_name)
        .collect::<Vec<_>>()
        .join(HEADER_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::tarot::selector::{CardSelector, SequenceRandom};

    fn drawn(values: Vec<f64>, count: usize) -> Vec<DrawnCard> {
        CardSelector::new(Arc::new(SequenceRandom::new(values)))
            .draw(count)
            .unwrap()
    }

    #[test]
    fn header_joins_names_and_marks_reversed() {
        // index 0 upright, then index 0 of the remaining deck reversed
        let cards = drawn(vec![0.0, 0.1, 0.0, 0.9], 2);
        assert_eq!(cards_header(&cards), "The Fool ┆ King of Pentacles ℝ");
    }

    #[test]
    fn answer_depends_only_on_orientation() {
        let mut cards = drawn(vec![0.3, 0.1], 1);
        assert_eq!(Answer::from_card(&cards[0]), Answer::Yes);
        cards[0].is_reversed = true;
        assert_eq!(Answer::from_card(&cards[0]), Answer::No);
        assert_eq!(Answer::from_card(&cards[0]), Answer::No);
    }

    #[test]
    fn reply_text_appends_image_on_own_line() {
        let mut reading = Reading::informational("hello");
        assert_eq!(reading.reply_text(), "hello");
        reading.image_url = Some("https://img/1".into());
        assert_eq!(reading.reply_text(), "hello\n\nhttps://img/1");
    }

    #[test]
    fn text_includes_answer_line() {
        let reading = Reading {
            spread: Some(SpreadType::YesNo),
            cards: Vec::new(),
            cards_header: "The Sun".into(),
            answer: Some(Answer::Yes),
            interpretation: "✧ glow up".into(),
            image_url: None,
        };
        assert_eq!(reading.text(), "The Sun\n\nAnswer: Yes\n\n✧ glow up");
    }
}

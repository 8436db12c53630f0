//! Reading composer: turns drawn cards into an interpretation via the LLM.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{GenerationError, LlmError};
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::tarot::model::{Answer, Reading, cards_header};
use crate::tarot::selector::DrawnCard;
use crate::tarot::spread::{SpreadType, strip_invocation_prefix};

/// Leading glyph required on every interpretation line.
pub const LINE_MARKER: &str = "✧ ";

const SYSTEM_PROMPT: &str = "You are a punk-aesthetic, no-BS tarot reader. Your readings are insightful, direct, and brutally honest, like a friend who tells you what you need to hear, not what you want to hear.";

/// Configuration for reading generation.
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Upper bound on one model call.
    pub timeout: Duration,
    /// Per-line character ceiling given to the model.
    pub max_line_chars: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 300,
            timeout: Duration::from_secs(30),
            max_line_chars: 60,
        }
    }
}

/// Builds per-spread prompts and assembles the reading text.
pub struct ReadingComposer {
    llm: Arc<dyn LlmProvider>,
    config: ComposerConfig,
}

impl ReadingComposer {
    pub fn new(llm: Arc<dyn LlmProvider>, config: ComposerConfig) -> Self {
        Self { llm, config }
    }

    /// Compose the reading for already-drawn cards.
    ///
    /// The question may still carry the invocation prefix; it is stripped
    /// before it reaches the prompt. Fails when the model errors or returns
    /// nothing; there is no retry.
    pub async fn compose_reading(
        &self,
        question: &str,
        cards: Vec<DrawnCard>,
        spread: SpreadType,
    ) -> Result<Reading, GenerationError> {
        if cards.len() != spread.cardinality() {
            return Err(GenerationError::CardCountMismatch {
                expected: spread.cardinality(),
                actual: cards.len(),
            });
        }

        let question = strip_invocation_prefix(question);
        let answer = match spread {
            SpreadType::YesNo => Some(Answer::from_card(&cards[0])),
            SpreadType::Love | SpreadType::Career | SpreadType::PastPresentFuture => None,
        };

        let prompt = match answer {
            Some(answer) => build_yes_no_prompt(question, &cards[0], answer, &self.config),
            None => build_spread_prompt(question, &cards, spread, &self.config),
        };

        info!(
            spread = %spread,
            cards = cards.len(),
            model = self.llm.model_name(),
            "Generating interpretation"
        );

        let interpretation = self.generate(prompt).await?;
        debug!(length = interpretation.len(), "Interpretation generated");

        Ok(Reading {
            spread: Some(spread),
            cards_header: cards_header(&cards),
            cards,
            answer,
            interpretation,
            image_url: None,
        })
    }

    async fn generate(&self, prompt: String) -> Result<String, GenerationError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ])
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let response = tokio::time::timeout(self.config.timeout, self.llm.complete(request))
            .await
            .map_err(|_| LlmError::Timeout {
                provider: self.llm.model_name().to_string(),
                timeout: self.config.timeout,
            })??;

        let text = response.content.trim();
        if text.is_empty() {
            return Err(GenerationError::EmptyOutput);
        }
        Ok(text.to_string())
    }
}

fn card_line(card: &DrawnCard) -> String {
    format!("{} - {}", card.display_name(), card.card.summary)
}

fn build_yes_no_prompt(
    question: &str,
    card: &DrawnCard,
    answer: Answer,
    config: &ComposerConfig,
) -> String {
    format!(
        "Card: {card}\n\
         Orientation: {orientation}\n\
         The answer is already decided: {answer}. Do not change it or hedge on it.\n\n\
         **Your Response Format:**\n\
         - Exactly 2 lines explaining why the card says {answer}.\n\
         - Each line must be under {max} characters and start with \"{marker}\".\n\
         - No full stop at the end of these lines.\n\
         - Then a summary of at most 2 sentences that quotes the querent's exact question \
           and uses hedging language (may, could, possibly) about the future.\n\n\
         **User's Question:** \"{question}\"\n\n\
         Do not include any additional text, headers, or labels.",
        card = card_line(card),
        orientation = if card.is_reversed { "reversed" } else { "upright" },
        max = config.max_line_chars,
        marker = LINE_MARKER,
    )
}

fn build_spread_prompt(
    question: &str,
    cards: &[DrawnCard],
    spread: SpreadType,
    config: &ComposerConfig,
) -> String {
    let listing = cards
        .iter()
        .enumerate()
        .map(|(i, card)| {
            let position = card
                .position
                .as_deref()
                .or_else(|| spread.positions().get(i).copied())
                .unwrap_or("Card");
            format!("{position}: {}", card_line(card))
        })
        .collect::<Vec<_>>()
        .join("\n");

    let order = spread
        .positions()
        .iter()
        .enumerate()
        .map(|(i, p)| format!("line {} interprets {p}", i + 1))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "{listing}\n\n\
         You are a punk-aesthetic Gen-Z tarot reader. No fluff, no vague nonsense, just raw, direct insights.\n\n\
         **Your Response Format:**\n\
         - Exactly {count} interpretation lines: {order}.\n\
         - Each line must be under {max} characters and start with \"{marker}\".\n\
         - Do not add a full stop at the end of any of these lines.\n\n\
         - Then a final summary of at most 3 sentences:\n\
           - Start with \"Regarding your question about\".\n\
           - Quote the querent's exact question; never change, reinterpret, or invent a different one.\n\
           - Use hedging language (possible, may, could) for future outcomes.\n\
           - Make it sound like real advice and end on a complete sentence.\n\n\
         **User's Question:** \"{question}\"\n\n\
         Do not include any additional text, headers, or labels. Just the reading.",
        count = cards.len(),
        max = config.max_line_chars,
        marker = LINE_MARKER,
    )
}

//! Information queries: questions about the bot itself rather than requests
//! for a reading. These never draw cards.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};

use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::tarot::deck::find_card;
use crate::tarot::spread::normalize_question;

/// A recognised non-reading question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoQuery {
    AboutAgent,
    ReversedCards,
    SpreadTypes,
    SpecificCard(String),
}

impl InfoQuery {
    pub fn label(&self) -> &'static str {
        match self {
            InfoQuery::AboutAgent => "about_agent",
            InfoQuery::ReversedCards => "reversed_cards",
            InfoQuery::SpreadTypes => "spread_types",
            InfoQuery::SpecificCard(_) => "specific_card",
        }
    }
}

static ABOUT_AGENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"who (are|r) (you|u)|how (do you|does this) work|tell me about (yourself|urself)")
        .unwrap()
});

static REVERSED_CARDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"what (does|is) (the )?[rℝ∀] (mean|symbol)|reversed cards?|upside[- ]down cards?")
        .unwrap()
});

static SPREAD_TYPES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"what (types of |kinds of )?(spreads?|readings?) (can you do|do you offer|are available)|how (can|do) i (get|ask for) (a )?reading|^help$|how (can|do) i use (you|this)|what commands",
    )
    .unwrap()
});

static SPECIFIC_CARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"tell me about (the )?([a-z\s]+?) card\b").unwrap());

/// Classify a question as an information query, if it is one.
///
/// Runs ahead of spread classification: "what readings do you offer" must
/// never trigger a draw.
pub fn classify_information_query(question: &str) -> Option<InfoQuery> {
    let text = normalize_question(question);
    let text = text.trim_end_matches(['?', '!', '.']).trim();

    if ABOUT_AGENT.is_match(text) {
        return Some(InfoQuery::AboutAgent);
    }
    if REVERSED_CARDS.is_match(text) {
        return Some(InfoQuery::ReversedCards);
    }
    if SPREAD_TYPES.is_match(text) {
        return Some(InfoQuery::SpreadTypes);
    }
    SPECIFIC_CARD
        .captures(text)
        .and_then(|caps| caps.get(2))
        .map(|name| name.as_str().trim())
        .filter(|name| !name.is_empty())
        .map(|name| InfoQuery::SpecificCard(name.to_string()))
}

pub const AGENT_INFO: &str = "✧ Your brutally honest tarot bestie, straight facts only
✧ No sugar-coating, just cosmic guidance with edge
✧ Reading from the OG Rider-Waite-Smith deck

I'm a digital tarot reader and I don't do vague mystical filler. Every reading is pulled fresh from the full 78-card deck and comes with an image to match the vibe.";

pub const REVERSED_INFO: &str = "✧ ℝ means the card landed upside down in your spread
✧ Reversed energy is blocked, delayed, or turned inward
✧ Not automatically bad, it just asks for a new angle

When a card shows up ℝ, the universe is telling you to flip your perspective. Same card, same themes, but the energy is stuck or pointing back at you. Think of it as a hint to get creative with your approach.";

pub const SPREAD_INFO: &str = "✧ Yes/no: start with \"Will...\" or \"Should...\" for one card
✧ Love: ask about relationships, crushes, or romance
✧ Career: ask about work, jobs, or business moves

Want a quick answer? Hit me with a \"Should I...\" or \"Will I...\" question for a one-card reality check. Mention a relationship or crush and I'll pull a three-card love spread, drop words like job or work for a career spread, and for anything else you get past, present and future.";

const SYSTEM_PROMPT: &str = "You are a punk-aesthetic, no-BS tarot reader. Your answers are direct, practical, and honest.";

const UNKNOWN_CARD: &str = "I couldn't find that card in the deck. Try the full name, like \"the tower\" or \"three of cups\".";

/// Answers information queries with canned text, or an LLM explanation with
/// canned fallback.
pub struct InformationResponder {
    llm: Arc<dyn LlmProvider>,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl InformationResponder {
    pub fn new(llm: Arc<dyn LlmProvider>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            llm,
            temperature,
            max_tokens,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Produce the reply text. Never fails: every branch has canned content.
    pub async fn respond(&self, query: &InfoQuery) -> String {
        debug!(query = query.label(), "Answering information query");
        match query {
            InfoQuery::ReversedCards => REVERSED_INFO.to_string(),
            InfoQuery::SpreadTypes => SPREAD_INFO.to_string(),
            InfoQuery::AboutAgent => {
                let prompt = build_about_prompt();
                self.generate_or(prompt, AGENT_INFO.to_string()).await
            }
            InfoQuery::SpecificCard(name) => match find_card(name) {
                Some(card) => {
                    let fallback = format!(
                        "✧ {} ({})\n✧ {}\n\n{}",
                        card.name, card.numeral, card.summary, card.description
                    );
                    self.generate_or(build_card_prompt(&card.name), fallback).await
                }
                None => UNKNOWN_CARD.to_string(),
            },
        }
    }

    async fn generate_or(&self, prompt: String, fallback: String) -> String {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ])
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens);

        let Ok(result) = tokio::time::timeout(self.timeout, self.llm.complete(request)).await else {
            warn!(timeout = ?self.timeout, "Information response timed out, using canned text");
            return fallback;
        };

        match result {
            Ok(response) if !response.content.trim().is_empty() => response.content.trim().to_string(),
            Ok(_) => {
                warn!("Empty information response from model, using canned text");
                fallback
            }
            Err(e) => {
                warn!(error = %e, "Information response generation failed, using canned text");
                fallback
            }
        }
    }
}

fn build_about_prompt() -> String {
    format!(
        "Introduce yourself as a punk-aesthetic Gen-Z tarot reader using this exact format:\n\n\
         ✧ First key point (under 60 chars, no period)\n\
         ✧ Second key point (under 60 chars, no period)\n\
         ✧ Third key point (under 60 chars, no period)\n\n\
         Then a fresh 3-sentence summary. Brutally honest, zero fluff, sounds like a friend \
         rather than generated text. Do not reuse this earlier intro:\n{AGENT_INFO}"
    )
}

fn build_card_prompt(card_name: &str) -> String {
    format!(
        "Explain the {card_name} tarot card with this exact format:\n\n\
         ✧ Upright meaning (under 60 chars, no period)\n\
         ✧ Reversed meaning (under 60 chars, no period)\n\
         ✧ Practical advice (under 60 chars, no period)\n\n\
         Then a 3-sentence summary, direct and practical, using hedging language \
         (may, could, possibly) for anything about the future."
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::provider::{CompletionResponse, FinishReason};

    #[test]
    fn classifies_identity_questions() {
        assert_eq!(
            classify_information_query("@pentacle-tarot who are you?"),
            Some(InfoQuery::AboutAgent)
        );
        assert_eq!(
            classify_information_query("how does this work"),
            Some(InfoQuery::AboutAgent)
        );
    }

    #[test]
    fn classifies_reversed_symbol_questions() {
        assert_eq!(
            classify_information_query("what does the ℝ mean?"),
            Some(InfoQuery::ReversedCards)
        );
        assert_eq!(
            classify_information_query("explain reversed cards"),
            Some(InfoQuery::ReversedCards)
        );
    }

    #[test]
    fn classifies_spread_listing_questions() {
        assert_eq!(
            classify_information_query("What readings do you offer?"),
            Some(InfoQuery::SpreadTypes)
        );
        assert_eq!(
            classify_information_query("@pentacle-tarot help"),
            Some(InfoQuery::SpreadTypes)
        );
        assert_eq!(
            classify_information_query("what commands"),
            Some(InfoQuery::SpreadTypes)
        );
    }

    #[test]
    fn classifies_specific_card_questions() {
        assert_eq!(
            classify_information_query("tell me about the tower card"),
            Some(InfoQuery::SpecificCard("tower".into()))
        );
        assert_eq!(
            classify_information_query("Tell me about Three of Cups card"),
            Some(InfoQuery::SpecificCard("three of cups".into()))
        );
    }

    #[test]
    fn ordinary_questions_are_not_information_queries() {
        assert_eq!(classify_information_query("Will I find love?"), None);
        assert_eq!(classify_information_query("what does my week hold"), None);
        assert_eq!(classify_information_query("help me decide on a job"), None);
    }

    struct MockLlm {
        response: Result<String, ()>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for MockLlm {
        fn model_name(&self) -> &str {
            "mock-info"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.prompts.lock().unwrap().push(request.user_text());
            match &self.response {
                Ok(content) => Ok(CompletionResponse {
                    content: content.clone(),
                    input_tokens: 0,
                    output_tokens: 0,
                    finish_reason: FinishReason::Stop,
                    response_id: None,
                }),
                Err(()) => Err(LlmError::RequestFailed {
                    provider: "mock".into(),
                    reason: "down".into(),
                }),
            }
        }
    }

    fn responder(response: Result<String, ()>) -> (InformationResponder, Arc<MockLlm>) {
        let llm = Arc::new(MockLlm {
            response,
            prompts: Mutex::new(Vec::new()),
        });
        (InformationResponder::new(llm.clone(), 0.7, 150), llm)
    }

    #[tokio::test]
    async fn canned_answers_skip_the_model() {
        let (responder, llm) = responder(Ok("unused".into()));
        assert_eq!(responder.respond(&InfoQuery::SpreadTypes).await, SPREAD_INFO);
        assert_eq!(responder.respond(&InfoQuery::ReversedCards).await, REVERSED_INFO);
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn specific_card_uses_model_with_card_name() {
        let (responder, llm) = responder(Ok("  ✧ upright\n✧ reversed\n✧ advice  ".into()));
        let text = responder
            .respond(&InfoQuery::SpecificCard("tower".into()))
            .await;
        assert_eq!(text, "✧ upright\n✧ reversed\n✧ advice");
        assert!(llm.prompts.lock().unwrap()[0].contains("The Tower"));
    }

    #[tokio::test]
    async fn specific_card_falls_back_to_deck_text() {
        let (responder, _) = responder(Err(()));
        let text = responder
            .respond(&InfoQuery::SpecificCard("the star".into()))
            .await;
        assert!(text.contains("The Star"));
        assert!(text.contains("Hope is back on the menu"));
    }

    #[tokio::test]
    async fn unknown_card_does_not_call_model() {
        let (responder, llm) = responder(Ok("unused".into()));
        let text = responder
            .respond(&InfoQuery::SpecificCard("banana".into()))
            .await;
        assert_eq!(text, UNKNOWN_CARD);
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn about_agent_falls_back_on_empty_output() {
        let (responder, _) = responder(Ok("   ".into()));
        assert_eq!(responder.respond(&InfoQuery::AboutAgent).await, AGENT_INFO);
    }

    struct HangingLlm;

    #[async_trait]
    impl LlmProvider for HangingLlm {
        fn model_name(&self) -> &str {
            "hanging"
        }

        async fn complete(&self, _: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(LlmError::RequestFailed {
                provider: "hanging".into(),
                reason: "unreachable".into(),
            })
        }
    }

    #[tokio::test]
    async fn stalled_model_falls_back_to_canned_text() {
        let responder = InformationResponder::new(Arc::new(HangingLlm), 0.7, 150)
            .with_timeout(Duration::from_millis(50));
        let text = tokio::time::timeout(
            Duration::from_secs(2),
            responder.respond(&InfoQuery::AboutAgent),
        )
        .await
        .expect("responder must give up on a stalled model");
        assert_eq!(text, AGENT_INFO);
    }
}

//! One reading pipeline shared by every entry point.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::GenerationError;
use crate::tarot::{
    CardSelector, ImageSynthesizer, InformationResponder, Reading, ReadingComposer,
    classify_information_query, determine_spread_type,
};

/// Anything that can turn a question into a finished reading.
#[async_trait]
pub trait ReadingSource: Send + Sync {
    async fn generate_reading(&self, question: &str) -> Result<Reading, GenerationError>;
}

/// Info check → classify → draw → compose → image.
pub struct ReadingPipeline {
    selector: CardSelector,
    composer: ReadingComposer,
    info: InformationResponder,
    images: Arc<ImageSynthesizer>,
}

impl ReadingPipeline {
    pub fn new(
        selector: CardSelector,
        composer: ReadingComposer,
        info: InformationResponder,
        images: Arc<ImageSynthesizer>,
    ) -> Self {
        Self {
            selector,
            composer,
            info,
            images,
        }
    }
}

#[async_trait]
impl ReadingSource for ReadingPipeline {
    async fn generate_reading(&self, question: &str) -> Result<Reading, GenerationError> {
        if let Some(query) = classify_information_query(question) {
            info!(query = query.label(), "Answering information query");
            let mut reading = Reading::informational(self.info.respond(&query).await);
            reading.image_url = Some(self.images.fallback_image());
            return Ok(reading);
        }

        let spread = determine_spread_type(question);
        let cards = self.selector.select_cards(spread)?;

        // Text first: a failed interpretation should not pay for an image.
        let mut reading = self.composer.compose_reading(question, cards, spread).await?;
        reading.image_url = Some(self.images.synthesize_image(&reading.cards).await);
        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
    use crate::tarot::{Answer, ComposerConfig, FallbackPool, SequenceRandom, SpreadType};

    struct MockLlm {
        reply: String,
        fail: bool,
        calls: Mutex<usize>,
    }

    impl MockLlm {
        fn new(reply: &str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.into(),
                fail,
                calls: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlm {
        fn model_name(&self) -> &str {
            "mock"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                return Err(LlmError::RequestFailed {
                    provider: "mock".into(),
                    reason: "down".into(),
                });
            }
            Ok(CompletionResponse {
                content: self.reply.clone(),
                input_tokens: 1,
                output_tokens: 1,
                finish_reason: FinishReason::Stop,
                response_id: None,
            })
        }
    }

    fn pipeline(llm: Arc<MockLlm>, values: Vec<f64>) -> ReadingPipeline {
        let random = Arc::new(SequenceRandom::new(values));
        let images = ImageSynthesizer::new(
            None,
            None,
            FallbackPool::from_base("https://img.example", 3),
            random.clone(),
            Duration::from_secs(1),
        );
        ReadingPipeline::new(
            CardSelector::new(random),
            ReadingComposer::new(llm.clone(), ComposerConfig::default()),
            InformationResponder::new(llm, 0.7, 150),
            Arc::new(images),
        )
    }

    #[tokio::test]
    async fn yes_no_reading_end_to_end() {
        for (values, expected) in [
            (vec![0.1, 0.9], Answer::No),
            (vec![0.1, 0.2], Answer::Yes),
        ] {
            let llm = MockLlm::new("The path opens.", false);
            let reading = pipeline(llm, values)
                .generate_reading("@pentacle-tarot Should I take the job?")
                .await
                .unwrap();

            assert_eq!(reading.spread, Some(SpreadType::YesNo));
            assert_eq!(reading.cards.len(), 1);
            assert_eq!(reading.answer, Some(expected));
            assert_eq!(
                reading.answer,
                Some(Answer::from_card(&reading.cards[0]))
            );
            let url = reading.image_url.as_deref().unwrap();
            assert!(url.starts_with("https://img.example/reading-"), "{url}");
        }
    }

    #[tokio::test]
    async fn three_card_spread_draws_three() {
        let llm = MockLlm::new("✧ one\n✧ two\n✧ three", false);
        let reading = pipeline(llm, vec![0.3, 0.7, 0.5, 0.2, 0.9, 0.1])
            .generate_reading("What does my love life look like?")
            .await
            .unwrap();
        assert_eq!(reading.spread, Some(SpreadType::Love));
        assert_eq!(reading.cards.len(), 3);
        assert!(reading.answer.is_none());
        assert!(reading.text().contains("✧ two"));
    }

    #[tokio::test]
    async fn information_query_draws_no_cards() {
        let llm = MockLlm::new("unused", false);
        let reading = pipeline(llm.clone(), vec![0.4])
            .generate_reading("what readings do you offer")
            .await
            .unwrap();
        assert!(reading.spread.is_none());
        assert!(reading.cards.is_empty());
        assert!(reading.image_url.is_some());
        // Spread listing is canned text.
        assert_eq!(*llm.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn generation_failure_surfaces() {
        let llm = MockLlm::new("", true);
        let err = pipeline(llm, vec![0.4])
            .generate_reading("Will it rain?")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Llm(_)));
    }
}

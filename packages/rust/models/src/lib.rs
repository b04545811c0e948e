//! Capability interfaces for the three model services, plus implementations.
//!
//! The orchestration code only ever sees the traits defined here. Concrete
//! backends are injected at construction time:
//! - [`http`]: clients for inference servers speaking a Hugging Face style JSON contract
//! - `stub`: deterministic in-memory implementations for tests (behind the `stub` feature)

pub mod http;
#[cfg(any(test, feature = "stub"))]
pub mod stub;

use std::sync::Arc;

use async_trait::async_trait;
use deckgen_shared::{AnswerResult, AppConfig, GeneratedSequence, Result, model_api_key};
use tracing::info;

pub use http::{HttpAnswerExtractor, HttpOptions, HttpQuestionGenerator, HttpTitleGenerator};

// ---------------------------------------------------------------------------
// Decoding parameters
// ---------------------------------------------------------------------------

/// Stochastic decoding constraints for question generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub do_sample: bool,
    pub top_k: u32,
    pub top_p: f64,
}

/// Deterministic beam-search settings for title generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeamParams {
    pub max_length: u32,
    pub num_beams: u32,
    pub early_stopping: bool,
    pub num_sequences: u32,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Produces candidate questions from a prompt.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// Generate `num_sequences` candidates of at most `max_length` tokens each.
    async fn generate(
        &self,
        prompt: &str,
        max_length: u32,
        num_sequences: u32,
        sampling: SamplingParams,
    ) -> Result<Vec<GeneratedSequence>>;
}

/// Extracts an answer span for a question from a context passage.
#[async_trait]
pub trait AnswerExtractor: Send + Sync {
    async fn extract(&self, question: &str, context: &str) -> Result<AnswerResult>;
}

/// Produces headline-style titles from a prompt.
#[async_trait]
pub trait TitleGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, params: BeamParams) -> Result<Vec<GeneratedSequence>>;
}

// ---------------------------------------------------------------------------
// Service bundle
// ---------------------------------------------------------------------------

/// Long-lived, read-only model handles shared by every request.
#[derive(Clone)]
pub struct ModelServices {
    pub question_generator: Arc<dyn QuestionGenerator>,
    pub answer_extractor: Arc<dyn AnswerExtractor>,
    pub title_generator: Arc<dyn TitleGenerator>,
}

impl ModelServices {
    /// Build HTTP clients for all three services from the `[models]` config section.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let models = &config.models;
        let api_key = model_api_key(config);
        if api_key.is_none() {
            tracing::debug!(env = %models.api_key_env, "no model API key set, sending unauthenticated requests");
        }

        let opts = HttpOptions {
            timeout_secs: models.timeout_secs,
            api_key,
        };

        for (service, endpoint) in [
            ("question_generator", &models.question_generator),
            ("answer_extractor", &models.answer_extractor),
            ("title_generator", &models.title_generator),
        ] {
            info!(
                service,
                endpoint = %endpoint.endpoint,
                model = endpoint.model.as_deref().unwrap_or("unspecified"),
                "configured model service"
            );
        }

        Ok(Self {
            question_generator: Arc::new(HttpQuestionGenerator::new(
                models.question_generator.url()?,
                &opts,
            )?),
            answer_extractor: Arc::new(HttpAnswerExtractor::new(
                models.answer_extractor.url()?,
                &opts,
            )?),
            title_generator: Arc::new(HttpTitleGenerator::new(
                models.title_generator.url()?,
                &opts,
            )?),
        })
    }
}

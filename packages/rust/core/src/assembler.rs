//! Flashcard assembler.
//!
//! Asks the question generator for a batch of candidates, runs each one
//! through the answer extractor against the original text, and keeps the
//! pairs whose confidence clears the threshold.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument};

use deckgen_models::{AnswerExtractor, QuestionGenerator, SamplingParams};
use deckgen_shared::{AssemblerConfig, DeckgenError, Flashcard, Result};

use crate::heuristic::question_count;

/// Instruction prefix the question generation model was fine-tuned on.
pub const QUESTION_PROMPT_PREFIX: &str = "generate questions: ";

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for flashcard assembly.
pub trait AssemblyProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once per candidate, in generation order.
    fn answer_extracted(&self, current: usize, total: usize, kept: bool);
}

/// No-op assembly progress.
pub struct SilentAssemblyProgress;

impl AssemblyProgress for SilentAssemblyProgress {
    fn phase(&self, _name: &str) {}
    fn answer_extracted(&self, _current: usize, _total: usize, _kept: bool) {}
}

// ---------------------------------------------------------------------------
// Assembler
// ---------------------------------------------------------------------------

/// Turns free-form text into an ordered, confidence-filtered deck.
///
/// Holds no per-request state; one instance serves all requests.
pub struct FlashcardAssembler {
    generator: Arc<dyn QuestionGenerator>,
    extractor: Arc<dyn AnswerExtractor>,
    config: AssemblerConfig,
}

impl FlashcardAssembler {
    pub fn new(
        generator: Arc<dyn QuestionGenerator>,
        extractor: Arc<dyn AnswerExtractor>,
        config: AssemblerConfig,
    ) -> Self {
        Self {
            generator,
            extractor,
            config,
        }
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Generate and filter flashcards for `text`.
    pub async fn assemble(&self, text: &str) -> Result<Vec<Flashcard>> {
        self.assemble_with_progress(text, &SilentAssemblyProgress)
            .await
    }

    /// Like [`assemble`](Self::assemble), reporting progress as candidates are processed.
    ///
    /// Any model failure aborts the whole assembly; in-flight extractions are
    /// dropped and no partial deck is returned.
    #[instrument(skip_all, fields(chars = text.chars().count()))]
    pub async fn assemble_with_progress(
        &self,
        text: &str,
        progress: &dyn AssemblyProgress,
    ) -> Result<Vec<Flashcard>> {
        let requested = question_count(text);

        progress.phase("Generating questions");
        let prompt = format!("{QUESTION_PROMPT_PREFIX}{text}");
        let sampling = SamplingParams {
            do_sample: self.config.do_sample,
            top_k: self.config.top_k,
            top_p: self.config.top_p,
        };
        let candidates = self
            .generator
            .generate(&prompt, self.config.max_length, requested, sampling)
            .await?;

        let questions: Vec<String> = candidates
            .into_iter()
            .map(|seq| seq.generated_text)
            .collect();
        let total = questions.len();
        debug!(requested, generated = total, "questions generated");

        progress.phase("Extracting answers");
        let threshold = self.config.confidence_threshold;

        // `buffered` yields in input order no matter which call finishes first.
        let mut extractions = stream::iter(questions)
            .map(|question| async move {
                let result = self.extractor.extract(&question, text).await?;
                Ok::<_, DeckgenError>((question, result))
            })
            .buffered(self.config.max_concurrent_extractions.max(1));

        let mut deck = Vec::new();
        let mut current = 0;
        while let Some(extraction) = extractions.next().await {
            let (question, result) = extraction?;
            current += 1;

            let kept = passes_threshold(result.score, threshold);
            progress.answer_extracted(current, total, kept);

            if kept {
                deck.push(Flashcard {
                    question,
                    answer: result.answer,
                });
            } else {
                debug!(%question, score = result.score, "dropping low-confidence answer");
            }
        }

        info!(
            requested,
            generated = total,
            kept = deck.len(),
            "flashcard assembly complete"
        );

        Ok(deck)
    }
}

/// Strictly greater than: a score equal to the threshold is rejected, as is NaN.
fn passes_threshold(score: f64, threshold: f64) -> bool {
    score > threshold
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Deterministic in-memory model services.
//!
//! These replay scripted outputs and record what they were asked, so the
//! orchestration layers can be exercised without a live inference server.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use deckgen_shared::{AnswerResult, DeckgenError, GeneratedSequence, Result};

use crate::{AnswerExtractor, BeamParams, QuestionGenerator, SamplingParams, TitleGenerator};

/// Arguments of one recorded question generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateCall {
    pub prompt: String,
    pub max_length: u32,
    pub num_sequences: u32,
    pub sampling: SamplingParams,
}

/// Question generator that cycles through a fixed list of questions.
///
/// Returns exactly as many sequences as requested, repeating the list if needed.
#[derive(Debug, Default)]
pub struct ScriptedQuestionGenerator {
    questions: Vec<String>,
    fail_with: Option<String>,
    calls: Mutex<Vec<GenerateCall>>,
}

impl ScriptedQuestionGenerator {
    pub fn new<I, S>(questions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            questions: questions.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// A generator whose every call fails with a model error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Default::default()
        }
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<GenerateCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl QuestionGenerator for ScriptedQuestionGenerator {
    async fn generate(
        &self,
        prompt: &str,
        max_length: u32,
        num_sequences: u32,
        sampling: SamplingParams,
    ) -> Result<Vec<GeneratedSequence>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(GenerateCall {
                prompt: prompt.to_string(),
                max_length,
                num_sequences,
                sampling,
            });

        if let Some(message) = &self.fail_with {
            return Err(DeckgenError::model("question_generator", message.clone()));
        }
        if self.questions.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self
            .questions
            .iter()
            .cycle()
            .take(num_sequences as usize)
            .map(GeneratedSequence::new)
            .collect())
    }
}

/// How a [`ScriptedAnswerExtractor`] scores each call.
#[derive(Debug)]
enum Scoring {
    /// Same score for every question.
    Constant(f64),
    /// Scores consumed in call order; exhausted queue scores 0.0.
    Sequence(Mutex<VecDeque<f64>>),
    /// Score looked up by question text; unknown questions score 0.0.
    ByQuestion(Vec<(String, f64)>),
    /// Fail when asked about this question.
    FailOn(String),
}

/// Answer extractor with scripted confidence scores.
///
/// The answer span is always `"answer to <question>"` so tests can match
/// answers back to questions.
#[derive(Debug)]
pub struct ScriptedAnswerExtractor {
    scoring: Scoring,
    calls: Mutex<Vec<String>>,
}

impl ScriptedAnswerExtractor {
    fn with(scoring: Scoring) -> Self {
        Self {
            scoring,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn constant(score: f64) -> Self {
        Self::with(Scoring::Constant(score))
    }

    pub fn sequence(scores: impl IntoIterator<Item = f64>) -> Self {
        Self::with(Scoring::Sequence(Mutex::new(scores.into_iter().collect())))
    }

    pub fn by_question<I, S>(scores: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self::with(Scoring::ByQuestion(
            scores.into_iter().map(|(q, s)| (q.into(), s)).collect(),
        ))
    }

    pub fn failing_on(question: impl Into<String>) -> Self {
        Self::with(Scoring::FailOn(question.into()))
    }

    /// Questions asked so far, in call order.
    pub fn questions_seen(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// The answer span this stub returns for `question`.
    pub fn answer_for(question: &str) -> String {
        format!("answer to {question}")
    }
}

#[async_trait]
impl AnswerExtractor for ScriptedAnswerExtractor {
    async fn extract(&self, question: &str, _context: &str) -> Result<AnswerResult> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(question.to_string());

        let score = match &self.scoring {
            Scoring::Constant(score) => *score,
            Scoring::Sequence(queue) => queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
                .unwrap_or(0.0),
            Scoring::ByQuestion(table) => table
                .iter()
                .find(|(q, _)| q == question)
                .map(|(_, s)| *s)
                .unwrap_or(0.0),
            Scoring::FailOn(bad) if bad == question => {
                return Err(DeckgenError::model(
                    "answer_extractor",
                    format!("scripted failure for '{question}'"),
                ));
            }
            Scoring::FailOn(_) => 1.0,
        };

        Ok(AnswerResult {
            answer: Self::answer_for(question),
            score,
        })
    }
}

/// Title generator returning a fixed raw sequence (markers and whitespace included).
#[derive(Debug, Default)]
pub struct FixedTitleGenerator {
    raw: Option<String>,
    fail_with: Option<String>,
    calls: Mutex<Vec<(String, BeamParams)>>,
}

impl FixedTitleGenerator {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: Some(raw.into()),
            ..Default::default()
        }
    }

    /// A generator whose every call fails with a model error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Default::default()
        }
    }

    /// A generator that returns no sequences at all.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(String, BeamParams)> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl TitleGenerator for FixedTitleGenerator {
    async fn generate(&self, prompt: &str, params: BeamParams) -> Result<Vec<GeneratedSequence>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((prompt.to_string(), params));

        if let Some(message) = &self.fail_with {
            return Err(DeckgenError::model("title_generator", message.clone()));
        }
        Ok(self.raw.iter().map(GeneratedSequence::new).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampling() -> SamplingParams {
        SamplingParams {
            do_sample: true,
            top_k: 30,
            top_p: 0.95,
        }
    }

    #[tokio::test]
    async fn scripted_generator_cycles_to_requested_count() {
        let generator = ScriptedQuestionGenerator::new(["Q1", "Q2"]);
        let out = generator.generate("p", 40, 5, sampling()).await.unwrap();
        let texts: Vec<_> = out.into_iter().map(|s| s.generated_text).collect();
        assert_eq!(texts, ["Q1", "Q2", "Q1", "Q2", "Q1"]);
        assert_eq!(generator.calls()[0].num_sequences, 5);
    }

    #[tokio::test]
    async fn sequence_scores_are_consumed_in_order() {
        let extractor = ScriptedAnswerExtractor::sequence([0.5, 0.1]);
        assert_eq!(extractor.extract("a", "c").await.unwrap().score, 0.5);
        assert_eq!(extractor.extract("b", "c").await.unwrap().score, 0.1);
        assert_eq!(extractor.extract("c", "c").await.unwrap().score, 0.0);
        assert_eq!(extractor.questions_seen(), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn failing_on_only_fails_matching_question() {
        let extractor = ScriptedAnswerExtractor::failing_on("bad");
        assert!(extractor.extract("good", "c").await.is_ok());
        assert!(extractor.extract("bad", "c").await.is_err());
    }

    #[tokio::test]
    async fn empty_title_generator_returns_nothing() {
        let generator = FixedTitleGenerator::empty();
        let params = BeamParams {
            max_length: 20,
            num_beams: 3,
            early_stopping: true,
            num_sequences: 1,
        };
        assert!(generator.generate("headline: x", params).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_title_generator_still_records_the_call() {
        let generator = FixedTitleGenerator::failing("HTTP 503");
        let params = BeamParams {
            max_length: 20,
            num_beams: 3,
            early_stopping: true,
            num_sequences: 1,
        };
        let err = generator.generate("headline: x", params).await.unwrap_err();
        assert!(matches!(err, DeckgenError::Model { service: "title_generator", .. }));
        assert_eq!(generator.calls().len(), 1);
    }

    #[test]
    fn poisoned_lock_keeps_recorded_calls() {
        let generator = ScriptedQuestionGenerator::new(["Q1"]);
        generator.calls.lock().unwrap().push(GenerateCall {
            prompt: "p".into(),
            max_length: 40,
            num_sequences: 1,
            sampling: sampling(),
        });

        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = generator.calls.lock().unwrap();
            panic!("poison the lock");
        }));
        assert!(generator.calls.is_poisoned());
        assert_eq!(generator.calls().len(), 1);
    }
}

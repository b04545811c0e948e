//! Core domain types for flashcard decks.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Body of both generation endpoints: a single block of free-form text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextInput {
    /// Raw input text. Only its length influences how many questions are requested.
    pub text: String,
}

impl TextInput {
    /// Length in characters (Unicode scalar values), not bytes.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

// ---------------------------------------------------------------------------
// Model outputs
// ---------------------------------------------------------------------------

/// One sequence returned by a text-to-text generation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedSequence {
    pub generated_text: String,
}

impl GeneratedSequence {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            generated_text: text.into(),
        }
    }
}

/// Span answer extracted for one candidate question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    /// Extracted answer span.
    pub answer: String,
    /// Extraction confidence. Not calibrated; usually within `[0, 1]`.
    pub score: f64,
}

// ---------------------------------------------------------------------------
// Deck output
// ---------------------------------------------------------------------------

/// A question/answer pair that survived the confidence filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

/// Cleaned, headline-style title for a deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckTitle {
    pub title: String,
}

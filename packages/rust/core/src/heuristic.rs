//! How many candidate questions to request for a given input.

/// Inputs longer than this many characters get the fixed cap.
const LONG_TEXT_CHARS: usize = 1500;

/// Question count for long inputs.
const MAX_QUESTIONS: u32 = 15;

/// Smallest deck worth generating.
const MIN_QUESTIONS: u32 = 3;

/// Roughly one question per this many characters.
const CHARS_PER_QUESTION: usize = 100;

/// Number of questions to request for `text`, measured in characters.
pub fn question_count(text: &str) -> u32 {
    question_count_for_len(text.chars().count())
}

/// `15` above 1500 characters, otherwise `max(3, len / 100 + 1)`.
pub fn question_count_for_len(len: usize) -> u32 {
    if len > LONG_TEXT_CHARS {
        return MAX_QUESTIONS;
    }
    // At exactly 1500 this yields 16; the cap is strictly "greater than".
    let scaled = (len / CHARS_PER_QUESTION) as u32 + 1;
    scaled.max(MIN_QUESTIONS)
}

//! Core orchestration for deckgen.
//!
//! This crate turns text into flashcard decks and titles by driving the
//! model services defined in `deckgen-models`:
//! - [`heuristic`]: how many candidate questions to request
//! - [`assembler`]: question generation, answer extraction, confidence filtering
//! - [`title`]: headline generation and cleanup

pub mod assembler;
pub mod heuristic;
pub mod title;

use std::sync::Arc;

use deckgen_models::ModelServices;
use deckgen_shared::{AppConfig, AssemblerConfig, TitleConfig};

pub use assembler::{AssemblyProgress, FlashcardAssembler, SilentAssemblyProgress};
pub use heuristic::question_count;
pub use title::{TitleService, normalize_title};

/// Both request flows wired to one set of model services.
#[derive(Clone)]
pub struct DeckGenerator {
    pub assembler: Arc<FlashcardAssembler>,
    pub titles: Arc<TitleService>,
}

impl DeckGenerator {
    pub fn new(services: &ModelServices, config: &AppConfig) -> Self {
        Self {
            assembler: Arc::new(FlashcardAssembler::new(
                Arc::clone(&services.question_generator),
                Arc::clone(&services.answer_extractor),
                AssemblerConfig::from(config),
            )),
            titles: Arc::new(TitleService::new(
                Arc::clone(&services.title_generator),
                TitleConfig::from(config),
            )),
        }
    }
}

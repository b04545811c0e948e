//! Shared types, error model, and configuration for deckgen.
//!
//! This crate is the foundation depended on by all other deckgen crates.
//! It provides:
//! - [`DeckgenError`]: the unified error type
//! - Domain types ([`TextInput`], [`Flashcard`], [`AnswerResult`], [`DeckTitle`])
//! - Configuration ([`AppConfig`], [`AssemblerConfig`], [`TitleConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AssemblerConfig, FlashcardsConfig, ModelEndpoint, ModelsConfig, ServerConfig,
    TitleConfig, TitleSettings, config_dir, config_file_path, init_config, load_config,
    load_config_from, model_api_key, validate_config,
};
pub use error::{DeckgenError, Result};
pub use types::{AnswerResult, DeckTitle, Flashcard, GeneratedSequence, TextInput};

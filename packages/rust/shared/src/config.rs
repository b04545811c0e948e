//! Application configuration for deckgen.
//!
//! User config lives at `~/.deckgen/deckgen.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DeckgenError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "deckgen.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".deckgen";

// ---------------------------------------------------------------------------
// Config structs (matching deckgen.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Model service endpoints and credentials.
    #[serde(default)]
    pub models: ModelsConfig,

    /// Flashcard generation tunables.
    #[serde(default)]
    pub flashcards: FlashcardsConfig,

    /// Deck title generation tunables.
    #[serde(default)]
    pub title: TitleSettings,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Largest accepted request body in bytes. Larger bodies get 413.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".into()
}

fn default_max_body_bytes() -> usize {
    16 * 1024 * 1024
}

/// `[models]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Name of the env var holding a bearer token (never store the token itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Optional per-call transport timeout. Unset means calls may block indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default = "default_question_generator")]
    pub question_generator: ModelEndpoint,

    #[serde(default = "default_answer_extractor")]
    pub answer_extractor: ModelEndpoint,

    #[serde(default = "default_title_generator")]
    pub title_generator: ModelEndpoint,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            timeout_secs: None,
            question_generator: default_question_generator(),
            answer_extractor: default_answer_extractor(),
            title_generator: default_title_generator(),
        }
    }
}

/// `[models.<service>]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEndpoint {
    /// URL that accepts the inference POST.
    pub endpoint: String,
    /// Model identifier, informational only (logged at startup).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ModelEndpoint {
    /// Parse the endpoint as an absolute URL.
    pub fn url(&self) -> Result<Url> {
        Url::parse(&self.endpoint).map_err(|e| {
            DeckgenError::config(format!("invalid model endpoint '{}': {e}", self.endpoint))
        })
    }
}

fn default_api_key_env() -> String {
    "DECKGEN_MODEL_API_KEY".into()
}
fn default_question_generator() -> ModelEndpoint {
    ModelEndpoint {
        endpoint: "http://127.0.0.1:8080/models/question-generator".into(),
        model: Some("ZhangCheng/T5-Base-Fine-Tuned-for-Question-Generation".into()),
    }
}
fn default_answer_extractor() -> ModelEndpoint {
    ModelEndpoint {
        endpoint: "http://127.0.0.1:8080/models/answer-extractor".into(),
        model: Some("mrm8488/spanbert-finetuned-squadv1".into()),
    }
}
fn default_title_generator() -> ModelEndpoint {
    ModelEndpoint {
        endpoint: "http://127.0.0.1:8080/models/title-generator".into(),
        model: Some("Michau/t5-base-en-generate-headline".into()),
    }
}

/// `[flashcards]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashcardsConfig {
    /// Answers must score strictly above this to be kept.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Maximum generated length per candidate question.
    #[serde(default = "default_question_max_length")]
    pub max_length: u32,

    #[serde(default = "default_true")]
    pub do_sample: bool,

    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default = "default_top_p")]
    pub top_p: f64,

    /// Upper bound on answer extractions in flight for one request.
    #[serde(default = "default_max_concurrent_extractions")]
    pub max_concurrent_extractions: usize,

    /// Reject `/generate_qa` input shorter than this many characters. 0 disables the check.
    #[serde(default)]
    pub min_text_chars: usize,
}

impl Default for FlashcardsConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            max_length: default_question_max_length(),
            do_sample: true,
            top_k: default_top_k(),
            top_p: default_top_p(),
            max_concurrent_extractions: default_max_concurrent_extractions(),
            min_text_chars: 0,
        }
    }
}

fn default_confidence_threshold() -> f64 {
    0.2
}
fn default_question_max_length() -> u32 {
    40
}
fn default_true() -> bool {
    true
}
fn default_top_k() -> u32 {
    30
}
fn default_top_p() -> f64 {
    0.95
}
fn default_max_concurrent_extractions() -> usize {
    4
}

/// `[title]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleSettings {
    #[serde(default = "default_title_max_length")]
    pub max_length: u32,

    #[serde(default = "default_num_beams")]
    pub num_beams: u32,

    #[serde(default = "default_true")]
    pub early_stopping: bool,

    /// Literal substrings stripped from the generated title before trimming.
    #[serde(default = "default_padding_markers")]
    pub padding_markers: Vec<String>,
}

impl Default for TitleSettings {
    fn default() -> Self {
        Self {
            max_length: default_title_max_length(),
            num_beams: default_num_beams(),
            early_stopping: true,
            padding_markers: default_padding_markers(),
        }
    }
}

fn default_title_max_length() -> u32 {
    20
}
fn default_num_beams() -> u32 {
    3
}
fn default_padding_markers() -> Vec<String> {
    vec!["<pad>".into()]
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config file + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime configuration for the flashcard assembler.
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    pub confidence_threshold: f64,
    pub max_length: u32,
    pub do_sample: bool,
    pub top_k: u32,
    pub top_p: f64,
    /// Always at least 1.
    pub max_concurrent_extractions: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for AssemblerConfig {
    fn from(config: &AppConfig) -> Self {
        let f = &config.flashcards;
        Self {
            confidence_threshold: f.confidence_threshold,
            max_length: f.max_length,
            do_sample: f.do_sample,
            top_k: f.top_k,
            top_p: f.top_p,
            max_concurrent_extractions: f.max_concurrent_extractions.max(1),
        }
    }
}

/// Runtime configuration for deck title generation.
#[derive(Debug, Clone)]
pub struct TitleConfig {
    pub max_length: u32,
    pub num_beams: u32,
    pub early_stopping: bool,
    pub padding_markers: Vec<String>,
}

impl Default for TitleConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for TitleConfig {
    fn from(config: &AppConfig) -> Self {
        let t = &config.title;
        Self {
            max_length: t.max_length,
            num_beams: t.num_beams,
            early_stopping: t.early_stopping,
            padding_markers: t.padding_markers.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.deckgen/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DeckgenError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.deckgen/deckgen.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DeckgenError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        DeckgenError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DeckgenError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DeckgenError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DeckgenError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject configs that would make the pipelines misbehave.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let models = &config.models;
    for endpoint in [
        &models.question_generator,
        &models.answer_extractor,
        &models.title_generator,
    ] {
        endpoint.url()?;
    }

    if config.server.max_body_bytes == 0 {
        return Err(DeckgenError::config("server.max_body_bytes must be at least 1"));
    }

    let f = &config.flashcards;
    if !f.confidence_threshold.is_finite() {
        return Err(DeckgenError::config(
            "flashcards.confidence_threshold must be a finite number",
        ));
    }
    if !(f.top_p > 0.0 && f.top_p <= 1.0) {
        return Err(DeckgenError::config(format!(
            "flashcards.top_p must be in (0, 1], got {}",
            f.top_p
        )));
    }
    if config.title.num_beams == 0 {
        return Err(DeckgenError::config("title.num_beams must be at least 1"));
    }
    Ok(())
}

/// Read the bearer token for model services, if its env var is set and non-empty.
pub fn model_api_key(config: &AppConfig) -> Option<String> {
    std::env::var(&config.models.api_key_env)
        .ok()
        .filter(|val| !val.is_empty())
}

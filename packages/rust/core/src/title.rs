//! Deck title generation and cleanup.

use std::sync::Arc;

use tracing::{debug, instrument};

use deckgen_models::{BeamParams, TitleGenerator};
use deckgen_shared::{DeckTitle, DeckgenError, Result, TitleConfig};

/// Instruction prefix the headline model was fine-tuned on.
pub const TITLE_PROMPT_PREFIX: &str = "headline: ";

/// Generates one headline per request and cleans it up.
pub struct TitleService {
    generator: Arc<dyn TitleGenerator>,
    config: TitleConfig,
}

impl TitleService {
    pub fn new(generator: Arc<dyn TitleGenerator>, config: TitleConfig) -> Self {
        Self { generator, config }
    }

    /// Generate a title for `text`.
    ///
    /// An empty title after cleanup is returned as-is; there is no retry or fallback.
    #[instrument(skip_all, fields(chars = text.chars().count()))]
    pub async fn title_for(&self, text: &str) -> Result<DeckTitle> {
        let prompt = format!("{TITLE_PROMPT_PREFIX}{text}");
        let params = BeamParams {
            max_length: self.config.max_length,
            num_beams: self.config.num_beams,
            early_stopping: self.config.early_stopping,
            num_sequences: 1,
        };

        let sequences = self.generator.generate(&prompt, params).await?;
        let raw = sequences.into_iter().next().ok_or_else(|| {
            DeckgenError::model("title_generator", "no sequences returned")
        })?;

        let title = normalize_title(&raw.generated_text, &self.config.padding_markers);
        debug!(raw = %raw.generated_text, %title, "title generated");

        Ok(DeckTitle { title })
    }
}

/// Strip every occurrence of each marker, then trim surrounding whitespace.
///
/// Removal repeats until no marker remains, so `"<<pad>pad>"` cannot leave a
/// reassembled `"<pad>"` behind.
pub fn normalize_title(raw: &str, padding_markers: &[String]) -> String {
    let markers: Vec<&str> = padding_markers
        .iter()
        .map(String::as_str)
        .filter(|m| !m.is_empty())
        .collect();

    let mut cleaned = raw.to_string();
    while let Some(marker) = markers.iter().find(|m| cleaned.contains(**m)) {
        cleaned = cleaned.replace(*marker, "");
    }
    cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
    use deckgen_models::stub::FixedTitleGenerator;

    use super::*;

    fn pad() -> Vec<String> {
        vec!["<pad>".to_string()]
    }

    #[test]
    fn strips_markers_and_whitespace() {
        assert_eq!(
            normalize_title("<pad> AI Transforms Healthcare  ", &pad()),
            "AI Transforms Healthcare"
        );
        assert_eq!(normalize_title("<pad>Tigers<pad> Rule<pad>", &pad()), "Tigers Rule");
    }

    #[test]
    fn marker_only_becomes_empty() {
        assert_eq!(normalize_title("<pad> <pad>\n", &pad()), "");
    }

    #[test]
    fn leaves_clean_titles_alone() {
        assert_eq!(normalize_title("Big Cats", &pad()), "Big Cats");
    }

    #[test]
    fn nested_marker_is_fully_removed() {
        assert_eq!(normalize_title("<<pad>pad> Big Cats", &pad()), "Big Cats");
    }

    #[test]
    fn multiple_markers() {
        let markers = vec!["<pad>".to_string(), "</s>".to_string()];
        assert_eq!(normalize_title("<pad> Apex Predators</s>", &markers), "Apex Predators");
    }

    #[test]
    fn empty_marker_is_ignored() {
        assert_eq!(normalize_title(" x ", &[String::new()]), "x");
    }

    #[test]
    fn output_never_contains_marker_or_outer_whitespace() {
        let samples = [
            "<pad>",
            "  <pad>  Headline <pad> ",
            "\t<pad>The <pad>Tiger\n",
            "<<pad>pad>",
        ];
        for raw in samples {
            let title = normalize_title(raw, &pad());
            assert_eq!(title, title.trim(), "raw = {raw:?}");
            assert!(!title.contains("<pad>"), "raw = {raw:?}");
        }
    }

    #[tokio::test]
    async fn title_for_uses_beam_search_prompt() {
        let generator = Arc::new(FixedTitleGenerator::new("<pad> The History of AI in Medicine"));
        let service = TitleService::new(generator.clone(), TitleConfig::default());

        let title = service
            .title_for("This article explains the history of AI and its applications in healthcare.")
            .await
            .unwrap();
        assert_eq!(title.title, "The History of AI in Medicine");

        let (prompt, params) = generator.calls().remove(0);
        assert!(prompt.starts_with("headline: This article"));
        assert_eq!(
            params,
            BeamParams {
                max_length: 20,
                num_beams: 3,
                early_stopping: true,
                num_sequences: 1,
            }
        );
    }

    #[tokio::test]
    async fn empty_title_is_not_an_error() {
        let generator = Arc::new(FixedTitleGenerator::new("<pad>  "));
        let service = TitleService::new(generator, TitleConfig::default());
        let title = service.title_for("x").await.unwrap();
        assert_eq!(title.title, "");
    }

    #[tokio::test]
    async fn generator_error_propagates() {
        let service = TitleService::new(
            Arc::new(FixedTitleGenerator::failing("HTTP 503: model loading")),
            TitleConfig::default(),
        );
        let err = service.title_for("Tigers are big cats.").await.unwrap_err();
        match err {
            DeckgenError::Model { service, message } => {
                assert_eq!(service, "title_generator");
                assert!(message.contains("HTTP 503"));
            }
            other => panic!("expected model error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_sequences_is_model_error() {
        let service = TitleService::new(
            Arc::new(FixedTitleGenerator::empty()),
            TitleConfig::default(),
        );
        let err = service.title_for("x").await.unwrap_err();
        assert!(matches!(err, DeckgenError::Model { service: "title_generator", .. }));
    }
}

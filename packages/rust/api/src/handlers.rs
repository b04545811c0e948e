//! Request handlers for the generation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};
use tracing::{info, instrument};
use uuid::Uuid;

use deckgen_shared::{DeckTitle, DeckgenError, Flashcard, Result, TextInput};

use crate::AppState;
use crate::error::ApiError;

/// `POST /generate_qa`
pub(crate) async fn generate_qa(
    State(state): State<Arc<AppState>>,
    Json(input): Json<TextInput>,
) -> std::result::Result<Json<Vec<Flashcard>>, ApiError> {
    let deck = flashcards_for(&state, &input).await?;
    Ok(Json(deck))
}

/// `POST /generate_deck_title`
pub(crate) async fn generate_deck_title(
    State(state): State<Arc<AppState>>,
    Json(input): Json<TextInput>,
) -> std::result::Result<Json<DeckTitle>, ApiError> {
    let title = title_for(&state, &input).await?;
    Ok(Json(title))
}

/// `GET /health`
pub(crate) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[instrument(skip_all, fields(request_id = %Uuid::now_v7(), chars = input.char_len()))]
async fn flashcards_for(state: &AppState, input: &TextInput) -> Result<Vec<Flashcard>> {
    let min = state.min_text_chars;
    let chars = input.char_len();
    if min > 0 && chars < min {
        return Err(DeckgenError::validation(format!(
            "text must be at least {min} characters, got {chars}"
        )));
    }

    let deck = state.deck.assembler.assemble(&input.text).await?;
    info!(cards = deck.len(), "flashcards generated");
    Ok(deck)
}

#[instrument(skip_all, fields(request_id = %Uuid::now_v7(), chars = input.char_len()))]
async fn title_for(state: &AppState, input: &TextInput) -> Result<DeckTitle> {
    let title = state.deck.titles.title_for(&input.text).await?;
    info!(title = %title.title, "deck title generated");
    Ok(title)
}

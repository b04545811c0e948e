//! HTTP surface for deckgen.
//!
//! Exposes the two generation flows as JSON endpoints:
//! - `POST /generate_qa`: `{text}` → `[{question, answer}, ...]`
//! - `POST /generate_deck_title`: `{text}` → `{title}`
//! - `GET /health`: liveness probe

mod error;
mod handlers;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use deckgen_core::DeckGenerator;
use deckgen_shared::AppConfig;

pub use error::ApiError;

/// State shared by every request. Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub deck: DeckGenerator,
    /// Minimum `/generate_qa` input length in characters; 0 disables the check.
    pub min_text_chars: usize,
    /// Request body cap in bytes.
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(deck: DeckGenerator, config: &AppConfig) -> Self {
        Self {
            deck,
            min_text_chars: config.flashcards.min_text_chars,
            max_body_bytes: config.server.max_body_bytes,
        }
    }
}

/// Build the router with all routes and request tracing.
pub fn router(state: AppState) -> Router {
    let body_limit = state.max_body_bytes;
    Router::new()
        .route("/generate_qa", post(handlers::generate_qa))
        .route("/generate_deck_title", post(handlers::generate_deck_title))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Serve on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(%addr, "deckgen server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("deckgen server stopped");
    Ok(())
}

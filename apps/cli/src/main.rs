//! deckgen CLI: flashcard and deck title generation service.
//!
//! Runs the HTTP server, or generates a deck from text directly against
//! the configured model services.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}

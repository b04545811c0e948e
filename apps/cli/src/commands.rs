//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use deckgen_api::AppState;
use deckgen_core::{AssemblyProgress, DeckGenerator};
use deckgen_models::ModelServices;
use deckgen_shared::{AppConfig, init_config, load_config, load_config_from};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// deckgen: turn text into flashcard decks.
#[derive(Parser)]
#[command(
    name = "deckgen",
    version,
    about = "Generate flashcards and deck titles from text using hosted language models.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.deckgen/deckgen.toml).
    #[arg(long, env = "DECKGEN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Start the HTTP server exposing /generate_qa and /generate_deck_title.
    Serve {
        /// Address to bind (overrides [server].bind).
        #[arg(long)]
        bind: Option<String>,
    },

    /// Generate flashcards for a text and print them as JSON.
    Qa {
        /// Input text. Read from --file or stdin when omitted.
        text: Option<String>,

        /// Read the input text from a file.
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// Generate a deck title for a text and print it as JSON.
    Title {
        /// Input text. Read from --file or stdin when omitted.
        text: Option<String>,

        /// Read the input text from a file.
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "deckgen=info",
        1 => "deckgen=debug,tower_http=debug",
        _ => "deckgen=trace,tower_http=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Serve { bind } => cmd_serve(config_path.as_deref(), bind).await,
        Command::Qa { text, file } => cmd_qa(config_path.as_deref(), text, file).await,
        Command::Title { text, file } => cmd_title(config_path.as_deref(), text, file).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path.as_deref()).await,
        },
    }
}

/// Load the config from `--config` if given, otherwise the default location.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Wire the configured HTTP model services into both generation flows.
fn build_generator(config: &AppConfig) -> Result<DeckGenerator> {
    let services = ModelServices::from_config(config)?;
    Ok(DeckGenerator::new(&services, config))
}

/// Input text from the positional argument, a file, or stdin, in that order.
fn read_text(text: Option<String>, file: Option<&Path>) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read '{}'", path.display()));
    }
    std::io::read_to_string(std::io::stdin()).wrap_err("failed to read text from stdin")
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(config_path: Option<&Path>, bind: Option<String>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let deck = build_generator(&config)?;
    let state = AppState::new(deck, &config);

    let addr = bind.unwrap_or_else(|| config.server.bind.clone());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| eyre!("cannot bind '{addr}': {e}"))?;

    info!(
        %addr,
        threshold = config.flashcards.confidence_threshold,
        "starting deckgen server"
    );

    deckgen_api::serve(listener, state, async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl-C, shutting down");
        }
    })
    .await?;

    Ok(())
}

async fn cmd_qa(
    config_path: Option<&Path>,
    text: Option<String>,
    file: Option<PathBuf>,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let deck = build_generator(&config)?;
    let text = read_text(text, file.as_deref())?;

    let reporter = CliProgress::new();
    let result = deck.assembler.assemble_with_progress(&text, &reporter).await;
    reporter.finish();

    let cards = result?;
    println!("{}", serde_json::to_string_pretty(&cards)?);
    Ok(())
}

async fn cmd_title(
    config_path: Option<&Path>,
    text: Option<String>,
    file: Option<PathBuf>,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let deck = build_generator(&config)?;
    let text = read_text(text, file.as_deref())?;

    let title = deck.titles.title_for(&text).await?;
    println!("{}", serde_json::to_string_pretty(&title)?);
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner on stderr.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl AssemblyProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn answer_extracted(&self, current: usize, total: usize, kept: bool) {
        let verdict = if kept { "kept" } else { "dropped" };
        self.spinner
            .set_message(format!("Extracting answers [{current}/{total}] last {verdict}"));
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_qa_with_file() {
        let cli = Cli::parse_from(["deckgen", "qa", "--file", "notes.txt", "-v"]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Qa { text, file } => {
                assert!(text.is_none());
                assert_eq!(file, Some(PathBuf::from("notes.txt")));
            }
            _ => panic!("expected qa"),
        }
    }

    #[test]
    fn text_and_file_conflict() {
        let result = Cli::try_parse_from(["deckgen", "title", "some text", "--file", "a.txt"]);
        assert!(result.is_err());
    }

    #[test]
    fn positional_text_wins() {
        let text = read_text(Some("Tigers are cats.".into()), None).unwrap();
        assert_eq!(text, "Tigers are cats.");
    }

    #[test]
    fn missing_file_is_reported() {
        let err = read_text(None, Some(Path::new("/definitely/not/here.txt"))).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}

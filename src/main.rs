use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod config;
mod engine;
mod flavor;
mod gguf;
mod provider;

use config::Settings;
use engine::Translator;
use flavor::FlavorCatalog;
use provider::llama::LlamaCppProvider;

/// Translate text with a locally loaded GGUF model.
#[derive(Parser, Debug)]
#[command(name = "tolk", version, about = "Local LLM translation with flavored prompts")]
struct Cli {
    /// Directory holding default.toml, local.toml and flavors.json
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// GGUF model to load at startup, overriding the configured path
    #[arg(long, value_name = "FILE")]
    model: Option<PathBuf>,
}

/// Main entry point for tolk.
///
/// Loads settings and the flavor catalog from the config directory,
/// sets up file logging, then hands control to the interactive
/// translation loop.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_dir = cli.config_dir.unwrap_or_else(config::default_config_dir);
    let settings = Settings::load(&config_dir);

    let log_dir = settings
        .logging
        .file
        .clone()
        .unwrap_or_else(|| PathBuf::from("logs"));
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    let file_appender = tracing_appender::rolling::RollingFileAppender::new(
        tracing_appender::rolling::Rotation::DAILY,
        &log_dir,
        "tolk",
    );
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Logs go to the file only; the terminal belongs to the REPL.
    let filter = EnvFilter::try_from_env("TOLK_LOG")
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_line_number(true)
        .with_file(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(false)
        .with_env_filter(filter)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config_dir = %config_dir.display(),
        "tolk starting"
    );

    let catalog = FlavorCatalog::load(&config_dir.join("flavors.json"));
    let provider = Arc::new(LlamaCppProvider::new());
    let translator = Arc::new(Translator::new(provider, settings.engine_config()));

    app::repl::run(translator, catalog, settings, config_dir, cli.model).await
}

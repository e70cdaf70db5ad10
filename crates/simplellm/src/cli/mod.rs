//! simplellm cli definition and entrypoint.
mod session;
mod shell;
mod test_utils;
pub mod ux;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use simplellm_core::config::get_config;
use simplellm_core::process::ProcessLauncher;
use simplellm_core::service::OllamaClient;
use tracing::info;

use crate::cli::session::{Session, SessionOptions, SessionState};
use crate::cli::shell::TerminalShell;
use crate::log::setup_logging;

/// simplellm - set up a local Ollama service, pick a model and chat with it.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Write debug logs to the data directory.
    #[arg(short, long)]
    verbose: bool,

    /// Path to a config file. Defaults to simplellm.yml in the config directory.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

/// Runs the interactive session. Every graceful ending returns `Ok`.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        setup_logging().context("Failed to set up logging")?;
    }

    let config = get_config(cli.config).context("Failed to load configuration")?;
    let service = OllamaClient::new(&config.service).context("Invalid service configuration")?;
    let launcher = ProcessLauncher::from_config(&config.service);
    let mut shell = TerminalShell::new().context("Failed to initialize terminal input")?;
    let mut stdout = std::io::stdout();

    let mut state = SessionState::default();
    let end = Session::new(
        &service,
        &launcher,
        &mut shell,
        &mut stdout,
        SessionOptions::from_config(&config),
    )
    .run(&mut state)
    .await?;

    info!(?end, model = ?state.selected_model, "Exiting");
    Ok(())
}

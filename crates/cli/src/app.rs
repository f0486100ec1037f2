use crate::cli::{Cli, Commands};
use crate::commands::{handle_config_command, handle_recommend_command};
use anyhow::Result;
use clap::Parser;
use repopicks_intelligence::PicksConfig;
use std::path::PathBuf;
use std::process::ExitCode;

/// The main entry point for the `repopicks` application.
pub fn run() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Recommend(args) => handle_recommend_command(args, config),
        Commands::Config => handle_config_command(&config),
    }
}

/// An explicit file must exist; the default location is optional.
fn load_config(explicit: Option<PathBuf>) -> Result<PicksConfig> {
    let path = explicit.or_else(|| repopicks_state::config_file().filter(|p| p.is_file()));
    if let Some(path) = &path {
        tracing::debug!(path = %path.display(), "loading configuration");
    }
    PicksConfig::load(path.as_deref())
}

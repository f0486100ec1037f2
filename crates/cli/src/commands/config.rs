//! Handler for the `config` command.

use anyhow::Result;
use repopicks_intelligence::PicksConfig;
use std::process::ExitCode;

pub(crate) fn handle_config_command(config: &PicksConfig) -> Result<ExitCode> {
    print!("{}", config.to_toml()?);
    Ok(ExitCode::SUCCESS)
}

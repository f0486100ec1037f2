//! Command-line interface for `repopicks`.
//!
//! Parses arguments, loads configuration and runs one recommendation cycle,
//! printing the result as JSON.

mod app;
mod cli;
mod commands;

use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    app::run()
}

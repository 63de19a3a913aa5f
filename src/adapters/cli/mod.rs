//! CLI Adapter
//!
//! Command-line interface for the tweet sniper.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{BalanceCmd, CheckCmd, CheckReport, CliApp, Command, RunCmd};

use anyhow::Result;

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    commands::execute(app).await
}

//! CLI Adapter
//!
//! Command-line interface for the kalman-pairs backtester.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{CliApp, Command, InitConfigCmd, RunCmd, SimulateCmd, SweepCmd};

use anyhow::Result;

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    commands::execute(app).await
}

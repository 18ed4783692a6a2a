//! Kalman Pairs - Dynamic Hedge Ratio Pairs Backtester
//!
//! Command-line entry point. See `kalman-pairs --help`.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use kalman_pairs::adapters::cli::{self, CliApp};
use kalman_pairs::config::load_config;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (KALMAN_PAIRS_DATA, RUST_LOG)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    let config_level = app
        .command
        .config_path()
        .and_then(|path| load_config(path).ok())
        .map(|config| config.logging.level);
    init_logging(app.verbose, app.debug, config_level.as_deref())?;

    cli::execute(app).await
}

/// Flags win over RUST_LOG, which wins over the config file's [logging] level.
fn init_logging(verbose: bool, debug: bool, config_level: Option<&str>) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config_level.unwrap_or("warn")))
    };

    fmt().with_env_filter(filter).with_target(false).init();
    Ok(())
}

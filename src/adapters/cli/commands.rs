//! CLI Command Handlers
//!
//! Implementation of all CLI commands for the kalman-pairs backtester.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::adapters::csv_file::{write_observations, CsvObservationSource, FileReportSink};
use crate::adapters::synthetic::{SyntheticPairConfig, SyntheticSource};
use crate::application::{best_by_sharpe, run_sweep, BacktestEngine, PerformanceSummary, SweepOutcome};
use crate::config::{load_config, save_config, Config};
use crate::ports::{ObservationSource, ReportSink};
use crate::strategy::StrategyConfig;

/// Kalman Pairs - dynamic hedge ratio mean-reversion backtester
#[derive(Parser, Debug)]
#[command(
    name = "kalman-pairs",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Kalman-filter hedge ratio pairs backtester",
    long_about = "Estimates a time-varying hedge ratio between two price series with a \
                  Kalman filter and replays a z-score mean-reversion strategy on the \
                  resulting spread, bar by bar, without look-ahead."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a single backtest
    Run(RunCmd),

    /// Run a parameter sweep in parallel
    Sweep(SweepCmd),

    /// Generate a synthetic price pair as CSV
    Simulate(SimulateCmd),

    /// Write a configuration template with every default filled in
    InitConfig(InitConfigCmd),
}

impl Command {
    /// Config file the command reads, if any
    pub fn config_path(&self) -> Option<&Path> {
        match self {
            Command::Run(cmd) => cmd.config.as_deref(),
            Command::Sweep(cmd) => cmd.config.as_deref(),
            Command::Simulate(_) | Command::InitConfig(_) => None,
        }
    }
}

/// Run a single backtest
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// CSV with timestamp,price_y,price_x (overrides [data] path)
    #[arg(long, value_name = "FILE")]
    pub data: Option<PathBuf>,

    /// Directory for report.json and CSV tables
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Override entry z-score
    #[arg(long, value_name = "Z")]
    pub entry_z: Option<f64>,

    /// Override exit z-score
    #[arg(long, value_name = "Z")]
    pub exit_z: Option<f64>,

    /// Override measurement noise R
    #[arg(long, value_name = "R")]
    pub measurement_noise: Option<f64>,

    /// Print the summary as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Run a parameter sweep
#[derive(Parser, Debug)]
pub struct SweepCmd {
    /// Path to configuration file; its [sweep] section defines the grid
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// CSV with timestamp,price_y,price_x (overrides [data] path)
    #[arg(long, value_name = "FILE")]
    pub data: Option<PathBuf>,

    /// Directory for sweep.json and sweep.csv
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Override the number of concurrent backtests
    #[arg(long, value_name = "N")]
    pub max_parallel: Option<usize>,
}

/// Generate a synthetic pair
#[derive(Parser, Debug)]
pub struct SimulateCmd {
    /// Output CSV file
    #[arg(short, long, value_name = "FILE", default_value = "data/synthetic_pair.csv")]
    pub output: PathBuf,

    /// Number of bars
    #[arg(long, default_value = "1000")]
    pub bars: usize,

    /// RNG seed
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Hedge ratio
    #[arg(long, default_value = "1.0")]
    pub beta: f64,

    /// Hedge ratio after the jump
    #[arg(long, value_name = "BETA", requires = "jump_at")]
    pub beta_after: Option<f64>,

    /// Bar index at which the hedge ratio jumps
    #[arg(long, value_name = "BAR", requires = "beta_after")]
    pub jump_at: Option<usize>,

    /// Intercept
    #[arg(long, default_value = "0.0")]
    pub alpha: f64,

    /// Spread noise standard deviation
    #[arg(long, default_value = "0.5")]
    pub noise: f64,

    /// Per-bar log volatility of x
    #[arg(long, default_value = "0.01")]
    pub volatility: f64,
}

/// Write a configuration template
#[derive(Parser, Debug)]
pub struct InitConfigCmd {
    /// Output path
    #[arg(short, long, value_name = "FILE", default_value = "config/backtest.toml")]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    match app.command {
        Command::Run(cmd) => run_command(cmd),
        Command::Sweep(cmd) => sweep_command(cmd).await,
        Command::Simulate(cmd) => simulate_command(cmd),
        Command::InitConfig(cmd) => init_config_command(cmd),
    }
}

fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn data_source(cli_path: Option<PathBuf>, config: &Config) -> Result<CsvObservationSource> {
    let Some(path) = cli_path.or_else(|| config.data.resolved_path()) else {
        bail!("No input data: pass --data or set [data] path (or KALMAN_PAIRS_DATA)");
    };
    Ok(CsvObservationSource::new(path))
}

/// Handle run command
fn run_command(cmd: RunCmd) -> Result<()> {
    let config = load_or_default(cmd.config.as_deref())?;

    let mut strategy = StrategyConfig::from(&config);
    if let Some(entry) = cmd.entry_z {
        strategy.signal.entry_zscore = entry;
    }
    if let Some(exit) = cmd.exit_z {
        strategy.signal.exit_zscore = exit;
    }
    if let Some(r) = cmd.measurement_noise {
        strategy.filter.measurement_noise = r;
    }
    let engine = BacktestEngine::new(strategy).context("Invalid strategy configuration")?;

    let source = data_source(cmd.data, &config)?;
    tracing::info!("Loading observations from {}", source.describe());
    let series = source.load().context("Failed to load observations")?;

    let report = engine.run(&series).context("Backtest failed")?;

    if let Some(dir) = cmd.output {
        FileReportSink::new(&dir)
            .write_report(&report)
            .with_context(|| format!("Failed to write report to {}", dir.display()))?;
        println!("Report written to {}", dir.display());
    }

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report.summary)?);
    } else {
        print_summary(&report.summary);
    }
    Ok(())
}

/// Handle sweep command
async fn sweep_command(cmd: SweepCmd) -> Result<()> {
    let config = load_or_default(cmd.config.as_deref())?;
    let base = StrategyConfig::from(&config);
    let grid = config.sweep.grid();
    let max_parallel = cmd.max_parallel.unwrap_or(config.sweep.max_parallel);

    let series = data_source(cmd.data, &config)?
        .load()
        .context("Failed to load observations")?;

    let outcomes = run_sweep(Arc::new(series), base, &grid, max_parallel)
        .await
        .context("Parameter sweep failed")?;

    if let Some(dir) = cmd.output {
        FileReportSink::new(&dir)
            .write_sweep(&outcomes)
            .with_context(|| format!("Failed to write sweep results to {}", dir.display()))?;
        println!("Sweep results written to {}", dir.display());
    }

    print_sweep(&outcomes);
    Ok(())
}

/// Handle simulate command
fn simulate_command(cmd: SimulateCmd) -> Result<()> {
    let generator = SyntheticPairConfig {
        bars: cmd.bars,
        seed: cmd.seed,
        alpha: cmd.alpha,
        beta: cmd.beta,
        beta_after: cmd.beta_after,
        beta_jump_at: cmd.jump_at,
        noise_std: cmd.noise,
        volatility: cmd.volatility,
        ..Default::default()
    };
    let series = SyntheticSource::new(generator)
        .load()
        .context("Failed to generate synthetic pair")?;

    if let Some(parent) = cmd.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    write_observations(&cmd.output, &series)
        .with_context(|| format!("Failed to write {}", cmd.output.display()))?;

    println!("✓ Wrote {} bars to {}", series.len(), cmd.output.display());
    Ok(())
}

/// Handle init-config command
fn init_config_command(cmd: InitConfigCmd) -> Result<()> {
    save_config(&Config::default(), &cmd.output, cmd.force)
        .with_context(|| format!("Failed to write {}", cmd.output.display()))?;
    println!("✓ Configuration template written to {}", cmd.output.display());
    Ok(())
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{:.3}", v)).unwrap_or_else(|| "n/a".to_string())
}

fn print_summary(summary: &PerformanceSummary) {
    println!("┌─────────────────────────────────────┐");
    println!("│  Backtest Summary                   │");
    println!("├─────────────────────────────────────┤");
    println!("  Bars:               {}", summary.bars);
    println!("  Final equity:       {:.2}", summary.final_equity);
    println!("  Total return:       {:.2}%", summary.total_return_pct);
    println!("  Max drawdown:       {:.2}%", summary.max_drawdown * 100.0);
    println!("  Round trips:        {}", summary.round_trips);
    println!("  Win rate:           {:.1}%", summary.win_rate * 100.0);
    println!("  Profit factor:      {}", fmt_opt(summary.profit_factor));
    println!("  Sharpe (annual):    {}", fmt_opt(summary.sharpe_ratio));
    println!("  Fees paid:          {:.2}", summary.total_fees);
    println!("  Final hedge ratio:  {:.4}", summary.final_hedge_ratio);
    println!("  Mean NIS:           {:.3}", summary.mean_nis);
    if summary.forced_liquidation {
        println!("  (last position force-closed at end of data)");
    }
    println!("└─────────────────────────────────────┘");
}

fn print_sweep(outcomes: &[SweepOutcome]) {
    println!(
        "{:>4} {:>10} {:>10} {:>10} {:>6} {:>6} {:>12} {:>8}",
        "#", "Q_alpha", "Q_beta", "R", "entry", "exit", "equity", "sharpe"
    );
    for o in outcomes {
        let p = &o.point;
        let (equity, sharpe) = match &o.summary {
            Some(s) => (format!("{:.2}", s.final_equity), fmt_opt(s.sharpe_ratio)),
            None => ("failed".to_string(), "-".to_string()),
        };
        println!(
            "{:>4} {:>10.2e} {:>10.2e} {:>10.2e} {:>6.2} {:>6.2} {:>12} {:>8}",
            o.index,
            p.process_noise_alpha,
            p.process_noise_beta,
            p.measurement_noise,
            p.entry_zscore,
            p.exit_zscore,
            equity,
            sharpe
        );
    }
    if let Some(best) = best_by_sharpe(outcomes) {
        println!("\nBest by Sharpe: #{}", best.index);
    }
}

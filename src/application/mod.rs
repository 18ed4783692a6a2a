//! Application Layer - Backtest orchestration
//!
//! - `backtest`: the bar-by-bar replay engine and its error taxonomy
//! - `report`: the run report and performance summary
//! - `sweep`: parallel parameter sweeps over a shared series

pub mod backtest;
pub mod report;
pub mod sweep;

pub use backtest::{BacktestEngine, BacktestError, ErrorKind};
pub use report::{bar_returns, BacktestReport, PerformanceSummary};
pub use sweep::{best_by_sharpe, evaluate, run_sweep, ParameterGrid, SweepError, SweepFailure, SweepOutcome, SweepPoint};

//! Backtest Engine
//!
//! Replays a validated observation series bar by bar. For each bar, in
//! order: filter predict, filter update, signal advance, position update,
//! (final bar only) forced liquidation, equity mark. Bar `t` never sees bar
//! `t + 1`. The first failing step aborts the run.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};

use super::report::{BacktestReport, PerformanceSummary};
use crate::domain::{Observation, ObservationSeries, PositionError, PositionTracker, ValidationError};
use crate::strategy::{
    ConfigurationError, FilterError, SignalGenerator, StateEstimator, StrategyConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Validation,
    NumericalInstability,
    Accounting,
}

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("Configuration error: {source}")]
    Configuration {
        step: Option<usize>,
        source: ConfigurationError,
    },
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Numerical instability at step {step}: {source}")]
    NumericalInstability { step: usize, source: FilterError },
    #[error("Accounting error at step {step}: {source}")]
    Accounting { step: usize, source: PositionError },
}

impl BacktestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BacktestError::Configuration { .. } => ErrorKind::Configuration,
            BacktestError::Validation(_) => ErrorKind::Validation,
            BacktestError::NumericalInstability { .. } => ErrorKind::NumericalInstability,
            BacktestError::Accounting { .. } => ErrorKind::Accounting,
        }
    }

    /// Bar index at which the run failed, when the failure belongs to a bar.
    pub fn step(&self) -> Option<usize> {
        match self {
            BacktestError::Configuration { step, .. } => *step,
            BacktestError::Validation(e) => e.index(),
            BacktestError::NumericalInstability { step, .. }
            | BacktestError::Accounting { step, .. } => Some(*step),
        }
    }
}

impl From<ConfigurationError> for BacktestError {
    fn from(source: ConfigurationError) -> Self {
        BacktestError::Configuration { step: None, source }
    }
}

/// Runs backtests for one validated configuration.
///
/// The engine holds no per-run state; every `run` builds a fresh estimator,
/// generator and tracker, so one engine can be reused or cloned freely.
#[derive(Debug, Clone)]
pub struct BacktestEngine {
    config: StrategyConfig,
}

impl BacktestEngine {
    pub fn new(config: StrategyConfig) -> Result<Self, BacktestError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Validate raw bars, then run.
    pub fn run_observations(&self, bars: Vec<Observation>) -> Result<BacktestReport, BacktestError> {
        let series = ObservationSeries::new(bars).inspect_err(|e| error!("Rejected input: {}", e))?;
        self.run(&series)
    }

    pub fn run(&self, series: &ObservationSeries) -> Result<BacktestReport, BacktestError> {
        info!(
            bars = series.len(),
            start = %series.first().t,
            end = %series.last().t,
            "Starting backtest"
        );

        let report = self.replay(series).inspect_err(|e| {
            error!(kind = ?e.kind(), step = ?e.step(), "Backtest aborted: {}", e);
        })?;

        info!(
            final_equity = report.summary.final_equity,
            return_pct = report.summary.total_return_pct,
            max_drawdown = report.summary.max_drawdown,
            round_trips = report.summary.round_trips,
            hedge_ratio = report.summary.final_hedge_ratio,
            "Backtest complete"
        );
        Ok(report)
    }

    fn replay(&self, series: &ObservationSeries) -> Result<BacktestReport, BacktestError> {
        let mut estimator = StateEstimator::new(self.config.filter)?;
        let mut generator = SignalGenerator::new(&self.config.signal)?;
        let mut tracker = PositionTracker::new(self.config.portfolio.clone());

        let n = series.len();
        let mut innovations = Vec::with_capacity(n);
        let mut states = Vec::with_capacity(n);
        let mut signals = Vec::with_capacity(n);

        for (index, bar) in series.iter().enumerate() {
            estimator.predict();
            let step = estimator
                .update(index, bar)
                .map_err(|source| BacktestError::NumericalInstability { step: index, source })?;

            let previous = generator.current();
            let record = generator.advance(&step.innovation);
            let z_score = record.z_score.unwrap_or(0.0);
            if record.signal != previous {
                debug!(index, from = %previous, to = %record.signal, z_score, "Signal change");
            }

            tracker
                .apply_signal(index, bar, previous, record.signal, z_score, step.state.beta)
                .map_err(|source| BacktestError::Accounting { step: index, source })?;

            if index + 1 == n {
                tracker.liquidate(index, bar, z_score);
            }
            tracker.mark(index, bar);

            innovations.push(step.innovation);
            states.push(step.state);
            signals.push(record);
        }

        let summary = PerformanceSummary::compute(
            self.config.portfolio.initial_cash,
            self.config.periods_per_year,
            tracker.equity_curve(),
            &innovations,
            tracker.events(),
            estimator.hedge_ratio(),
        );
        let (equity_curve, events) = tracker.into_parts();

        Ok(BacktestReport {
            config: self.config.clone(),
            equity_curve,
            innovations,
            states,
            signals,
            events,
            summary,
        })
    }
}

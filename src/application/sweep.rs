//! Parameter Sweep
//!
//! Runs one independent backtest per grid point. Runs share nothing but the
//! read-only observation series; each owns its estimator, generator and
//! tracker. Work is fanned out over the blocking pool with a bounded number
//! of runs in flight, and results come back in grid order.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{AcquireError, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{info, warn};

use super::backtest::{BacktestEngine, ErrorKind};
use super::report::PerformanceSummary;
use crate::domain::ObservationSeries;
use crate::strategy::StrategyConfig;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Run permit pool closed: {0}")]
    Permit(#[from] AcquireError),
    #[error("Sweep task failed: {0}")]
    Join(#[from] JoinError),
}

/// Candidate values per parameter. An empty list keeps the base value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterGrid {
    pub process_noise_alpha: Vec<f64>,
    pub process_noise_beta: Vec<f64>,
    pub measurement_noise: Vec<f64>,
    pub entry_zscore: Vec<f64>,
    pub exit_zscore: Vec<f64>,
}

/// One combination of swept values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub process_noise_alpha: f64,
    pub process_noise_beta: f64,
    pub measurement_noise: f64,
    pub entry_zscore: f64,
    pub exit_zscore: f64,
}

impl SweepPoint {
    pub fn apply(&self, base: &StrategyConfig) -> StrategyConfig {
        base.clone()
            .with_process_noise(self.process_noise_alpha, self.process_noise_beta)
            .with_measurement_noise(self.measurement_noise)
            .with_thresholds(self.entry_zscore, self.exit_zscore)
    }
}

impl ParameterGrid {
    /// Cartesian product in a fixed order: the last parameter varies fastest.
    pub fn points(&self, base: &StrategyConfig) -> Vec<SweepPoint> {
        fn axis(values: &[f64], fallback: f64) -> Vec<f64> {
            if values.is_empty() {
                vec![fallback]
            } else {
                values.to_vec()
            }
        }

        let qa = axis(&self.process_noise_alpha, base.filter.process_noise_alpha);
        let qb = axis(&self.process_noise_beta, base.filter.process_noise_beta);
        let r = axis(&self.measurement_noise, base.filter.measurement_noise);
        let entry = axis(&self.entry_zscore, base.signal.entry_zscore);
        let exit = axis(&self.exit_zscore, base.signal.exit_zscore);

        let mut points = Vec::with_capacity(qa.len() * qb.len() * r.len() * entry.len() * exit.len());
        for &process_noise_alpha in &qa {
            for &process_noise_beta in &qb {
                for &measurement_noise in &r {
                    for &entry_zscore in &entry {
                        for &exit_zscore in &exit {
                            points.push(SweepPoint {
                                process_noise_alpha,
                                process_noise_beta,
                                measurement_noise,
                                entry_zscore,
                                exit_zscore,
                            });
                        }
                    }
                }
            }
        }
        points
    }
}

/// Why a grid point produced no summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepFailure {
    pub kind: ErrorKind,
    pub step: Option<usize>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepOutcome {
    /// Position in grid order
    pub index: usize,
    pub point: SweepPoint,
    pub summary: Option<PerformanceSummary>,
    pub failure: Option<SweepFailure>,
}

impl SweepOutcome {
    pub fn is_ok(&self) -> bool {
        self.summary.is_some()
    }
}

/// Run a single grid point to completion on the current thread.
pub fn evaluate(index: usize, point: SweepPoint, base: &StrategyConfig, series: &ObservationSeries) -> SweepOutcome {
    let result = BacktestEngine::new(point.apply(base)).and_then(|engine| engine.run(series));
    match result {
        Ok(report) => SweepOutcome {
            index,
            point,
            summary: Some(report.summary),
            failure: None,
        },
        Err(e) => {
            warn!(index, kind = ?e.kind(), "Sweep point failed: {}", e);
            SweepOutcome {
                index,
                point,
                summary: None,
                failure: Some(SweepFailure {
                    kind: e.kind(),
                    step: e.step(),
                    message: e.to_string(),
                }),
            }
        }
    }
}

/// Run every grid point with at most `max_parallel` backtests in flight.
pub async fn run_sweep(
    series: Arc<ObservationSeries>,
    base: StrategyConfig,
    grid: &ParameterGrid,
    max_parallel: usize,
) -> Result<Vec<SweepOutcome>, SweepError> {
    let points = grid.points(&base);
    let total = points.len();
    let max_parallel = max_parallel.max(1);
    info!(points = total, max_parallel, bars = series.len(), "Starting parameter sweep");

    let base = Arc::new(base);
    let permits = Arc::new(Semaphore::new(max_parallel));
    let mut tasks = JoinSet::new();

    for (index, point) in points.into_iter().enumerate() {
        let permit = Arc::clone(&permits).acquire_owned().await?;
        let series = Arc::clone(&series);
        let base = Arc::clone(&base);
        tasks.spawn_blocking(move || {
            let _permit = permit;
            evaluate(index, point, &base, &series)
        });
    }

    let mut outcomes = Vec::with_capacity(total);
    while let Some(joined) = tasks.join_next().await {
        outcomes.push(joined?);
    }
    outcomes.sort_by_key(|o| o.index);

    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    info!(points = total, failed, "Parameter sweep complete");
    Ok(outcomes)
}

/// Best successful outcome by Sharpe ratio, then by final equity.
pub fn best_by_sharpe(outcomes: &[SweepOutcome]) -> Option<&SweepOutcome> {
    outcomes
        .iter()
        .filter_map(|o| o.summary.as_ref().map(|s| (o, s)))
        .max_by(|(_, a), (_, b)| {
            let sa = a.sharpe_ratio.unwrap_or(f64::NEG_INFINITY);
            let sb = b.sharpe_ratio.unwrap_or(f64::NEG_INFINITY);
            sa.total_cmp(&sb).then(a.final_equity.total_cmp(&b.final_equity))
        })
        .map(|(o, _)| o)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Observation;
    use chrono::DateTime;

    fn series() -> Arc<ObservationSeries> {
        let bars = (0..120)
            .map(|i| {
                let x = 100.0 + (i as f64 / 9.0).sin() * 4.0;
                let y = 1.5 * x + (((i * 17) % 11) as f64 / 10.0 - 0.5);
                Observation::new(DateTime::from_timestamp(i as i64 * 86_400, 0).unwrap(), y, x)
            })
            .collect();
        Arc::new(ObservationSeries::new(bars).unwrap())
    }

    #[test]
    fn test_grid_points_order() {
        let grid = ParameterGrid {
            measurement_noise: vec![0.1, 1.0],
            entry_zscore: vec![1.5, 2.0, 2.5],
            ..Default::default()
        };
        let base = StrategyConfig::default();
        let points = grid.points(&base);
        assert_eq!(points.len(), 6);
        assert_eq!(points[0].measurement_noise, 0.1);
        assert_eq!(points[0].entry_zscore, 1.5);
        assert_eq!(points[1].entry_zscore, 2.0);
        assert_eq!(points[3].measurement_noise, 1.0);
        // Unswept parameters keep the base value.
        assert!(points.iter().all(|p| p.process_noise_beta == base.filter.process_noise_beta));
    }

    #[tokio::test]
    async fn test_sweep_matches_sequential_runs() {
        let series = series();
        let base = StrategyConfig::default().with_initial_beta(1.5);
        let grid = ParameterGrid {
            measurement_noise: vec![0.05, 0.5],
            entry_zscore: vec![1.0, 2.0],
            ..Default::default()
        };

        let outcomes = run_sweep(Arc::clone(&series), base.clone(), &grid, 2).await.unwrap();
        assert_eq!(outcomes.len(), 4);

        for (i, (outcome, point)) in outcomes.iter().zip(grid.points(&base)).enumerate() {
            assert_eq!(outcome.index, i);
            assert_eq!(outcome.point, point);
            let sequential = BacktestEngine::new(point.apply(&base)).unwrap().run(&series).unwrap();
            assert_eq!(outcome.summary.as_ref(), Some(&sequential.summary));
        }
    }

    #[tokio::test]
    async fn test_invalid_points_are_reported() {
        let grid = ParameterGrid {
            entry_zscore: vec![2.0],
            exit_zscore: vec![0.0, 3.0],
            ..Default::default()
        };
        let outcomes = run_sweep(series(), StrategyConfig::default(), &grid, 4).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_ok());

        let failure = outcomes[1].failure.as_ref().unwrap();
        assert_eq!(failure.kind, ErrorKind::Configuration);
        assert_eq!(failure.step, None);
        assert!(outcomes[1].summary.is_none());
    }

    #[tokio::test]
    async fn test_empty_grid_axis_uses_base() {
        let outcomes = run_sweep(series(), StrategyConfig::default(), &ParameterGrid::default(), 1)
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_ok());
        assert_eq!(best_by_sharpe(&outcomes).map(|o| o.index), Some(0));
    }
}

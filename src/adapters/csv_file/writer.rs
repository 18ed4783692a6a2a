//! File report sink: one JSON report plus flat CSV tables per run.
//!
//! Layout under the output directory:
//!
//! ```text
//! report.json       full BacktestReport
//! equity.csv        EquityPoint per bar
//! innovations.csv   InnovationRecord per bar
//! states.csv        alpha, beta and covariance entries per bar
//! signals.csv       z-score and signal per bar
//! events.csv        position open/close log
//! sweep.csv         one row per grid point (sweeps only)
//! sweep.json
//! ```

use chrono::{DateTime, Utc};
use csv::Writer;
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::application::{BacktestReport, SweepOutcome};
use crate::domain::Signal;
use crate::ports::{ReportSink, SinkError};

#[derive(Debug, Serialize)]
struct StateRow {
    index: usize,
    t: DateTime<Utc>,
    alpha: f64,
    beta: f64,
    var_alpha: f64,
    cov_alpha_beta: f64,
    var_beta: f64,
}

#[derive(Debug, Serialize)]
struct SignalRow {
    index: usize,
    t: DateTime<Utc>,
    z_score: Option<f64>,
    signal: Signal,
}

#[derive(Debug, Serialize)]
struct SweepRow {
    index: usize,
    process_noise_alpha: f64,
    process_noise_beta: f64,
    measurement_noise: f64,
    entry_zscore: f64,
    exit_zscore: f64,
    final_equity: Option<f64>,
    total_return_pct: Option<f64>,
    max_drawdown: Option<f64>,
    sharpe_ratio: Option<f64>,
    round_trips: Option<usize>,
    win_rate: Option<f64>,
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FileReportSink {
    dir: PathBuf,
}

impl FileReportSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn prepare(&self) -> Result<(), SinkError> {
        fs::create_dir_all(&self.dir).map_err(|e| write_error(&self.dir, e))
    }

    fn write_csv<T: Serialize>(&self, name: &str, rows: impl IntoIterator<Item = T>) -> Result<(), SinkError> {
        let path = self.dir.join(name);
        let mut writer = Writer::from_path(&path).map_err(|e| write_error(&path, e))?;
        for row in rows {
            writer.serialize(row).map_err(|e| write_error(&path, e))?;
        }
        writer.flush().map_err(|e| write_error(&path, e))?;
        Ok(())
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), SinkError> {
        let path = self.dir.join(name);
        let file = File::create(&path).map_err(|e| write_error(&path, e))?;
        serde_json::to_writer_pretty(file, value).map_err(|e| SinkError::Serialize(e.to_string()))
    }
}

fn write_error(path: &Path, e: impl ToString) -> SinkError {
    SinkError::Write {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

impl ReportSink for FileReportSink {
    fn write_report(&mut self, report: &BacktestReport) -> Result<(), SinkError> {
        self.prepare()?;
        self.write_json("report.json", report)?;
        self.write_csv("equity.csv", &report.equity_curve)?;
        self.write_csv("innovations.csv", &report.innovations)?;
        self.write_csv(
            "states.csv",
            report.states.iter().map(|s| StateRow {
                index: s.index,
                t: s.t,
                alpha: s.alpha,
                beta: s.beta,
                var_alpha: s.covariance.0[0][0],
                cov_alpha_beta: s.covariance.0[0][1],
                var_beta: s.covariance.0[1][1],
            }),
        )?;
        self.write_csv(
            "signals.csv",
            report.signals.iter().map(|s| SignalRow {
                index: s.index,
                t: s.t,
                z_score: s.z_score,
                signal: s.signal,
            }),
        )?;
        self.write_csv("events.csv", &report.events)?;
        info!(dir = %self.dir.display(), "Wrote backtest report");
        Ok(())
    }

    fn write_sweep(&mut self, outcomes: &[SweepOutcome]) -> Result<(), SinkError> {
        self.prepare()?;
        self.write_json("sweep.json", outcomes)?;
        self.write_csv(
            "sweep.csv",
            outcomes.iter().map(|o| {
                let s = o.summary.as_ref();
                SweepRow {
                    index: o.index,
                    process_noise_alpha: o.point.process_noise_alpha,
                    process_noise_beta: o.point.process_noise_beta,
                    measurement_noise: o.point.measurement_noise,
                    entry_zscore: o.point.entry_zscore,
                    exit_zscore: o.point.exit_zscore,
                    final_equity: s.map(|s| s.final_equity),
                    total_return_pct: s.map(|s| s.total_return_pct),
                    max_drawdown: s.map(|s| s.max_drawdown),
                    sharpe_ratio: s.and_then(|s| s.sharpe_ratio),
                    round_trips: s.map(|s| s.round_trips),
                    win_rate: s.map(|s| s.win_rate),
                    error: o.failure.as_ref().map(|f| f.message.clone()),
                }
            }),
        )?;
        info!(dir = %self.dir.display(), points = outcomes.len(), "Wrote sweep results");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{evaluate, BacktestEngine, SweepPoint};
    use crate::domain::{Observation, ObservationSeries};
    use crate::strategy::StrategyConfig;

    fn series() -> ObservationSeries {
        let bars = (0..60)
            .map(|i| {
                let x = 40.0 + (i as f64 / 5.0).sin();
                let y = 2.0 * x + if i % 7 == 0 { 0.8 } else { -0.1 };
                Observation::new(DateTime::from_timestamp(i * 86_400, 0).unwrap(), y, x)
            })
            .collect();
        ObservationSeries::new(bars).unwrap()
    }

    #[test]
    fn test_writes_report_files() {
        let config = StrategyConfig::default().with_initial_beta(2.0).with_measurement_noise(0.1);
        let report = BacktestEngine::new(config).unwrap().run(&series()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileReportSink::new(dir.path().join("out"));
        sink.write_report(&report).unwrap();

        for name in ["report.json", "equity.csv", "innovations.csv", "states.csv", "signals.csv", "events.csv"] {
            assert!(sink.dir().join(name).exists(), "missing {}", name);
        }

        let equity = fs::read_to_string(sink.dir().join("equity.csv")).unwrap();
        assert!(equity.starts_with("index,t,cash,mark_to_market_value,equity,cumulative_pnl,drawdown"));
        assert_eq!(equity.lines().count(), 61);

        let json = fs::read_to_string(sink.dir().join("report.json")).unwrap();
        let parsed: BacktestReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.equity_curve.len(), 60);
    }

    #[test]
    fn test_writes_sweep_rows() {
        let series = series();
        let base = StrategyConfig::default();
        let good = SweepPoint {
            process_noise_alpha: 1e-5,
            process_noise_beta: 1e-5,
            measurement_noise: 0.1,
            entry_zscore: 2.0,
            exit_zscore: 0.0,
        };
        let bad = SweepPoint { measurement_noise: -1.0, ..good };
        let outcomes = vec![evaluate(0, good, &base, &series), evaluate(1, bad, &base, &series)];

        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileReportSink::new(dir.path());
        sink.write_sweep(&outcomes).unwrap();

        let csv = fs::read_to_string(dir.path().join("sweep.csv")).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[2].contains("measurement noise"));
    }
}

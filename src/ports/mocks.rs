//! In-memory port implementations for tests and dry runs.

use std::sync::{Arc, Mutex, MutexGuard};

use super::market_data::{ObservationSource, SourceError};
use super::report::{ReportSink, SinkError};
use crate::application::{BacktestReport, SweepOutcome};
use crate::domain::{Observation, ObservationSeries};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Source backed by a vector of bars. Counts how often it was loaded.
#[derive(Debug, Default, Clone)]
pub struct InMemorySource {
    bars: Vec<Observation>,
    loads: Arc<Mutex<usize>>,
}

impl InMemorySource {
    pub fn new(bars: Vec<Observation>) -> Self {
        Self {
            bars,
            loads: Arc::default(),
        }
    }

    pub fn load_count(&self) -> usize {
        *lock(&self.loads)
    }
}

impl ObservationSource for InMemorySource {
    fn describe(&self) -> String {
        format!("in-memory ({} bars)", self.bars.len())
    }

    fn load(&self) -> Result<ObservationSeries, SourceError> {
        *lock(&self.loads) += 1;
        Ok(ObservationSeries::new(self.bars.clone())?)
    }
}

/// Sink that records everything written to it
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    reports: Arc<Mutex<Vec<BacktestReport>>>,
    sweeps: Arc<Mutex<Vec<Vec<SweepOutcome>>>>,
    fail_with: Option<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to make every write fail with `message`
    pub fn failing(mut self, message: &str) -> Self {
        self.fail_with = Some(message.to_string());
        self
    }

    pub fn reports(&self) -> Vec<BacktestReport> {
        lock(&self.reports).clone()
    }

    pub fn sweeps(&self) -> Vec<Vec<SweepOutcome>> {
        lock(&self.sweeps).clone()
    }

    fn check(&self) -> Result<(), SinkError> {
        match &self.fail_with {
            Some(message) => Err(SinkError::Write {
                path: "memory".to_string(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl ReportSink for RecordingSink {
    fn write_report(&mut self, report: &BacktestReport) -> Result<(), SinkError> {
        self.check()?;
        lock(&self.reports).push(report.clone());
        Ok(())
    }

    fn write_sweep(&mut self, outcomes: &[SweepOutcome]) -> Result<(), SinkError> {
        self.check()?;
        lock(&self.sweeps).push(outcomes.to_vec());
        Ok(())
    }
}

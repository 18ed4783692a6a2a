//! Report sink port.

use thiserror::Error;

use crate::application::{BacktestReport, SweepOutcome};

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Write error for {path}: {message}")]
    Write { path: String, message: String },

    #[error("Serialization error: {0}")]
    Serialize(String),
}

/// Receives finished reports for persistence or display.
pub trait ReportSink {
    fn write_report(&mut self, report: &BacktestReport) -> Result<(), SinkError>;

    fn write_sweep(&mut self, outcomes: &[SweepOutcome]) -> Result<(), SinkError>;
}

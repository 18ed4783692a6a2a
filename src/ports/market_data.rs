//! Observation source port.
//!
//! Where bars come from is an adapter concern; the engine only ever sees the
//! validated [`ObservationSeries`] a source returns.

use thiserror::Error;

use crate::domain::{ObservationSeries, ValidationError};

/// Observation source error type
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Read error for {path}: {message}")]
    Read { path: String, message: String },

    #[error("Write error for {path}: {message}")]
    Write { path: String, message: String },

    #[error("Data parsing error at row {row}: {message}")]
    Parse { row: usize, message: String },

    #[error("Invalid observations: {0}")]
    Invalid(#[from] ValidationError),

    #[error("Generator error: {0}")]
    Generator(String),
}

/// Supplies the full, ordered series for one backtest.
pub trait ObservationSource {
    /// Short label for logs
    fn describe(&self) -> String;

    /// Load and validate every bar.
    fn load(&self) -> Result<ObservationSeries, SourceError>;
}

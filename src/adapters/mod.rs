//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - CSV file: observation source and report writer
//! - Synthetic: seeded price-pair generator
//! - CLI: Command-line interface handlers

pub mod csv_file;
pub mod synthetic;
pub mod cli;

pub use csv_file::{CsvObservationSource, FileReportSink};
pub use synthetic::{SyntheticPairConfig, SyntheticSource};
pub use cli::CliApp;

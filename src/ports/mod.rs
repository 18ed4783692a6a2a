//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, these traits abstract:
//! - Observation sources (CSV files, synthetic generators)
//! - Report sinks (JSON / CSV writers)

pub mod market_data;
pub mod report;
pub mod mocks;

pub use market_data::{ObservationSource, SourceError};
pub use report::{ReportSink, SinkError};

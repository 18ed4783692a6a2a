//! CSV / JSON file adapters
//!
//! - `source`: observation series from a CSV file
//! - `writer`: report sink writing JSON + CSV tables

mod source;
mod writer;

pub use source::{parse_timestamp, write_observations, CsvObservationSource};
pub use writer::FileReportSink;

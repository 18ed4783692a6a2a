//! CSV observation source.
//!
//! Expects a header row `timestamp,price_y,price_x`. Timestamps may be RFC 3339,
//! `YYYY-MM-DD HH:MM:SS` (UTC) or a bare `YYYY-MM-DD` date. Rows are taken in
//! file order; the series constructor rejects anything out of order.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::domain::{Observation, ObservationSeries};
use crate::ports::{ObservationSource, SourceError};

#[derive(Debug, Deserialize, Serialize)]
struct CsvRow {
    timestamp: String,
    price_y: f64,
    price_x: f64,
}

/// Parse one timestamp cell.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(t.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
}

#[derive(Debug, Clone)]
pub struct CsvObservationSource {
    path: PathBuf,
}

impl CsvObservationSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_error(&self, message: impl ToString) -> SourceError {
        SourceError::Read {
            path: self.path.display().to_string(),
            message: message.to_string(),
        }
    }
}

impl ObservationSource for CsvObservationSource {
    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }

    fn load(&self) -> Result<ObservationSeries, SourceError> {
        let file = File::open(&self.path).map_err(|e| self.read_error(e))?;
        let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(file);

        let mut bars = Vec::new();
        for (i, result) in reader.deserialize::<CsvRow>().enumerate() {
            let row = i + 1;
            let record = result.map_err(|e| SourceError::Parse {
                row,
                message: e.to_string(),
            })?;
            let t = parse_timestamp(&record.timestamp).ok_or_else(|| SourceError::Parse {
                row,
                message: format!("unrecognised timestamp '{}'", record.timestamp),
            })?;
            bars.push(Observation::new(t, record.price_y, record.price_x));
        }

        let series = ObservationSeries::new(bars)?;
        info!(path = %self.path.display(), bars = series.len(), "Loaded observations");
        Ok(series)
    }
}

/// Write bars in the same layout the source reads.
pub fn write_observations<P: AsRef<Path>>(path: P, bars: &[Observation]) -> Result<(), SourceError> {
    let path = path.as_ref();
    let to_error = |e: &dyn std::fmt::Display| SourceError::Write {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let mut writer = WriterBuilder::new().from_path(path).map_err(|e| to_error(&e))?;
    for bar in bars {
        writer
            .serialize(CsvRow {
                timestamp: bar.t.to_rfc3339(),
                price_y: bar.price_y,
                price_x: bar.price_x,
            })
            .map_err(|e| to_error(&e))?;
    }
    writer.flush().map_err(|e| to_error(&e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ValidationError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_timestamp_formats() {
        let day = parse_timestamp("2024-03-01").unwrap();
        assert_eq!(day.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        let offset = parse_timestamp("2024-03-01T09:30:00-05:00").unwrap();
        assert_eq!(offset.to_rfc3339(), "2024-03-01T14:30:00+00:00");
        assert!(parse_timestamp("2024-03-01 14:30:00").is_some());
        assert!(parse_timestamp("03/01/2024").is_none());
    }

    #[test]
    fn test_load_csv() {
        let file = csv_file("timestamp,price_y,price_x\n2024-01-02, 101.5, 50.25\n2024-01-03,102.0,50.5\n");
        let series = CsvObservationSource::new(file.path()).load().unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].price_y, 101.5);
        assert_eq!(series[1].price_x, 50.5);
    }

    #[test]
    fn test_bad_row_reports_position() {
        let file = csv_file("timestamp,price_y,price_x\n2024-01-02,1,1\n2024-01-03,abc,1\n");
        let err = CsvObservationSource::new(file.path()).load().unwrap_err();
        assert!(matches!(err, SourceError::Parse { row: 2, .. }));

        let file = csv_file("timestamp,price_y,price_x\nyesterday,1,1\n");
        let err = CsvObservationSource::new(file.path()).load().unwrap_err();
        assert!(matches!(err, SourceError::Parse { row: 1, .. }));
    }

    #[test]
    fn test_out_of_order_rows_are_rejected() {
        let file = csv_file("timestamp,price_y,price_x\n2024-01-03,1,1\n2024-01-02,1,1\n");
        let err = CsvObservationSource::new(file.path()).load().unwrap_err();
        assert!(matches!(
            err,
            SourceError::Invalid(ValidationError::NonIncreasingTimestamp { index: 1, .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = CsvObservationSource::new("/nonexistent/pair.csv").load().unwrap_err();
        assert!(matches!(err, SourceError::Read { .. }));
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pair.csv");
        let bars = vec![
            Observation::new(parse_timestamp("2024-01-02").unwrap(), 10.0, 20.0),
            Observation::new(parse_timestamp("2024-01-03").unwrap(), 10.5, 20.25),
        ];
        write_observations(&path, &bars).unwrap();
        let series = CsvObservationSource::new(&path).load().unwrap();
        assert_eq!(series.bars(), &bars[..]);
    }

    #[test]
    fn test_write_failure_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("pair.csv");
        let bar = Observation::new(DateTime::from_timestamp(0, 0).unwrap(), 10.0, 5.0);

        match write_observations(&path, &[bar]) {
            Err(SourceError::Write { path: reported, .. }) => assert!(reported.ends_with("pair.csv")),
            other => panic!("expected a write error, got {:?}", other),
        }
    }
}

//! Observations
//!
//! A bar is a timestamped pair of closing prices. The engine only accepts an
//! [`ObservationSeries`], which can only be built through validation, so a
//! malformed input is rejected before the replay loop ever starts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use thiserror::Error;

/// One bar of the pair: dependent leg `y`, independent leg `x`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub t: DateTime<Utc>,
    pub price_y: f64,
    pub price_x: f64,
}

impl Observation {
    pub fn new(t: DateTime<Utc>, price_y: f64, price_x: f64) -> Self {
        Self { t, price_y, price_x }
    }
}

/// Input validation errors. Each variant carries the offending bar index.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Observation series is empty")]
    Empty,
    #[error("Non-finite price at bar {index}: y={price_y}, x={price_x}")]
    NonFinitePrice { index: usize, price_y: f64, price_x: f64 },
    #[error("Non-positive price at bar {index}: y={price_y}, x={price_x}")]
    NonPositivePrice { index: usize, price_y: f64, price_x: f64 },
    #[error("Timestamp at bar {index} ({current}) does not follow {previous}")]
    NonIncreasingTimestamp {
        index: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },
}

impl ValidationError {
    /// Bar index the error refers to, if any.
    pub fn index(&self) -> Option<usize> {
        match self {
            ValidationError::Empty => None,
            ValidationError::NonFinitePrice { index, .. }
            | ValidationError::NonPositivePrice { index, .. }
            | ValidationError::NonIncreasingTimestamp { index, .. } => Some(*index),
        }
    }
}

/// Chronologically ordered, validated observations.
///
/// Immutable once built; parallel sweep runs share one behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationSeries {
    bars: Vec<Observation>,
}

impl ObservationSeries {
    /// Validate and wrap a sequence of bars.
    ///
    /// Rejects empty input, NaN/infinite or non-positive prices, and
    /// timestamps that are not strictly increasing. Never reorders.
    pub fn new(bars: Vec<Observation>) -> Result<Self, ValidationError> {
        if bars.is_empty() {
            return Err(ValidationError::Empty);
        }

        for (index, bar) in bars.iter().enumerate() {
            if !bar.price_y.is_finite() || !bar.price_x.is_finite() {
                return Err(ValidationError::NonFinitePrice {
                    index,
                    price_y: bar.price_y,
                    price_x: bar.price_x,
                });
            }
            if bar.price_y <= 0.0 || bar.price_x <= 0.0 {
                return Err(ValidationError::NonPositivePrice {
                    index,
                    price_y: bar.price_y,
                    price_x: bar.price_x,
                });
            }
            if index > 0 {
                let previous = bars[index - 1].t;
                if bar.t <= previous {
                    return Err(ValidationError::NonIncreasingTimestamp {
                        index,
                        previous,
                        current: bar.t,
                    });
                }
            }
        }

        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[Observation] {
        &self.bars
    }

    pub fn first(&self) -> &Observation {
        &self.bars[0]
    }

    pub fn last(&self) -> &Observation {
        &self.bars[self.bars.len() - 1]
    }
}

impl Deref for ObservationSeries {
    type Target = [Observation];

    fn deref(&self) -> &Self::Target {
        &self.bars
    }
}

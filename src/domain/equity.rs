use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-bar snapshot of the book. Append-only once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub index: usize,
    pub t: DateTime<Utc>,
    pub cash: f64,
    /// Value of the open position at this bar's prices (0 when flat)
    pub mark_to_market_value: f64,
    pub equity: f64,
    /// Equity minus initial cash
    pub cumulative_pnl: f64,
    /// Fraction below the running equity peak
    pub drawdown: f64,
}

/// Running-peak drawdown: `(peak - equity) / peak`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawdownTracker {
    peak: f64,
    max_drawdown: f64,
}

impl DrawdownTracker {
    /// Start with the peak at the initial equity.
    pub fn new(initial_equity: f64) -> Self {
        Self {
            peak: initial_equity,
            max_drawdown: 0.0,
        }
    }

    /// Fold in the next equity value and return its drawdown.
    pub fn update(&mut self, equity: f64) -> f64 {
        if equity > self.peak {
            self.peak = equity;
        }
        // A non-positive peak has no meaningful fractional drawdown.
        let drawdown = if self.peak > 0.0 {
            (self.peak - equity) / self.peak
        } else {
            0.0
        };
        if drawdown > self.max_drawdown {
            self.max_drawdown = drawdown;
        }
        drawdown
    }

    pub fn peak(&self) -> f64 {
        self.peak
    }

    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }
}

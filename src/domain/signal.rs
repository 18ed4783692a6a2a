use serde::{Deserialize, Serialize};
use std::fmt;

/// Spread trading state.
///
/// Long spread = long Y, short beta·X. Short spread is the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    LongSpread,
    ShortSpread,
    #[default]
    Flat,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::LongSpread => write!(f, "LONG_SPREAD"),
            Signal::ShortSpread => write!(f, "SHORT_SPREAD"),
            Signal::Flat => write!(f, "FLAT"),
        }
    }
}

/// Entry/exit z-score band. `exit < entry` is checked by `SignalParams::validate`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub entry: f64,
    pub exit: f64,
}

impl Signal {
    /// Hysteresis transition.
    ///
    /// | from         | to           | when          |
    /// |--------------|--------------|---------------|
    /// | Flat         | LongSpread   | z <= -entry   |
    /// | Flat         | ShortSpread  | z >= +entry   |
    /// | LongSpread   | Flat         | z >= -exit    |
    /// | ShortSpread  | Flat         | z <= +exit    |
    ///
    /// Anything else keeps the current state. There is no direct
    /// LongSpread <-> ShortSpread edge; a reversal takes two bars.
    pub fn transition(self, z: f64, thresholds: &Thresholds) -> Signal {
        match self {
            Signal::Flat if z <= -thresholds.entry => Signal::LongSpread,
            Signal::Flat if z >= thresholds.entry => Signal::ShortSpread,
            Signal::LongSpread if z >= -thresholds.exit => Signal::Flat,
            Signal::ShortSpread if z <= thresholds.exit => Signal::Flat,
            unchanged => unchanged,
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, Signal::Flat)
    }

    /// +1 for long spread, -1 for short spread, 0 when flat.
    pub fn direction(&self) -> f64 {
        match self {
            Signal::LongSpread => 1.0,
            Signal::ShortSpread => -1.0,
            Signal::Flat => 0.0,
        }
    }
}

//! Signal generation from filter innovations.
//!
//! Normalises each innovation into a z-score and feeds it through the
//! hysteresis transition in [`Signal::transition`]. The generator keeps only
//! the previous signal plus, in rolling mode, the residual window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::kalman::InnovationRecord;
use super::params::{ConfigurationError, SignalParams, ZScoreMode};
use super::zscore_gate::ZScoreGate;
use crate::domain::{Signal, Thresholds};

/// z-score and signal of one bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub index: usize,
    pub t: DateTime<Utc>,
    /// `None` while the rolling window is still filling
    pub z_score: Option<f64>,
    pub signal: Signal,
}

#[derive(Debug, Clone)]
pub struct SignalGenerator {
    thresholds: Thresholds,
    warmup_bars: usize,
    gate: Option<ZScoreGate>,
    current: Signal,
    seen: usize,
}

impl SignalGenerator {
    pub fn new(params: &SignalParams) -> Result<Self, ConfigurationError> {
        params.validate()?;
        let gate = match params.zscore_mode {
            ZScoreMode::Filter => None,
            ZScoreMode::Rolling => Some(ZScoreGate::new(params.rolling_window)),
        };
        Ok(Self {
            thresholds: params.thresholds(),
            warmup_bars: params.warmup_bars,
            gate,
            current: Signal::Flat,
            seen: 0,
        })
    }

    /// Signal in force before the next `advance`.
    pub fn current(&self) -> Signal {
        self.current
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn in_warmup(&self) -> bool {
        self.seen < self.warmup_bars
    }

    /// Consume one innovation and move the state machine.
    ///
    /// During warm-up the z-score is still computed (and the rolling window
    /// still fills) but the signal is held FLAT. Without a z-score the
    /// previous signal is kept.
    pub fn advance(&mut self, innovation: &InnovationRecord) -> SignalRecord {
        let z_score = match self.gate.as_mut() {
            None => Some(innovation.z_score()),
            Some(gate) => gate.update(innovation.residual).map(|r| r.z_score),
        };

        let warming_up = self.in_warmup();
        self.seen += 1;

        self.current = match z_score {
            _ if warming_up => Signal::Flat,
            Some(z) => self.current.transition(z, &self.thresholds),
            None => self.current,
        };

        SignalRecord {
            index: innovation.index,
            t: innovation.t,
            z_score,
            signal: self.current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn innovation(index: usize, residual: f64, variance: f64) -> InnovationRecord {
        InnovationRecord {
            index,
            t: DateTime::from_timestamp(index as i64 * 86_400, 0).unwrap(),
            predicted_y: 100.0,
            residual,
            residual_variance: variance,
        }
    }

    fn filter_params() -> SignalParams {
        SignalParams {
            entry_zscore: 2.0,
            exit_zscore: 0.5,
            ..Default::default()
        }
    }

    #[test]
    fn test_filter_mode_zscore() {
        let mut generator = SignalGenerator::new(&filter_params()).unwrap();
        let record = generator.advance(&innovation(0, -3.0, 4.0));
        assert_eq!(record.z_score, Some(-1.5));
        assert_eq!(record.signal, Signal::Flat);
    }

    #[test]
    fn test_open_hold_close_sequence() {
        let mut generator = SignalGenerator::new(&filter_params()).unwrap();
        // z: -2.5 → open long, -1.0 hold, -0.4 close, 3.0 open short, 0.5 close
        let signals: Vec<Signal> = [-2.5, -1.0, -0.4, 3.0, 0.5]
            .iter()
            .enumerate()
            .map(|(i, &z)| generator.advance(&innovation(i, z, 1.0)).signal)
            .collect();
        assert_eq!(
            signals,
            vec![
                Signal::LongSpread,
                Signal::LongSpread,
                Signal::Flat,
                Signal::ShortSpread,
                Signal::Flat
            ]
        );
    }

    #[test]
    fn test_warmup_holds_flat() {
        let params = SignalParams {
            warmup_bars: 2,
            ..filter_params()
        };
        let mut generator = SignalGenerator::new(&params).unwrap();
        assert!(generator.in_warmup());

        let first = generator.advance(&innovation(0, -5.0, 1.0));
        assert_eq!(first.z_score, Some(-5.0));
        assert_eq!(first.signal, Signal::Flat);
        assert_eq!(generator.advance(&innovation(1, -5.0, 1.0)).signal, Signal::Flat);

        assert!(!generator.in_warmup());
        assert_eq!(generator.advance(&innovation(2, -5.0, 1.0)).signal, Signal::LongSpread);
    }

    #[test]
    fn test_rolling_mode_waits_for_full_window() {
        let params = SignalParams {
            zscore_mode: ZScoreMode::Rolling,
            rolling_window: 3,
            ..filter_params()
        };
        let mut generator = SignalGenerator::new(&params).unwrap();

        assert_eq!(generator.advance(&innovation(0, 10.0, 1.0)).z_score, None);
        assert_eq!(generator.advance(&innovation(1, -10.0, 1.0)).z_score, None);

        // Window [10, -10, 10]: mean 10/3, population std = 20·√2/3 ≈ 9.43
        let record = generator.advance(&innovation(2, 10.0, 1.0));
        let z = record.z_score.unwrap();
        assert!((z - 10.0 / (20.0 * 2.0_f64.sqrt() / 3.0)).abs() < 1e-12);
        assert_eq!(record.signal, Signal::Flat);
    }

    #[test]
    fn test_rolling_mode_ignores_filter_variance() {
        let params = SignalParams {
            zscore_mode: ZScoreMode::Rolling,
            rolling_window: 2,
            ..filter_params()
        };
        let mut generator = SignalGenerator::new(&params).unwrap();
        generator.advance(&innovation(0, 1.0, 1e-9));
        // Window [1, -3]: mean -1, std 2 → z = -1.5
        let record = generator.advance(&innovation(1, -3.0, 1e-9));
        assert_eq!(record.z_score, Some(-1.5));
    }

    #[test]
    fn test_rejects_invalid_thresholds() {
        let params = SignalParams {
            entry_zscore: 1.0,
            exit_zscore: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            SignalGenerator::new(&params),
            Err(ConfigurationError::InvalidExitThreshold { .. })
        ));
    }
}

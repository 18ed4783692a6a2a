//! Z-Score Gate
//!
//! Rolling normaliser for filter residuals, used when the z-score is taken
//! from realised residual dispersion instead of the filter's own variance.
//!
//! z = residual / std(last `window` residuals)
//!
//! The numerator is the raw residual, not its deviation from the window
//! mean: the residual is already a zero-mean prediction error. The standard
//! deviation is the population one and the window includes the current bar.

use std::collections::VecDeque;

/// Below this the window is treated as constant and z is 0.
const MIN_STD_DEV: f64 = 1e-10;

/// Result of z-score calculation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZScoreResult {
    pub z_score: f64,
    /// Rolling mean of the window, for diagnostics
    pub mean: f64,
    /// Rolling population standard deviation
    pub std_dev: f64,
    pub residual: f64,
}

#[derive(Debug, Clone)]
pub struct ZScoreGate {
    window: usize,
    residuals: VecDeque<f64>,
}

impl ZScoreGate {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            residuals: VecDeque::with_capacity(window + 1),
        }
    }

    /// Push the next residual; `None` until the window is full.
    pub fn update(&mut self, residual: f64) -> Option<ZScoreResult> {
        self.residuals.push_back(residual);
        if self.residuals.len() > self.window {
            self.residuals.pop_front();
        }
        self.calculate()
    }

    /// Z-score of the newest residual against the current window.
    pub fn calculate(&self) -> Option<ZScoreResult> {
        if !self.is_ready() {
            return None;
        }

        let mean = self.rolling_mean();
        let std_dev = self.rolling_std(mean);
        let residual = *self.residuals.back()?;

        let z_score = if std_dev < MIN_STD_DEV {
            0.0
        } else {
            residual / std_dev
        };

        Some(ZScoreResult {
            z_score,
            mean,
            std_dev,
            residual,
        })
    }

    fn rolling_mean(&self) -> f64 {
        self.residuals.iter().sum::<f64>() / self.residuals.len() as f64
    }

    fn rolling_std(&self, mean: f64) -> f64 {
        let variance = self
            .residuals
            .iter()
            .map(|&r| {
                let diff = r - mean;
                diff * diff
            })
            .sum::<f64>()
            / self.residuals.len() as f64;

        variance.sqrt()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn is_ready(&self) -> bool {
        self.window > 0 && self.residuals.len() >= self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gate_creation() {
        let gate = ZScoreGate::new(10);
        assert_eq!(gate.window(), 10);
        assert!(!gate.is_ready());
    }

    #[test]
    fn test_buffer_filling() {
        let mut gate = ZScoreGate::new(4);
        for r in [0.1, -0.1, 0.2] {
            assert!(gate.update(r).is_none());
        }
        assert!(gate.update(-0.2).is_some());
        assert!(gate.is_ready());

        // Window slides: the oldest residual drops out.
        let result = gate.update(0.3).unwrap();
        assert_relative_eq!(result.mean, (-0.1 + 0.2 - 0.2 + 0.3) / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zscore_uses_raw_residual() {
        let mut gate = ZScoreGate::new(4);
        for r in [1.0, -1.0, 1.0] {
            gate.update(r);
        }
        let result = gate.update(-1.0).unwrap();
        // mean 0, population std 1
        assert_relative_eq!(result.mean, 0.0);
        assert_relative_eq!(result.std_dev, 1.0);
        assert_relative_eq!(result.z_score, -1.0);

        // Shifted window: [-1, 1, -1, 3], mean 0.5, std = sqrt(3)
        let result = gate.update(3.0).unwrap();
        assert_relative_eq!(result.mean, 0.5);
        assert_relative_eq!(result.std_dev, 3.0_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(result.z_score, 3.0 / 3.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_constant_window_gives_zero() {
        let mut gate = ZScoreGate::new(3);
        gate.update(0.5);
        gate.update(0.5);
        let result = gate.update(0.5).unwrap();
        assert_eq!(result.z_score, 0.0);
    }
}

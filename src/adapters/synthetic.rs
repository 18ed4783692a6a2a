//! Seeded synthetic pair generator.
//!
//! ```text
//! xₜ = xₜ₋₁ · exp(drift + volatility·εₜ)     εₜ ~ N(0, 1)
//! yₜ = alpha + βₜ·xₜ + noise_std·ηₜ          ηₜ ~ N(0, 1)
//! ```
//!
//! `βₜ` is `beta` before `beta_jump_at` and `beta_after` from then on, which
//! gives a known regime change to test hedge-ratio tracking against. The same
//! seed always produces the same series.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::domain::{Observation, ObservationSeries};
use crate::ports::{ObservationSource, SourceError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticPairConfig {
    pub bars: usize,
    pub seed: u64,
    pub start: DateTime<Utc>,
    pub bar_seconds: i64,
    pub initial_x: f64,
    /// Per-bar log drift of x
    pub drift: f64,
    /// Per-bar log volatility of x
    pub volatility: f64,
    pub alpha: f64,
    pub beta: f64,
    /// Hedge ratio from `beta_jump_at` onwards
    pub beta_after: Option<f64>,
    pub beta_jump_at: Option<usize>,
    /// Standard deviation of the spread noise added to y
    pub noise_std: f64,
}

impl Default for SyntheticPairConfig {
    fn default() -> Self {
        Self {
            bars: 1_000,
            seed: 42,
            start: DateTime::<Utc>::UNIX_EPOCH,
            bar_seconds: 86_400,
            initial_x: 100.0,
            drift: 0.0,
            volatility: 0.01,
            alpha: 0.0,
            beta: 1.0,
            beta_after: None,
            beta_jump_at: None,
            noise_std: 0.5,
        }
    }
}

impl SyntheticPairConfig {
    pub fn beta_at(&self, index: usize) -> f64 {
        match (self.beta_jump_at, self.beta_after) {
            (Some(at), Some(after)) if index >= at => after,
            _ => self.beta,
        }
    }

    pub fn generate(&self) -> Result<Vec<Observation>, SourceError> {
        if self.bars == 0 {
            return Err(SourceError::Generator("bars must be > 0".to_string()));
        }
        if self.bar_seconds <= 0 {
            return Err(SourceError::Generator(format!(
                "bar_seconds must be > 0, got {}",
                self.bar_seconds
            )));
        }
        if !self.initial_x.is_finite() || self.initial_x <= 0.0 {
            return Err(SourceError::Generator(format!(
                "initial_x must be > 0, got {}",
                self.initial_x
            )));
        }
        let step = Normal::new(self.drift, self.volatility)
            .map_err(|e| SourceError::Generator(format!("volatility: {}", e)))?;
        let noise = Normal::new(0.0, self.noise_std)
            .map_err(|e| SourceError::Generator(format!("noise_std: {}", e)))?;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut x = self.initial_x;
        let mut bars = Vec::with_capacity(self.bars);

        for i in 0..self.bars {
            if i > 0 {
                x *= step.sample(&mut rng).exp();
            }
            let y = self.alpha + self.beta_at(i) * x + noise.sample(&mut rng);
            if !x.is_finite() || !y.is_finite() || y <= 0.0 {
                return Err(SourceError::Generator(format!(
                    "bar {} produced price_y={}, price_x={} (alpha={}, beta={})",
                    i,
                    y,
                    x,
                    self.alpha,
                    self.beta_at(i)
                )));
            }
            let t = self.start + Duration::seconds(self.bar_seconds * i as i64);
            bars.push(Observation::new(t, y, x));
        }
        Ok(bars)
    }
}

/// Observation source over a synthetic configuration.
#[derive(Debug, Clone, Default)]
pub struct SyntheticSource {
    config: SyntheticPairConfig,
}

impl SyntheticSource {
    pub fn new(config: SyntheticPairConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SyntheticPairConfig {
        &self.config
    }
}

impl ObservationSource for SyntheticSource {
    fn describe(&self) -> String {
        format!("synthetic(seed={}, bars={})", self.config.seed, self.config.bars)
    }

    fn load(&self) -> Result<ObservationSeries, SourceError> {
        Ok(ObservationSeries::new(self.config.generate()?)?)
    }
}

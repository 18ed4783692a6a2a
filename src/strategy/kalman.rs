//! Kalman filter for a time-varying intercept and hedge ratio.
//!
//! # Model
//!
//! ```text
//! state:        [α, β]ₜ = [α, β]ₜ₋₁ + w,      w ~ N(0, diag(Qα, Qβ))
//! observation:  yₜ = αₜ + βₜ·xₜ + v,          v ~ N(0, R)
//! ```
//!
//! With `H = [1, xₜ]` each bar runs a random-walk predict (`P ← P + Q`)
//! followed by a measurement update. The covariance update uses the Joseph
//! form
//!
//! ```text
//! P ← (I − K·H)·P·(I − K·H)ᵀ + R·K·Kᵀ
//! ```
//!
//! which is positive semi-definite for any gain. Only the upper triangle is
//! computed, so the result is symmetric by construction. A covariance that
//! still fails the PSD check is reported, never patched.
//!
//! [`FilterState`] is a `Copy` value moved through pure `predict`/`update`
//! functions; [`StateEstimator`] owns one state plus the parameters for a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::matrix::{Mat2, Vec2};
use super::params::{ConfigurationError, FilterParams};
use crate::domain::Observation;

/// Relative tolerance for the covariance PSD check.
pub const PSD_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("Innovation variance {0} is not finite and positive")]
    InvalidInnovationVariance(f64),
    #[error("State estimate is not finite: alpha={alpha}, beta={beta}")]
    NonFiniteState { alpha: f64, beta: f64 },
    #[error("Covariance is not symmetric positive semi-definite: {covariance:?}")]
    CovarianceNotPsd { covariance: Mat2 },
}

/// Mean and covariance of `[α, β]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    pub mean: Vec2,
    pub covariance: Mat2,
}

/// One-step-ahead prediction error, taken from the predicted state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Innovation {
    pub predicted_y: f64,
    pub residual: f64,
    /// Innovation variance after the floor is applied
    pub variance: f64,
}

impl FilterState {
    /// `[α₀, β₀]` with `P₀ = scale · I`.
    pub fn initial(params: &FilterParams) -> Self {
        let scale = params.initial_covariance_scale;
        Self {
            mean: Vec2::new(params.initial_alpha_guess, params.initial_beta_guess),
            covariance: Mat2::diagonal(scale, scale),
        }
    }

    pub fn alpha(&self) -> f64 {
        self.mean.0[0]
    }

    pub fn beta(&self) -> f64 {
        self.mean.0[1]
    }

    /// Random-walk time update: mean unchanged, `P ← P + Q`.
    pub fn predict(self, params: &FilterParams) -> FilterState {
        FilterState {
            mean: self.mean,
            covariance: self.covariance
                + Mat2::diagonal(params.process_noise_alpha, params.process_noise_beta),
        }
    }

    /// Measurement update against `y = α + β·x`.
    ///
    /// Returns the corrected state together with the innovation computed
    /// from `self`, the state before correction.
    pub fn update(
        self,
        params: &FilterParams,
        x: f64,
        y: f64,
    ) -> Result<(FilterState, Innovation), FilterError> {
        let h = Vec2::new(1.0, x);
        let predicted_y = h.dot(&self.mean);
        let residual = y - predicted_y;

        let ph = self.covariance.mul_vec(&h);
        let s = h.dot(&ph) + params.measurement_noise;
        if !s.is_finite() || s <= 0.0 {
            return Err(FilterError::InvalidInnovationVariance(s));
        }
        let variance = s.max(params.innovation_variance_floor);

        let gain = ph.scale(1.0 / variance);
        let mean = self.mean + gain.scale(residual);
        if !mean.is_finite() {
            return Err(FilterError::NonFiniteState {
                alpha: mean.0[0],
                beta: mean.0[1],
            });
        }

        let a = Mat2::IDENTITY - gain.outer(&h);
        let covariance =
            self.covariance.congruence(&a) + gain.outer(&gain).scale(params.measurement_noise);
        if !covariance.is_positive_semi_definite(PSD_TOLERANCE) {
            return Err(FilterError::CovarianceNotPsd { covariance });
        }

        Ok((
            FilterState { mean, covariance },
            Innovation {
                predicted_y,
                residual,
                variance,
            },
        ))
    }
}

/// Innovation of one bar, as collected in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InnovationRecord {
    pub index: usize,
    pub t: DateTime<Utc>,
    pub predicted_y: f64,
    pub residual: f64,
    pub residual_variance: f64,
}

impl InnovationRecord {
    pub fn z_score(&self) -> f64 {
        self.residual / self.residual_variance.sqrt()
    }
}

/// Corrected state after one bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub index: usize,
    pub t: DateTime<Utc>,
    pub alpha: f64,
    pub beta: f64,
    pub covariance: Mat2,
}

/// Result of `StateEstimator::update`: the pre-correction innovation paired
/// with the post-correction state of the same bar.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterStep {
    pub innovation: InnovationRecord,
    pub state: StateSnapshot,
}

/// Owns the filter state for one run.
#[derive(Debug, Clone)]
pub struct StateEstimator {
    params: FilterParams,
    state: FilterState,
}

impl StateEstimator {
    pub fn new(params: FilterParams) -> Result<Self, ConfigurationError> {
        params.validate()?;
        Ok(Self {
            state: FilterState::initial(&params),
            params,
        })
    }

    pub fn predict(&mut self) {
        self.state = self.state.predict(&self.params);
    }

    /// Correct the state with bar `index`. On error the state is left as it
    /// was after `predict`.
    pub fn update(&mut self, index: usize, bar: &Observation) -> Result<FilterStep, FilterError> {
        let (state, innovation) = self.state.update(&self.params, bar.price_x, bar.price_y)?;
        self.state = state;

        Ok(FilterStep {
            innovation: InnovationRecord {
                index,
                t: bar.t,
                predicted_y: innovation.predicted_y,
                residual: innovation.residual,
                residual_variance: innovation.variance,
            },
            state: StateSnapshot {
                index,
                t: bar.t,
                alpha: state.alpha(),
                beta: state.beta(),
                covariance: state.covariance,
            },
        })
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn params(&self) -> &FilterParams {
        &self.params
    }

    pub fn hedge_ratio(&self) -> f64 {
        self.state.beta()
    }
}

//! Strategy Parameters
//!
//! Filter, signal and portfolio settings for one backtest run.
//! Everything is validated up front; a run never starts on bad parameters.

use serde::{Deserialize, Serialize};

use crate::domain::{PortfolioParams, Thresholds};

/// Full configuration of a single backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// State estimator settings
    pub filter: FilterParams,
    /// Z-score normalisation and hysteresis thresholds
    pub signal: SignalParams,
    /// Cash, sizing and fees
    pub portfolio: PortfolioParams,
    /// Bars per year, used to annualise the Sharpe ratio
    pub periods_per_year: f64,
}

impl StrategyConfig {
    pub fn new(filter: FilterParams, signal: SignalParams, portfolio: PortfolioParams) -> Self {
        Self {
            filter,
            signal,
            portfolio,
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
        }
    }

    /// Create a new config with custom process noise on both states
    pub fn with_process_noise(mut self, alpha: f64, beta: f64) -> Self {
        self.filter.process_noise_alpha = alpha;
        self.filter.process_noise_beta = beta;
        self
    }

    pub fn with_measurement_noise(mut self, r: f64) -> Self {
        self.filter.measurement_noise = r;
        self
    }

    pub fn with_initial_beta(mut self, beta: f64) -> Self {
        self.filter.initial_beta_guess = beta;
        self
    }

    /// Create a new config with custom entry/exit z thresholds
    pub fn with_thresholds(mut self, entry: f64, exit: f64) -> Self {
        self.signal.entry_zscore = entry;
        self.signal.exit_zscore = exit;
        self
    }

    pub fn with_rolling_zscore(mut self, window: usize) -> Self {
        self.signal.zscore_mode = ZScoreMode::Rolling;
        self.signal.rolling_window = window;
        self
    }

    pub fn with_warmup(mut self, bars: usize) -> Self {
        self.signal.warmup_bars = bars;
        self
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.filter.validate()?;
        self.signal.validate()?;
        validate_portfolio(&self.portfolio)?;
        if !self.periods_per_year.is_finite() || self.periods_per_year <= 0.0 {
            return Err(ConfigurationError::InvalidPeriodsPerYear(self.periods_per_year));
        }
        Ok(())
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::new(
            FilterParams::default(),
            SignalParams::default(),
            PortfolioParams::default(),
        )
    }
}

/// Daily bars
pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0;

/// State estimator parameters. `Q = diag(process_noise_alpha, process_noise_beta)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    /// Per-step drift variance of the intercept
    pub process_noise_alpha: f64,
    /// Per-step drift variance of the hedge ratio
    pub process_noise_beta: f64,
    /// Observation noise variance `R`
    pub measurement_noise: f64,
    pub initial_alpha_guess: f64,
    pub initial_beta_guess: f64,
    /// `P0 = scale · I`
    pub initial_covariance_scale: f64,
    /// Lower bound applied to the innovation variance before the gain is formed
    pub innovation_variance_floor: f64,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            process_noise_alpha: 1e-5,
            process_noise_beta: 1e-5,
            measurement_noise: 1e-3,
            initial_alpha_guess: 0.0,
            initial_beta_guess: 0.0,
            initial_covariance_scale: 1.0,
            innovation_variance_floor: 1e-12,
        }
    }
}

impl FilterParams {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let q = [self.process_noise_alpha, self.process_noise_beta];
        for (name, value) in ["process_noise_alpha", "process_noise_beta"].into_iter().zip(q) {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigurationError::InvalidProcessNoise { name, value });
            }
        }
        if !self.measurement_noise.is_finite() || self.measurement_noise <= 0.0 {
            return Err(ConfigurationError::InvalidMeasurementNoise(self.measurement_noise));
        }
        if !self.initial_alpha_guess.is_finite() || !self.initial_beta_guess.is_finite() {
            return Err(ConfigurationError::InvalidInitialState {
                alpha: self.initial_alpha_guess,
                beta: self.initial_beta_guess,
            });
        }
        if !self.initial_covariance_scale.is_finite() || self.initial_covariance_scale <= 0.0 {
            return Err(ConfigurationError::InvalidCovarianceScale(self.initial_covariance_scale));
        }
        if !self.innovation_variance_floor.is_finite() || self.innovation_variance_floor <= 0.0 {
            return Err(ConfigurationError::InvalidVarianceFloor(self.innovation_variance_floor));
        }
        Ok(())
    }
}

/// How the residual is turned into a z-score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZScoreMode {
    /// `residual / sqrt(S)` using the filter's own innovation variance
    #[default]
    Filter,
    /// `residual / std(last window residuals)`
    Rolling,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalParams {
    /// |z| needed to open a position
    pub entry_zscore: f64,
    /// z level at which an open position is closed
    pub exit_zscore: f64,
    pub zscore_mode: ZScoreMode,
    /// Residual window for `ZScoreMode::Rolling`
    pub rolling_window: usize,
    /// Bars during which the signal is held FLAT
    pub warmup_bars: usize,
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            entry_zscore: 2.0,
            exit_zscore: 0.0,
            zscore_mode: ZScoreMode::Filter,
            rolling_window: 30,
            warmup_bars: 0,
        }
    }
}

impl SignalParams {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            entry: self.entry_zscore,
            exit: self.exit_zscore,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.entry_zscore.is_finite() || self.entry_zscore <= 0.0 {
            return Err(ConfigurationError::InvalidEntryThreshold(self.entry_zscore));
        }
        if !self.exit_zscore.is_finite() || self.exit_zscore >= self.entry_zscore {
            return Err(ConfigurationError::InvalidExitThreshold {
                entry: self.entry_zscore,
                exit: self.exit_zscore,
            });
        }
        if self.zscore_mode == ZScoreMode::Rolling && self.rolling_window < 2 {
            return Err(ConfigurationError::InvalidRollingWindow(self.rolling_window));
        }
        Ok(())
    }
}

fn validate_portfolio(params: &PortfolioParams) -> Result<(), ConfigurationError> {
    if !params.initial_cash.is_finite() || params.initial_cash <= 0.0 {
        return Err(ConfigurationError::InvalidInitialCash(params.initial_cash));
    }
    if !params.notional_per_trade.is_finite() || params.notional_per_trade <= 0.0 {
        return Err(ConfigurationError::InvalidNotional(params.notional_per_trade));
    }
    if !params.fee_per_round_trip.is_finite() || params.fee_per_round_trip < 0.0 {
        return Err(ConfigurationError::InvalidFee(params.fee_per_round_trip));
    }
    Ok(())
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Invalid {name}: {value} (must be finite and >= 0)")]
    InvalidProcessNoise { name: &'static str, value: f64 },
    #[error("Invalid measurement noise: {0} (must be finite and > 0)")]
    InvalidMeasurementNoise(f64),
    #[error("Invalid initial state guess: alpha={alpha}, beta={beta}")]
    InvalidInitialState { alpha: f64, beta: f64 },
    #[error("Invalid initial covariance scale: {0} (must be > 0)")]
    InvalidCovarianceScale(f64),
    #[error("Invalid innovation variance floor: {0} (must be > 0)")]
    InvalidVarianceFloor(f64),
    #[error("Invalid entry z-score: {0} (must be finite and > 0)")]
    InvalidEntryThreshold(f64),
    #[error("Invalid exit z-score: {exit} (must be finite and < entry {entry})")]
    InvalidExitThreshold { entry: f64, exit: f64 },
    #[error("Invalid rolling window: {0} (minimum 2)")]
    InvalidRollingWindow(usize),
    #[error("Invalid initial cash: {0} (must be > 0)")]
    InvalidInitialCash(f64),
    #[error("Invalid notional per trade: {0} (must be > 0)")]
    InvalidNotional(f64),
    #[error("Invalid fee per round trip: {0} (must be >= 0)")]
    InvalidFee(f64),
    #[error("Invalid periods per year: {0} (must be > 0)")]
    InvalidPeriodsPerYear(f64),
}

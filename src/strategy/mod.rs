//! Strategy Layer - Hedge-ratio estimation and spread signals
//!
//! - `matrix`: 2x2 value types for the filter
//! - `params`: filter / signal / portfolio configuration and validation
//! - `kalman`: recursive estimator of `[alpha, beta]`
//! - `zscore_gate`: rolling residual normaliser
//! - `signal_generator`: z-score + hysteresis state machine
//! - `rolling_ols`: fixed-window OLS baseline

pub mod matrix;
pub mod params;
pub mod kalman;
pub mod zscore_gate;
pub mod signal_generator;
pub mod rolling_ols;

pub use matrix::{Mat2, Vec2};
pub use params::{ConfigurationError, FilterParams, SignalParams, StrategyConfig, ZScoreMode};
pub use kalman::{FilterError, FilterState, FilterStep, Innovation, InnovationRecord, StateEstimator, StateSnapshot};
pub use zscore_gate::{ZScoreGate, ZScoreResult};
pub use signal_generator::{SignalGenerator, SignalRecord};
pub use rolling_ols::{rolling_hedge_ratios, OlsFit, RollingOls};

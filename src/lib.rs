//! Kalman Pairs - Dynamic Hedge Ratio Backtesting Library
//!
//! Estimates the time-varying relationship `y = alpha + beta * x` between two
//! price series with a two-state Kalman filter, turns the filter innovations
//! into z-score trading signals and replays a spread strategy bar by bar.
//!
//! # Modules
//!
//! - `domain`: Core types (Observation, Signal, Position, PositionTracker)
//! - `strategy`: Kalman filter, signal generation, rolling OLS baseline
//! - `ports`: Trait abstractions (ObservationSource, ReportSink)
//! - `adapters`: External implementations (CSV files, synthetic data, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Backtest engine, performance report, parameter sweep

pub mod domain;
pub mod ports;
pub mod strategy;
pub mod adapters;
pub mod config;
pub mod application;

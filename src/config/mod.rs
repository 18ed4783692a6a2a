//! Configuration Module
//!
//! Loads and validates backtest configuration from TOML files.

pub mod loader;

pub use loader::{
    load_config, save_config, Config, ConfigError, DataSection, FilterSection, LoggingSection, PortfolioSection,
    SignalSection, SweepSection, DATA_PATH_ENV,
};

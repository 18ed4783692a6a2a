//! Configuration Loader
//!
//! Loads and validates backtest configuration from TOML files matching
//! `config/backtest.toml`. Every section and field is optional; anything
//! missing takes the library default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::application::ParameterGrid;
use crate::domain::PortfolioParams;
use crate::strategy::params::{
    ConfigurationError, FilterParams, SignalParams, StrategyConfig, ZScoreMode, DEFAULT_PERIODS_PER_YEAR,
};

/// Environment variable that overrides `[data] path`
pub const DATA_PATH_ENV: &str = "KALMAN_PAIRS_DATA";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Main configuration structure matching backtest.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub filter: FilterSection,
    pub signal: SignalSection,
    pub portfolio: PortfolioSection,
    pub data: DataSection,
    pub sweep: SweepSection,
    pub logging: LoggingSection,
}

/// State estimator section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSection {
    /// Drift variance of the intercept per bar
    pub process_noise_alpha: f64,
    /// Drift variance of the hedge ratio per bar (higher = faster adaptation)
    pub process_noise_beta: f64,
    /// Observation noise variance (higher = smoother hedge ratio)
    pub measurement_noise: f64,
    pub initial_alpha_guess: f64,
    pub initial_beta_guess: f64,
    pub initial_covariance_scale: f64,
    pub innovation_variance_floor: f64,
}

impl Default for FilterSection {
    fn default() -> Self {
        let p = FilterParams::default();
        Self {
            process_noise_alpha: p.process_noise_alpha,
            process_noise_beta: p.process_noise_beta,
            measurement_noise: p.measurement_noise,
            initial_alpha_guess: p.initial_alpha_guess,
            initial_beta_guess: p.initial_beta_guess,
            initial_covariance_scale: p.initial_covariance_scale,
            innovation_variance_floor: p.innovation_variance_floor,
        }
    }
}

/// Signal section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalSection {
    /// Z-score magnitude to open (2.0 = moderate)
    pub entry_zscore: f64,
    /// Close at the mean (0.0) or before it (> 0)
    pub exit_zscore: f64,
    /// "filter" or "rolling"
    pub zscore_mode: ZScoreMode,
    pub rolling_window: usize,
    pub warmup_bars: usize,
}

impl Default for SignalSection {
    fn default() -> Self {
        let p = SignalParams::default();
        Self {
            entry_zscore: p.entry_zscore,
            exit_zscore: p.exit_zscore,
            zscore_mode: p.zscore_mode,
            rolling_window: p.rolling_window,
            warmup_bars: p.warmup_bars,
        }
    }
}

/// Portfolio section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioSection {
    pub initial_cash: f64,
    /// Gross value of both legs at entry
    pub notional_per_trade: f64,
    /// Flat cost charged once per round trip
    pub fee_per_round_trip: f64,
    /// 252 for daily bars
    pub periods_per_year: f64,
}

impl Default for PortfolioSection {
    fn default() -> Self {
        let p = PortfolioParams::default();
        Self {
            initial_cash: p.initial_cash,
            notional_per_trade: p.notional_per_trade,
            fee_per_round_trip: p.fee_per_round_trip,
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
        }
    }
}

/// Input data section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    /// CSV with `timestamp,price_y,price_x` columns
    pub path: Option<String>,
}

impl DataSection {
    /// Data path with environment variable override and `~` expansion.
    /// Checks KALMAN_PAIRS_DATA first, falls back to the config value.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        std::env::var(DATA_PATH_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.path.clone())
            .map(|p| PathBuf::from(shellexpand::tilde(&p).into_owned()))
    }
}

/// Parameter sweep section. Empty lists keep the single configured value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSection {
    /// Backtests run concurrently
    pub max_parallel: usize,
    pub process_noise_alpha: Vec<f64>,
    pub process_noise_beta: Vec<f64>,
    pub measurement_noise: Vec<f64>,
    pub entry_zscore: Vec<f64>,
    pub exit_zscore: Vec<f64>,
}

impl Default for SweepSection {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            process_noise_alpha: Vec::new(),
            process_noise_beta: Vec::new(),
            measurement_noise: Vec::new(),
            entry_zscore: Vec::new(),
            exit_zscore: Vec::new(),
        }
    }
}

impl SweepSection {
    pub fn grid(&self) -> ParameterGrid {
        ParameterGrid {
            process_noise_alpha: self.process_noise_alpha.clone(),
            process_noise_beta: self.process_noise_beta.clone(),
            measurement_noise: self.measurement_noise.clone(),
            entry_zscore: self.entry_zscore.clone(),
            exit_zscore: self.exit_zscore.clone(),
        }
    }
}

/// Logging configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to render TOML: {0}")]
    RenderError(#[from] toml::ser::Error),
    #[error("Invalid strategy parameters: {0}")]
    Strategy(#[from] ConfigurationError),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Write `config` as TOML, refusing to overwrite unless `force`.
pub fn save_config<P: AsRef<Path>>(config: &Config, path: P, force: bool) -> Result<(), ConfigError> {
    let path = path.as_ref();
    if path.exists() && !force {
        return Err(ConfigError::ValidationError(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, config.to_toml()?)?;
    Ok(())
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        StrategyConfig::from(self).validate()?;

        if self.sweep.max_parallel == 0 {
            return Err(ConfigError::ValidationError(
                "sweep.max_parallel must be > 0".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {:?}, got {}",
                LOG_LEVELS, self.logging.level
            )));
        }

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl From<&Config> for StrategyConfig {
    fn from(config: &Config) -> Self {
        let f = &config.filter;
        let s = &config.signal;
        let p = &config.portfolio;
        StrategyConfig {
            filter: FilterParams {
                process_noise_alpha: f.process_noise_alpha,
                process_noise_beta: f.process_noise_beta,
                measurement_noise: f.measurement_noise,
                initial_alpha_guess: f.initial_alpha_guess,
                initial_beta_guess: f.initial_beta_guess,
                initial_covariance_scale: f.initial_covariance_scale,
                innovation_variance_floor: f.innovation_variance_floor,
            },
            signal: SignalParams {
                entry_zscore: s.entry_zscore,
                exit_zscore: s.exit_zscore,
                zscore_mode: s.zscore_mode,
                rolling_window: s.rolling_window,
                warmup_bars: s.warmup_bars,
            },
            portfolio: PortfolioParams {
                initial_cash: p.initial_cash,
                notional_per_trade: p.notional_per_trade,
                fee_per_round_trip: p.fee_per_round_trip,
            },
            periods_per_year: p.periods_per_year,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> String {
        r#"
[filter]
process_noise_alpha = 1e-6
process_noise_beta = 1e-4
measurement_noise = 0.01
initial_beta_guess = 1.0

[signal]
entry_zscore = 2.5
exit_zscore = 0.5
zscore_mode = "rolling"
rolling_window = 40
warmup_bars = 20

[portfolio]
initial_cash = 50000.0
notional_per_trade = 5000.0
fee_per_round_trip = 1.5

[data]
path = "data/pair.csv"

[sweep]
max_parallel = 2
entry_zscore = [1.5, 2.0, 2.5]

[logging]
level = "debug"
"#
        .to_string()
    }

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = write_temp(&create_valid_config());
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.filter.process_noise_beta, 1e-4);
        assert_eq!(config.filter.initial_beta_guess, 1.0);
        // Unset fields fall back to defaults.
        assert_eq!(config.filter.initial_covariance_scale, 1.0);
        assert_eq!(config.signal.zscore_mode, ZScoreMode::Rolling);
        assert_eq!(config.signal.rolling_window, 40);
        assert_eq!(config.portfolio.notional_per_trade, 5000.0);
        assert_eq!(config.portfolio.periods_per_year, 252.0);
        assert_eq!(config.data.path.as_deref(), Some("data/pair.csv"));
        assert_eq!(config.sweep.grid().entry_zscore, vec![1.5, 2.0, 2.5]);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        let file = write_temp("");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(StrategyConfig::from(&config), StrategyConfig::default());
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/path/backtest.toml");
        assert!(matches!(result.unwrap_err(), ConfigError::IoError(_)));
    }

    #[test]
    fn test_unknown_zscore_mode() {
        let file = write_temp("[signal]\nzscore_mode = \"ewma\"\n");
        assert!(matches!(load_config(file.path()), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_invalid_measurement_noise() {
        let file = write_temp("[filter]\nmeasurement_noise = 0.0\n");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Strategy(ConfigurationError::InvalidMeasurementNoise(_)))
        ));
    }

    #[test]
    fn test_exit_must_be_inside_entry() {
        let file = write_temp("[signal]\nentry_zscore = 1.0\nexit_zscore = 1.0\n");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Strategy(ConfigurationError::InvalidExitThreshold { .. }))
        ));
    }

    #[test]
    fn test_invalid_log_level() {
        let file = write_temp("[logging]\nlevel = \"loud\"\n");
        assert!(matches!(load_config(file.path()), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_config_to_strategy_config() {
        let file = write_temp(&create_valid_config());
        let config = load_config(file.path()).unwrap();
        let strategy = StrategyConfig::from(&config);

        assert_eq!(strategy.filter.measurement_noise, 0.01);
        assert_eq!(strategy.signal.entry_zscore, 2.5);
        assert_eq!(strategy.signal.warmup_bars, 20);
        assert_eq!(strategy.portfolio.initial_cash, 50000.0);
        assert_eq!(strategy.portfolio.fee_per_round_trip, 1.5);
    }

    #[test]
    fn test_save_and_reload_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("backtest.toml");

        save_config(&Config::default(), &path, false).unwrap();
        assert_eq!(load_config(&path).unwrap(), Config::default());

        // Refuses to clobber without force.
        assert!(save_config(&Config::default(), &path, false).is_err());
        assert!(save_config(&Config::default(), &path, true).is_ok());
    }

    #[test]
    fn test_data_path_tilde_expansion() {
        // Only meaningful when the override is not set in the test environment.
        if std::env::var(DATA_PATH_ENV).is_err() {
            let data = DataSection {
                path: Some("~/pairs.csv".to_string()),
            };
            let resolved = data.resolved_path().unwrap();
            assert!(!resolved.to_string_lossy().starts_with('~'));
            assert!(resolved.ends_with("pairs.csv"));
        }
    }
}

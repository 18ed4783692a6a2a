//! Domain Layer - Core business types for the pairs backtester
//!
//! Pure types and logic with no I/O. External data enters through the ports layer.
//!
//! - `observation`: validated price-pair series
//! - `signal`: the three-state spread signal and its hysteresis transition
//! - `position`: spread positions and their open/close events
//! - `equity`: equity points and drawdown
//! - `portfolio`: the position tracker

pub mod observation;
pub mod signal;
pub mod position;
pub mod equity;
pub mod portfolio;

pub use observation::{Observation, ObservationSeries, ValidationError};
pub use signal::{Signal, Thresholds};
pub use position::{EventAction, ExitReason, Position, PositionError, PositionEvent, Side};
pub use equity::{DrawdownTracker, EquityPoint};
pub use portfolio::{PortfolioParams, PositionTracker};

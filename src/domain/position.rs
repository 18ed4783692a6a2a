use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::observation::Observation;
use super::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Long Y, short beta·X
    LongSpread,
    /// Short Y, long beta·X
    ShortSpread,
}

impl Side {
    pub fn from_signal(signal: Signal) -> Option<Side> {
        match signal {
            Signal::LongSpread => Some(Side::LongSpread),
            Signal::ShortSpread => Some(Side::ShortSpread),
            Signal::Flat => None,
        }
    }

    pub fn direction(&self) -> f64 {
        match self {
            Side::LongSpread => 1.0,
            Side::ShortSpread => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Signal returned to FLAT
    Signal,
    /// Still open when the replay ran out of bars
    ForcedLiquidation,
}

#[derive(Debug, Error)]
pub enum PositionError {
    #[error("Invalid spread size: {0}")]
    InvalidSize(f64),
    #[error("Invalid hedge ratio: {0}")]
    InvalidHedgeRatio(f64),
    #[error("Invalid notional: {0}")]
    InvalidNotional(f64),
}

/// An open spread position. The hedge ratio is locked at entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: Side,
    /// Signed spread units: positive long, negative short
    pub spread_units: f64,
    pub hedge_ratio: f64,
    pub entry_index: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_zscore: f64,
    pub entry_price_y: f64,
    pub entry_price_x: f64,
}

impl Position {
    /// Size a new position so that its gross leg value equals `notional`.
    ///
    /// `units = notional / (y + |beta|·x)`
    pub fn open(
        side: Side,
        notional: f64,
        hedge_ratio: f64,
        index: usize,
        bar: &Observation,
        z_score: f64,
    ) -> Result<Self, PositionError> {
        if !notional.is_finite() || notional <= 0.0 {
            return Err(PositionError::InvalidNotional(notional));
        }
        if !hedge_ratio.is_finite() {
            return Err(PositionError::InvalidHedgeRatio(hedge_ratio));
        }

        let gross_per_unit = bar.price_y + hedge_ratio.abs() * bar.price_x;
        let units = notional / gross_per_unit;
        if !units.is_finite() || units <= 0.0 {
            return Err(PositionError::InvalidSize(units));
        }

        Ok(Self {
            side,
            spread_units: units * side.direction(),
            hedge_ratio,
            entry_index: index,
            entry_time: bar.t,
            entry_zscore: z_score,
            entry_price_y: bar.price_y,
            entry_price_x: bar.price_x,
        })
    }

    pub fn qty_y(&self) -> f64 {
        self.spread_units
    }

    pub fn qty_x(&self) -> f64 {
        -self.hedge_ratio * self.spread_units
    }

    /// Signed value of both legs at the given prices.
    pub fn market_value(&self, price_y: f64, price_x: f64) -> f64 {
        self.qty_y() * price_y + self.qty_x() * price_x
    }

    pub fn entry_value(&self) -> f64 {
        self.market_value(self.entry_price_y, self.entry_price_x)
    }

    /// P&L before fees at the given prices.
    pub fn unrealized_pnl(&self, price_y: f64, price_x: f64) -> f64 {
        self.qty_y() * (price_y - self.entry_price_y) + self.qty_x() * (price_x - self.entry_price_x)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    Open,
    Close,
}

/// One open or close in the position log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionEvent {
    pub index: usize,
    pub t: DateTime<Utc>,
    pub action: EventAction,
    pub side: Side,
    pub spread_units: f64,
    pub hedge_ratio: f64,
    pub price_y: f64,
    pub price_x: f64,
    pub z_score: f64,
    pub fee: f64,
    /// Set on close only, net of fee
    pub realized_pnl: Option<f64>,
    /// Set on close only
    pub exit_reason: Option<ExitReason>,
}

impl PositionEvent {
    pub fn opened(position: &Position) -> Self {
        Self {
            index: position.entry_index,
            t: position.entry_time,
            action: EventAction::Open,
            side: position.side,
            spread_units: position.spread_units,
            hedge_ratio: position.hedge_ratio,
            price_y: position.entry_price_y,
            price_x: position.entry_price_x,
            z_score: position.entry_zscore,
            fee: 0.0,
            realized_pnl: None,
            exit_reason: None,
        }
    }

    pub fn closed(
        position: &Position,
        index: usize,
        bar: &Observation,
        z_score: f64,
        fee: f64,
        realized_pnl: f64,
        reason: ExitReason,
    ) -> Self {
        Self {
            index,
            t: bar.t,
            action: EventAction::Close,
            side: position.side,
            spread_units: position.spread_units,
            hedge_ratio: position.hedge_ratio,
            price_y: bar.price_y,
            price_x: bar.price_x,
            z_score,
            fee,
            realized_pnl: Some(realized_pnl),
            exit_reason: Some(reason),
        }
    }

    pub fn is_close(&self) -> bool {
        self.action == EventAction::Close
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bar(y: f64, x: f64) -> Observation {
        Observation::new(DateTime::from_timestamp(0, 0).unwrap(), y, x)
    }

    #[test]
    fn test_open_long_sizing() {
        let position = Position::open(Side::LongSpread, 1_000.0, 0.5, 3, &bar(100.0, 200.0), -2.4).unwrap();
        // gross per unit = 100 + 0.5 * 200 = 200
        assert_relative_eq!(position.spread_units, 5.0);
        assert_relative_eq!(position.qty_y(), 5.0);
        assert_relative_eq!(position.qty_x(), -2.5);
        assert_eq!(position.entry_index, 3);
        assert_eq!(position.entry_zscore, -2.4);
    }

    #[test]
    fn test_open_short_is_mirror() {
        let position = Position::open(Side::ShortSpread, 1_000.0, 0.5, 0, &bar(100.0, 200.0), 2.4).unwrap();
        assert_relative_eq!(position.qty_y(), -5.0);
        assert_relative_eq!(position.qty_x(), 2.5);
    }

    #[test]
    fn test_unrealized_pnl() {
        let position = Position::open(Side::LongSpread, 1_000.0, 0.5, 0, &bar(100.0, 200.0), -2.0).unwrap();
        // y up 2, x up 2: 5*2 - 2.5*2 = 5
        assert_relative_eq!(position.unrealized_pnl(102.0, 202.0), 5.0);
        assert_relative_eq!(
            position.market_value(102.0, 202.0) - position.entry_value(),
            position.unrealized_pnl(102.0, 202.0)
        );
    }

    #[test]
    fn test_invalid_inputs() {
        let b = bar(100.0, 200.0);
        assert!(matches!(
            Position::open(Side::LongSpread, 0.0, 1.0, 0, &b, 0.0),
            Err(PositionError::InvalidNotional(_))
        ));
        assert!(matches!(
            Position::open(Side::LongSpread, 10.0, f64::NAN, 0, &b, 0.0),
            Err(PositionError::InvalidHedgeRatio(_))
        ));
    }

    #[test]
    fn test_event_constructors() {
        let position = Position::open(Side::ShortSpread, 1_000.0, 1.0, 7, &bar(50.0, 50.0), 2.5).unwrap();
        let open = PositionEvent::opened(&position);
        assert_eq!(open.action, EventAction::Open);
        assert_eq!(open.index, 7);
        assert!(open.realized_pnl.is_none());

        let close = PositionEvent::closed(&position, 9, &bar(49.0, 50.0), 0.1, 1.0, 9.0, ExitReason::Signal);
        assert!(close.is_close());
        assert_eq!(close.realized_pnl, Some(9.0));
        assert_eq!(close.exit_reason, Some(ExitReason::Signal));
    }
}

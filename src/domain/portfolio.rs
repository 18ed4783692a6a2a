//! Position tracking for a single spread.
//!
//! Holds cash, at most one open spread position, the position event log and
//! the equity curve. Fees are charged once per round trip, at the close.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::equity::{DrawdownTracker, EquityPoint};
use super::observation::Observation;
use super::position::{ExitReason, Position, PositionError, PositionEvent, Side};
use super::signal::Signal;

/// Book-keeping parameters for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioParams {
    /// Starting cash; also the first drawdown peak
    pub initial_cash: f64,
    /// Gross leg value of each new position
    pub notional_per_trade: f64,
    /// Flat slippage + fees charged when a position is closed
    pub fee_per_round_trip: f64,
}

impl Default for PortfolioParams {
    fn default() -> Self {
        Self {
            initial_cash: 100_000.0,
            notional_per_trade: 10_000.0,
            fee_per_round_trip: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PositionTracker {
    params: PortfolioParams,
    cash: f64,
    open: Option<Position>,
    events: Vec<PositionEvent>,
    equity_curve: Vec<EquityPoint>,
    drawdown: DrawdownTracker,
    realized_pnl: f64,
    fees_paid: f64,
}

impl PositionTracker {
    pub fn new(params: PortfolioParams) -> Self {
        let cash = params.initial_cash;
        Self {
            params,
            cash,
            open: None,
            events: Vec::new(),
            equity_curve: Vec::new(),
            drawdown: DrawdownTracker::new(cash),
            realized_pnl: 0.0,
            fees_paid: 0.0,
        }
    }

    /// React to a signal change on bar `index`.
    ///
    /// Leaving a non-flat state closes the open position at this bar's
    /// prices; entering a non-flat state opens a new one sized from
    /// `notional_per_trade` with `hedge_ratio` locked in.
    pub fn apply_signal(
        &mut self,
        index: usize,
        bar: &Observation,
        previous: Signal,
        next: Signal,
        z_score: f64,
        hedge_ratio: f64,
    ) -> Result<(), PositionError> {
        if previous == next {
            return Ok(());
        }

        if !previous.is_flat() {
            self.close(index, bar, z_score, ExitReason::Signal);
        }

        if let Some(side) = Side::from_signal(next) {
            let position = Position::open(
                side,
                self.params.notional_per_trade,
                hedge_ratio,
                index,
                bar,
                z_score,
            )?;
            self.cash -= position.entry_value();
            debug!(
                index,
                side = ?side,
                units = position.spread_units,
                hedge_ratio,
                z_score,
                "Opened spread position"
            );
            self.events.push(PositionEvent::opened(&position));
            self.open = Some(position);
        }

        Ok(())
    }

    /// Close whatever is still open at the end of the replay.
    pub fn liquidate(&mut self, index: usize, bar: &Observation, z_score: f64) -> Option<&PositionEvent> {
        if self.open.is_none() {
            return None;
        }
        warn!(index, t = %bar.t, "Forcing liquidation of open position at end of data");
        self.close(index, bar, z_score, ExitReason::ForcedLiquidation)
    }

    fn close(&mut self, index: usize, bar: &Observation, z_score: f64, reason: ExitReason) -> Option<&PositionEvent> {
        let position = self.open.take()?;
        let fee = self.params.fee_per_round_trip;
        let realized = position.unrealized_pnl(bar.price_y, bar.price_x) - fee;

        self.cash += position.market_value(bar.price_y, bar.price_x) - fee;
        self.realized_pnl += realized;
        self.fees_paid += fee;

        debug!(index, side = ?position.side, realized, reason = ?reason, "Closed spread position");
        self.events
            .push(PositionEvent::closed(&position, index, bar, z_score, fee, realized, reason));
        self.events.last()
    }

    /// Append the equity point for bar `index`.
    pub fn mark(&mut self, index: usize, bar: &Observation) -> &EquityPoint {
        let mark_to_market_value = self
            .open
            .as_ref()
            .map(|p| p.market_value(bar.price_y, bar.price_x))
            .unwrap_or(0.0);
        let equity = self.cash + mark_to_market_value;
        let drawdown = self.drawdown.update(equity);

        self.equity_curve.push(EquityPoint {
            index,
            t: bar.t,
            cash: self.cash,
            mark_to_market_value,
            equity,
            cumulative_pnl: equity - self.params.initial_cash,
            drawdown,
        });
        &self.equity_curve[self.equity_curve.len() - 1]
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn fees_paid(&self) -> f64 {
        self.fees_paid
    }

    pub fn max_drawdown(&self) -> f64 {
        self.drawdown.max_drawdown()
    }

    pub fn params(&self) -> &PortfolioParams {
        &self.params
    }

    pub fn events(&self) -> &[PositionEvent] {
        &self.events
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn into_parts(self) -> (Vec<EquityPoint>, Vec<PositionEvent>) {
        (self.equity_curve, self.events)
    }
}

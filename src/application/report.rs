//! Backtest report and performance summary.
//!
//! The report is the read-only product of one run: every per-bar series the
//! engine produced plus a summary computed from them after the loop ends.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use statrs::statistics::Statistics;

use crate::domain::{EquityPoint, PositionEvent};
use crate::strategy::{InnovationRecord, SignalRecord, StateSnapshot, StrategyConfig};

/// Quantile of the χ²(1) gate used for the innovation consistency check.
const NIS_GATE_QUANTILE: f64 = 0.95;

/// Everything a run produced, in bar order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub config: StrategyConfig,
    pub equity_curve: Vec<EquityPoint>,
    pub innovations: Vec<InnovationRecord>,
    pub states: Vec<StateSnapshot>,
    pub signals: Vec<SignalRecord>,
    pub events: Vec<PositionEvent>,
    pub summary: PerformanceSummary,
}

impl BacktestReport {
    pub fn final_equity(&self) -> f64 {
        self.summary.final_equity
    }

    /// Hedge ratio after each bar.
    pub fn hedge_ratios(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.beta).collect()
    }

    /// Closing events only.
    pub fn round_trips(&self) -> impl Iterator<Item = &PositionEvent> {
        self.events.iter().filter(|e| e.is_close())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub bars: usize,
    pub initial_cash: f64,
    pub final_equity: f64,
    pub total_return_pct: f64,
    pub max_drawdown: f64,
    pub realized_pnl: f64,
    pub total_fees: f64,
    pub round_trips: usize,
    pub winning_trades: usize,
    /// Fraction of round trips with positive net P&L
    pub win_rate: f64,
    /// Gross profit / gross loss; `None` without a losing trade
    pub profit_factor: Option<f64>,
    /// Annualised mean/std of per-bar returns; `None` when undefined
    pub sharpe_ratio: Option<f64>,
    pub final_hedge_ratio: f64,
    pub forced_liquidation: bool,
    /// Mean of z² over all bars. Near 1 when the noise settings fit the data.
    pub mean_nis: f64,
    /// Share of bars whose z² exceeds the 95% χ²(1) quantile
    pub nis_exceedance_rate: f64,
}

impl PerformanceSummary {
    pub fn compute(
        initial_cash: f64,
        periods_per_year: f64,
        equity_curve: &[EquityPoint],
        innovations: &[InnovationRecord],
        events: &[PositionEvent],
        final_hedge_ratio: f64,
    ) -> Self {
        let final_equity = equity_curve.last().map(|p| p.equity).unwrap_or(initial_cash);

        let closes: Vec<&PositionEvent> = events.iter().filter(|e| e.is_close()).collect();
        let pnls: Vec<f64> = closes.iter().filter_map(|e| e.realized_pnl).collect();
        let winning_trades = pnls.iter().filter(|&&p| p > 0.0).count();
        let gross_profit: f64 = pnls.iter().filter(|&&p| p > 0.0).sum();
        let gross_loss: f64 = pnls.iter().filter(|&&p| p < 0.0).map(|p| p.abs()).sum();

        let win_rate = if pnls.is_empty() {
            0.0
        } else {
            winning_trades as f64 / pnls.len() as f64
        };
        let profit_factor = (gross_loss > 0.0).then(|| gross_profit / gross_loss);

        let (mean_nis, nis_exceedance_rate) = innovation_consistency(innovations);

        Self {
            bars: equity_curve.len(),
            initial_cash,
            final_equity,
            total_return_pct: (final_equity / initial_cash - 1.0) * 100.0,
            max_drawdown: equity_curve.iter().map(|p| p.drawdown).fold(0.0, f64::max),
            realized_pnl: pnls.iter().sum(),
            total_fees: closes.iter().map(|e| e.fee).sum(),
            round_trips: closes.len(),
            winning_trades,
            win_rate,
            profit_factor,
            sharpe_ratio: sharpe_ratio(initial_cash, equity_curve, periods_per_year),
            final_hedge_ratio,
            forced_liquidation: closes
                .iter()
                .any(|e| e.exit_reason == Some(crate::domain::ExitReason::ForcedLiquidation)),
            mean_nis,
            nis_exceedance_rate,
        }
    }
}

/// Simple per-bar returns, the first measured against initial cash.
pub fn bar_returns(initial_cash: f64, equity_curve: &[EquityPoint]) -> Vec<f64> {
    let mut previous = initial_cash;
    equity_curve
        .iter()
        .map(|p| {
            let r = if previous != 0.0 { p.equity / previous - 1.0 } else { 0.0 };
            previous = p.equity;
            r
        })
        .collect()
}

fn sharpe_ratio(initial_cash: f64, equity_curve: &[EquityPoint], periods_per_year: f64) -> Option<f64> {
    let returns = bar_returns(initial_cash, equity_curve);
    if returns.len() < 2 {
        return None;
    }
    let mean = returns.iter().mean();
    let std_dev = returns.iter().std_dev();
    if !std_dev.is_finite() || std_dev < 1e-12 {
        return None;
    }
    Some(mean / std_dev * periods_per_year.sqrt())
}

fn innovation_consistency(innovations: &[InnovationRecord]) -> (f64, f64) {
    if innovations.is_empty() {
        return (0.0, 0.0);
    }
    let nis: Vec<f64> = innovations.iter().map(|i| i.z_score().powi(2)).collect();
    let gate = ChiSquared::new(1.0)
        .map(|chi| chi.inverse_cdf(NIS_GATE_QUANTILE))
        .unwrap_or(f64::INFINITY);
    let exceed = nis.iter().filter(|&&v| v > gate).count();
    (nis.iter().mean(), exceed as f64 / nis.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventAction, ExitReason, Side};
    use approx::assert_relative_eq;
    use chrono::{DateTime, Utc};

    fn ts(i: usize) -> DateTime<Utc> {
        DateTime::from_timestamp(i as i64 * 86_400, 0).unwrap()
    }

    fn point(i: usize, equity: f64, drawdown: f64) -> EquityPoint {
        EquityPoint {
            index: i,
            t: ts(i),
            cash: equity,
            mark_to_market_value: 0.0,
            equity,
            cumulative_pnl: equity - 1_000.0,
            drawdown,
        }
    }

    fn close(i: usize, pnl: f64, reason: ExitReason) -> PositionEvent {
        PositionEvent {
            index: i,
            t: ts(i),
            action: EventAction::Close,
            side: Side::LongSpread,
            spread_units: 1.0,
            hedge_ratio: 1.0,
            price_y: 100.0,
            price_x: 100.0,
            z_score: 0.0,
            fee: 1.0,
            realized_pnl: Some(pnl),
            exit_reason: Some(reason),
        }
    }

    fn innovation(i: usize, residual: f64) -> InnovationRecord {
        InnovationRecord {
            index: i,
            t: ts(i),
            predicted_y: 0.0,
            residual,
            residual_variance: 1.0,
        }
    }

    #[test]
    fn test_trade_statistics() {
        let curve = vec![point(0, 1_000.0, 0.0), point(1, 1_010.0, 0.0), point(2, 1_005.0, 5.0 / 1_010.0)];
        let events = vec![
            close(0, 20.0, ExitReason::Signal),
            close(1, -10.0, ExitReason::Signal),
            close(2, -5.0, ExitReason::ForcedLiquidation),
        ];
        let summary = PerformanceSummary::compute(1_000.0, 252.0, &curve, &[], &events, 1.2);

        assert_eq!(summary.round_trips, 3);
        assert_eq!(summary.winning_trades, 1);
        assert_relative_eq!(summary.win_rate, 1.0 / 3.0);
        assert_relative_eq!(summary.profit_factor.unwrap(), 20.0 / 15.0);
        assert_relative_eq!(summary.realized_pnl, 5.0);
        assert_relative_eq!(summary.total_fees, 3.0);
        assert_relative_eq!(summary.total_return_pct, 0.5);
        assert_relative_eq!(summary.max_drawdown, 5.0 / 1_010.0);
        assert!(summary.forced_liquidation);
        assert_eq!(summary.final_hedge_ratio, 1.2);
    }

    #[test]
    fn test_no_trades() {
        let curve = vec![point(0, 1_000.0, 0.0), point(1, 1_000.0, 0.0)];
        let summary = PerformanceSummary::compute(1_000.0, 252.0, &curve, &[], &[], 1.0);
        assert_eq!(summary.round_trips, 0);
        assert_eq!(summary.win_rate, 0.0);
        assert!(summary.profit_factor.is_none());
        // Flat equity has no return dispersion.
        assert!(summary.sharpe_ratio.is_none());
        assert!(!summary.forced_liquidation);
    }

    #[test]
    fn test_bar_returns_and_sharpe() {
        let curve = vec![point(0, 1_000.0, 0.0), point(1, 1_100.0, 0.0), point(2, 1_045.0, 0.05)];
        let returns = bar_returns(1_000.0, &curve);
        assert_relative_eq!(returns[0], 0.0);
        assert_relative_eq!(returns[1], 0.1, epsilon = 1e-12);
        assert_relative_eq!(returns[2], -0.05, epsilon = 1e-12);

        let summary = PerformanceSummary::compute(1_000.0, 4.0, &curve, &[], &[], 1.0);
        // mean 0.05/3, sample std of [0, 0.1, -0.05]
        let mean: f64 = 0.05 / 3.0;
        let var = ((0.0 - mean).powi(2) + (0.1 - mean).powi(2) + (-0.05 - mean).powi(2)) / 2.0;
        assert_relative_eq!(summary.sharpe_ratio.unwrap(), mean / var.sqrt() * 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_innovation_consistency() {
        let innovations: Vec<InnovationRecord> =
            [1.0, -1.0, 3.0, 0.0].iter().enumerate().map(|(i, &r)| innovation(i, r)).collect();
        let summary = PerformanceSummary::compute(1_000.0, 252.0, &[], &innovations, &[], 1.0);
        assert_relative_eq!(summary.mean_nis, 11.0 / 4.0);
        // Only 3² = 9 is above the ~3.84 gate.
        assert_relative_eq!(summary.nis_exceedance_rate, 0.25);
        assert_eq!(summary.final_equity, 1_000.0);
    }
}

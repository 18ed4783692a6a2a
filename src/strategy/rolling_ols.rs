//! Fixed-window ordinary least squares hedge ratio.
//!
//! Baseline for judging the Kalman estimate: regresses `y` on `x` over the
//! last `window` bars, with every bar in the window weighted equally.

use std::collections::VecDeque;

/// Denominator below which the window has no usable x variation.
const MIN_DENOMINATOR: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OlsFit {
    pub alpha: f64,
    pub beta: f64,
}

#[derive(Debug, Clone)]
pub struct RollingOls {
    window: usize,
    pairs: VecDeque<(f64, f64)>,
}

impl RollingOls {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(2),
            pairs: VecDeque::with_capacity(window + 1),
        }
    }

    /// Push the next `(x, y)`; `None` until the window is full or when the
    /// window's x values are (numerically) constant.
    pub fn update(&mut self, x: f64, y: f64) -> Option<OlsFit> {
        self.pairs.push_back((x, y));
        if self.pairs.len() > self.window {
            self.pairs.pop_front();
        }
        self.fit()
    }

    pub fn fit(&self) -> Option<OlsFit> {
        if self.pairs.len() < self.window {
            return None;
        }

        let n = self.pairs.len() as f64;
        let (sum_x, sum_y, sum_xy, sum_x2) = self.pairs.iter().fold(
            (0.0, 0.0, 0.0, 0.0),
            |(sx, sy, sxy, sx2), &(x, y)| (sx + x, sy + y, sxy + x * y, sx2 + x * x),
        );

        let denominator = n * sum_x2 - sum_x * sum_x;
        if denominator.abs() < MIN_DENOMINATOR {
            return None;
        }

        let beta = (n * sum_xy - sum_x * sum_y) / denominator;
        let alpha = (sum_y - beta * sum_x) / n;
        Some(OlsFit { alpha, beta })
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

/// Hedge ratio after each bar; `None` while the window is filling.
pub fn rolling_hedge_ratios(window: usize, bars: impl IntoIterator<Item = (f64, f64)>) -> Vec<Option<f64>> {
    let mut ols = RollingOls::new(window);
    bars.into_iter()
        .map(|(x, y)| ols.update(x, y).map(|fit| fit.beta))
        .collect()
}

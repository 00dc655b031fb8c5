//! Crossover parameter sweep.
//!
//! Every (fast, slow) pair with fast < slow is run stock-by-stock over the
//! same universe. Each combination owns its trade log; nothing is shared
//! between workers.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use tracing::info;

use crate::domain::engine::{BacktestConfig, run_stock_by_stock};
use crate::domain::metrics::{SummaryStatistics, median};
use crate::domain::price_bar::InstrumentSeries;
use crate::domain::strategy::{Strategy, StrategyKind, StrategyParams};

#[derive(Debug, Clone, PartialEq)]
pub struct ParamGrid {
    pub fast_periods: Vec<usize>,
    pub slow_periods: Vec<usize>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        ParamGrid {
            fast_periods: vec![5, 7, 10, 13, 15, 20, 23, 25],
            slow_periods: vec![30, 33, 35, 37, 40, 43, 45, 47, 50, 52],
        }
    }
}

impl ParamGrid {
    /// Valid (fast, slow) pairs in grid order.
    pub fn combinations(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for &fast in &self.fast_periods {
            for &slow in &self.slow_periods {
                // Skip invalid combinations (fast >= slow)
                if fast == 0 || fast >= slow {
                    continue;
                }
                pairs.push((fast, slow));
            }
        }
        pairs
    }

    /// Bars needed by the least demanding combination.
    pub fn min_bars(&self) -> Option<usize> {
        self.combinations().iter().map(|&(_, slow)| slow).min()
    }
}

/// Statistics for one (fast, slow) combination. Field order is the sweep.csv column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepRow {
    pub fast: usize,
    pub slow: usize,
    pub total_trades: usize,
    pub total_profit: f64,
    pub mean_profit: f64,
    pub median_profit: f64,
    pub min_profit: f64,
    pub max_profit: f64,
    pub win_rate: f64,
}

fn evaluate(
    universe: &[InstrumentSeries],
    base: &StrategyParams,
    config: &BacktestConfig,
    fast: usize,
    slow: usize,
) -> SweepRow {
    let mut params = base.clone();
    params.fast_period = fast;
    params.slow_period = slow;
    let strategy = Strategy::new(StrategyKind::Crossover, &params);

    let outcome = run_stock_by_stock(universe, &strategy, config, None);
    let trades = outcome.log.trades();
    let summary = SummaryStatistics::compute(trades);
    let profits: Vec<f64> = trades.iter().map(|t| t.profit).collect();

    SweepRow {
        fast,
        slow,
        total_trades: summary.total_trades,
        total_profit: summary.total_profit,
        mean_profit: summary.mean_profit_per_trade,
        median_profit: median(&profits),
        min_profit: profits.iter().copied().reduce(f64::min).unwrap_or(0.0),
        max_profit: profits.iter().copied().reduce(f64::max).unwrap_or(0.0),
        win_rate: summary.win_rate_per_trade,
    }
}

/// Run every combination; rows sorted by total profit descending, then (fast, slow).
pub fn run_sweep(
    universe: &[InstrumentSeries],
    base: &StrategyParams,
    config: &BacktestConfig,
    grid: &ParamGrid,
    parallel: bool,
) -> Vec<SweepRow> {
    let combinations = grid.combinations();
    info!(combinations = combinations.len(), instruments = universe.len(), parallel, "starting sweep");

    let mut rows: Vec<SweepRow> = if parallel {
        run_parallel(universe, base, config, &combinations)
    } else {
        combinations
            .iter()
            .map(|&(fast, slow)| evaluate(universe, base, config, fast, slow))
            .collect()
    };

    rows.sort_by(|a, b| {
        b.total_profit
            .partial_cmp(&a.total_profit)
            .unwrap_or(Ordering::Equal)
            .then((a.fast, a.slow).cmp(&(b.fast, b.slow)))
    });
    rows
}

#[cfg(feature = "parallel")]
fn run_parallel(
    universe: &[InstrumentSeries],
    base: &StrategyParams,
    config: &BacktestConfig,
    combinations: &[(usize, usize)],
) -> Vec<SweepRow> {
    combinations
        .par_iter()
        .map(|&(fast, slow)| evaluate(universe, base, config, fast, slow))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn run_parallel(
    universe: &[InstrumentSeries],
    base: &StrategyParams,
    config: &BacktestConfig,
    combinations: &[(usize, usize)],
) -> Vec<SweepRow> {
    combinations
        .iter()
        .map(|&(fast, slow)| evaluate(universe, base, config, fast, slow))
        .collect()
}

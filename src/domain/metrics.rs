//! Aggregate statistics over a trade log.
//!
//! Results do not depend on the order of the input trades: profits are sorted
//! before summing and instruments are grouped by ticker.

use crate::domain::position::TradeRecord;
use serde::Serialize;
use std::collections::BTreeMap;

/// Run-level summary. Serialized names are the summary.csv headers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryStatistics {
    #[serde(rename = "Total Trades")]
    pub total_trades: usize,
    #[serde(rename = "Total Stocks")]
    pub total_instruments: usize,
    #[serde(rename = "Total Profit")]
    pub total_profit: f64,
    #[serde(rename = "Average Profit per Trade")]
    pub mean_profit_per_trade: f64,
    #[serde(rename = "Median Profit per Trade")]
    pub median_profit_per_trade: f64,
    #[serde(rename = "Success Probability per Trade")]
    pub win_rate_per_trade: f64,
    #[serde(rename = "Average Profit per Stock")]
    pub mean_profit_per_instrument: f64,
    #[serde(rename = "Median Profit per Stock")]
    pub median_profit_per_instrument: f64,
    #[serde(rename = "Success Probability per Stock")]
    pub win_rate_per_instrument: f64,
}

impl SummaryStatistics {
    /// Summarize `trades`; an empty slice gives all zeros.
    pub fn compute(trades: &[TradeRecord]) -> Self {
        if trades.is_empty() {
            return SummaryStatistics::default();
        }

        let trade_profits: Vec<f64> = trades.iter().map(|t| t.profit).collect();
        let instruments = InstrumentSummary::compute_all(trades);
        let instrument_profits: Vec<f64> = instruments.iter().map(|i| i.total_profit).collect();

        let total_profit = stable_sum(&trade_profits);
        let wins = trades.iter().filter(|t| t.is_win()).count();
        let winning_instruments = instruments.iter().filter(|i| i.total_profit > 0.0).count();

        SummaryStatistics {
            total_trades: trades.len(),
            total_instruments: instruments.len(),
            total_profit,
            mean_profit_per_trade: total_profit / trades.len() as f64,
            median_profit_per_trade: median(&trade_profits),
            win_rate_per_trade: wins as f64 / trades.len() as f64,
            mean_profit_per_instrument: stable_sum(&instrument_profits) / instruments.len() as f64,
            median_profit_per_instrument: median(&instrument_profits),
            win_rate_per_instrument: winning_instruments as f64 / instruments.len() as f64,
        }
    }
}

/// Per-ticker breakdown written to instruments.csv.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentSummary {
    pub ticker: String,
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub total_profit: f64,
    pub buy_prices: Vec<f64>,
    pub sell_prices: Vec<f64>,
}

impl InstrumentSummary {
    /// One summary per distinct ticker, sorted by ticker.
    pub fn compute_all(trades: &[TradeRecord]) -> Vec<InstrumentSummary> {
        let mut groups: BTreeMap<&str, Vec<&TradeRecord>> = BTreeMap::new();
        for trade in trades {
            groups.entry(trade.ticker.as_str()).or_default().push(trade);
        }

        groups
            .into_iter()
            .map(|(ticker, mut group)| {
                group.sort_by(|a, b| {
                    a.entry_date
                        .cmp(&b.entry_date)
                        .then(a.exit_date.cmp(&b.exit_date))
                        .then(a.entry_price.total_cmp(&b.entry_price))
                        .then(a.profit.total_cmp(&b.profit))
                });
                let profits: Vec<f64> = group.iter().map(|t| t.profit).collect();
                InstrumentSummary {
                    ticker: ticker.to_string(),
                    trades: group.len(),
                    wins: group.iter().filter(|t| t.profit > 0.0).count(),
                    losses: group.iter().filter(|t| t.profit < 0.0).count(),
                    total_profit: stable_sum(&profits),
                    buy_prices: group.iter().map(|t| t.entry_price).collect(),
                    sell_prices: group.iter().map(|t| t.exit_price).collect(),
                }
            })
            .collect()
    }
}

/// Sum in sorted order so the result does not depend on input order.
fn stable_sum(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.iter().sum()
}

/// Median of `values`; the mean of the middle pair for even lengths, 0 when empty.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

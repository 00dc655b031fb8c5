//! Per-instrument position lifecycle and completed trade records.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// A long position held between entry and exit.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub share_count: u64,
    pub stop_price: Option<f64>,
    pub target_price: Option<f64>,
}

impl OpenPosition {
    pub fn market_value(&self, price: f64) -> f64 {
        self.share_count as f64 * price
    }

    pub fn unrealized_profit(&self, price: f64) -> f64 {
        self.share_count as f64 * (price - self.entry_price)
    }

    pub fn should_stop(&self, close: f64) -> bool {
        self.stop_price.is_some_and(|stop| close <= stop)
    }

    pub fn should_take_profit(&self, close: f64) -> bool {
        self.target_price.is_some_and(|target| close >= target)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PositionState {
    #[default]
    Flat,
    Open(OpenPosition),
}

impl PositionState {
    pub fn is_open(&self) -> bool {
        matches!(self, PositionState::Open(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitReason {
    Target,
    Stop,
    Signal,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Target => write!(f, "target"),
            ExitReason::Stop => write!(f, "stop"),
            ExitReason::Signal => write!(f, "signal"),
        }
    }
}

/// One completed round-trip. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub ticker: String,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    pub profit: f64,
    pub profit_percent: f64,
    pub share_count: u64,
    pub exit_reason: ExitReason,
}

impl TradeRecord {
    pub fn close(
        ticker: &str,
        position: &OpenPosition,
        exit_date: NaiveDate,
        exit_price: f64,
        exit_reason: ExitReason,
    ) -> Self {
        let profit = position.unrealized_profit(exit_price);
        let cost = position.market_value(position.entry_price);
        let profit_percent = if cost > 0.0 {
            profit / cost * 100.0
        } else {
            0.0
        };
        TradeRecord {
            ticker: ticker.to_string(),
            entry_date: position.entry_date,
            entry_price: position.entry_price,
            exit_date,
            exit_price,
            profit,
            profit_percent,
            share_count: position.share_count,
            exit_reason,
        }
    }

    pub fn is_win(&self) -> bool {
        self.profit > 0.0
    }
}

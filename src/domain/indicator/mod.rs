//! Technical indicators used by the signal rules.
//!
//! - `IndicatorPoint`: one point in an indicator time series
//! - `IndicatorType`: indicator identity + parameters
//! - `IndicatorSeries`: a time series aligned one-to-one with its input bars
//!
//! Points inside the warmup period are present but marked invalid.

pub mod atr;
pub mod ema;
pub mod rsi;
pub mod sma;

use chrono::NaiveDate;
use std::fmt;

pub use atr::calculate_atr;
pub use ema::calculate_ema;
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Atr(usize),
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Value at `index`, or `None` while warming up or out of range.
    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.values
            .get(index)
            .filter(|p| p.valid)
            .map(|p| p.value)
    }

    /// Value at the most recent bar.
    pub fn last(&self) -> Option<f64> {
        self.values.len().checked_sub(1).and_then(|i| self.value_at(i))
    }

    /// Value one bar before the most recent.
    pub fn previous(&self) -> Option<f64> {
        self.values.len().checked_sub(2).and_then(|i| self.value_at(i))
    }

    pub(crate) fn invalid_point(date: NaiveDate) -> IndicatorPoint {
        IndicatorPoint {
            date,
            valid: false,
            value: 0.0,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
        }
    }
}

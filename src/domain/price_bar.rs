//! Price bars and per-instrument series.

use chrono::{Datelike, NaiveDate};
use std::fmt;

use super::error::TraderError;

/// One OHLCV observation for one instrument at one sampling interval.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// (high + low) / 2
    pub fn midpoint(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Sampling interval of a fetched series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    Daily,
    Monthly,
}

impl Interval {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "daily" | "1d" => Some(Interval::Daily),
            "monthly" | "1mo" => Some(Interval::Monthly),
            _ => None,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interval::Daily => write!(f, "daily"),
            Interval::Monthly => write!(f, "monthly"),
        }
    }
}

/// Chronological, duplicate-free bars for one ticker.
///
/// Read-only once built: consumers only ever see `&[PriceBar]` slices.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentSeries {
    ticker: String,
    bars: Vec<PriceBar>,
}

impl InstrumentSeries {
    /// Build a series, rejecting bars that are out of order or share a date.
    pub fn new(ticker: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self, TraderError> {
        let ticker = ticker.into();
        if let Some(pair) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(TraderError::EngineFailure {
                reason: format!(
                    "bars not strictly chronological at {} -> {}",
                    pair[0].date, pair[1].date
                ),
                ticker,
            });
        }
        Ok(Self { ticker, bars })
    }

    /// Sort by date and keep the first bar seen for each date.
    pub fn from_unordered(ticker: impl Into<String>, mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        Self {
            ticker: ticker.into(),
            bars,
        }
    }

    pub fn empty(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            bars: Vec::new(),
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Index of the bar dated `date`, if any.
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.bars.binary_search_by_key(&date, |b| b.date).ok()
    }

    /// Number of bars dated on or before `date`.
    pub fn count_through(&self, date: NaiveDate) -> usize {
        self.bars.partition_point(|b| b.date <= date)
    }

    /// Collapse the series into one bar per calendar month.
    ///
    /// Each monthly bar is dated on the first bar of its month.
    pub fn to_monthly(&self) -> InstrumentSeries {
        let mut months: Vec<PriceBar> = Vec::new();
        for bar in &self.bars {
            match months.last_mut() {
                Some(m) if same_month(m.date, bar.date) => {
                    m.high = m.high.max(bar.high);
                    m.low = m.low.min(bar.low);
                    m.close = bar.close;
                    m.volume += bar.volume;
                }
                _ => months.push(bar.clone()),
            }
        }
        InstrumentSeries {
            ticker: self.ticker.clone(),
            bars: months,
        }
    }
}

fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

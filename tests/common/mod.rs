#![allow(dead_code)]

use chrono::NaiveDate;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use swingtrader::domain::engine::BacktestConfig;
use swingtrader::domain::error::TraderError;
use swingtrader::domain::price_bar::{InstrumentSeries, Interval, PriceBar};
use swingtrader::domain::strategy::{Strategy, StrategyKind, StrategyParams};
use swingtrader::ports::data_port::MarketDataPort;

/// Closes of the two-period / four-period SMA crossover scenario: one entry at
/// 13 and one exit at 7.
pub const CROSSOVER_CLOSES: [f64; 10] = [10.0, 11.0, 12.0, 13.0, 20.0, 8.0, 7.0, 6.0, 5.0, 4.0];

pub struct MockMarketDataPort {
    pub series: HashMap<String, Vec<PriceBar>>,
    pub caps: HashMap<String, f64>,
    pub errors: HashMap<String, String>,
}

impl MockMarketDataPort {
    pub fn new() -> Self {
        Self {
            series: HashMap::new(),
            caps: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<PriceBar>) -> Self {
        self.series.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_cap(mut self, ticker: &str, cap: f64) -> Self {
        self.caps.insert(ticker.to_string(), cap);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl MarketDataPort for MockMarketDataPort {
    fn fetch_series(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<InstrumentSeries, TraderError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(TraderError::DataUnavailable {
                ticker: ticker.to_string(),
                reason: reason.clone(),
            });
        }
        let bars: Vec<PriceBar> = self
            .series
            .get(ticker)
            .map(|bars| {
                bars.iter()
                    .filter(|b| start <= b.date && b.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let series = InstrumentSeries::from_unordered(ticker, bars);
        Ok(match interval {
            Interval::Daily => series,
            Interval::Monthly => series.to_monthly(),
        })
    }

    fn market_cap(&self, ticker: &str) -> Option<f64> {
        self.caps.get(ticker).copied()
    }

    fn list_tickers(&self) -> Result<Vec<String>, TraderError> {
        let mut tickers: Vec<String> = self.series.keys().cloned().collect();
        tickers.sort();
        Ok(tickers)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A flat bar: open, high, low and close all equal.
pub fn make_bar(date: NaiveDate, close: f64, volume: f64) -> PriceBar {
    PriceBar {
        date,
        open: close,
        high: close,
        low: close,
        close,
        volume,
    }
}

/// One flat bar per day from `start`.
pub fn daily_bars(start: NaiveDate, closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(start + chrono::Duration::days(i as i64), c, 1000.0))
        .collect()
}

pub fn daily_series(ticker: &str, closes: &[f64]) -> InstrumentSeries {
    InstrumentSeries::new(ticker, daily_bars(date(2024, 1, 1), closes)).unwrap()
}

pub fn crossover_strategy(fast: usize, slow: usize) -> Strategy {
    let mut params = StrategyParams::defaults_for(StrategyKind::Crossover);
    params.fast_period = fast;
    params.slow_period = slow;
    Strategy::new(StrategyKind::Crossover, &params)
}

pub fn sample_config() -> BacktestConfig {
    BacktestConfig {
        start_date: date(2024, 1, 1),
        end_date: date(2024, 12, 31),
        initial_capital: 100_000.0,
        max_cash_per_trade: 30_000.0,
    }
}

/// Write `{ticker}.csv` in the layout the CSV market data adapter reads.
pub fn write_price_file(dir: &Path, ticker: &str, bars: &[PriceBar]) {
    let mut content = String::from("date,open,high,low,close,volume\n");
    for b in bars {
        content.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.date, b.open, b.high, b.low, b.close, b.volume
        ));
    }
    fs::write(dir.join(format!("{}.csv", ticker)), content).unwrap();
}

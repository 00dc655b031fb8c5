//! CSV directory market data adapter.
//!
//! Layout of `data_dir`:
//! - `{TICKER}.csv` with header `date,open,high,low,close,volume`, daily bars
//! - `market_caps.csv` (optional) with header `Ticker,MarketCap`

use crate::domain::error::TraderError;
use crate::domain::price_bar::{InstrumentSeries, Interval, PriceBar};
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const MARKET_CAP_FILE: &str = "market_caps.csv";

#[derive(Debug, Deserialize)]
struct BarRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct MarketCapRow {
    #[serde(rename = "Ticker")]
    ticker: String,
    #[serde(rename = "MarketCap")]
    market_cap: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TickerRow {
    #[serde(rename = "Ticker")]
    ticker: String,
}

pub struct CsvMarketData {
    base_path: PathBuf,
    market_caps: HashMap<String, f64>,
}

impl CsvMarketData {
    /// Open a data directory. A missing `market_caps.csv` leaves every cap unknown.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, TraderError> {
        let base_path = base_path.into();
        let caps_path = base_path.join(MARKET_CAP_FILE);
        let market_caps = if caps_path.exists() {
            read_market_caps(&caps_path)?
        } else {
            debug!(path = %caps_path.display(), "no market cap file");
            HashMap::new()
        };
        Ok(Self {
            base_path,
            market_caps,
        })
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", ticker))
    }
}

fn read_market_caps(path: &Path) -> Result<HashMap<String, f64>, TraderError> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut caps = HashMap::new();
    for row in rdr.deserialize::<MarketCapRow>() {
        let row = row?;
        if let Some(cap) = row.market_cap.filter(|c| c.is_finite()) {
            caps.insert(row.ticker.trim().to_uppercase(), cap);
        }
    }
    Ok(caps)
}

impl MarketDataPort for CsvMarketData {
    fn fetch_series(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<InstrumentSeries, TraderError> {
        let path = self.csv_path(ticker);
        if !path.exists() {
            warn!(ticker = %ticker, path = %path.display(), "no price file");
            return Ok(InstrumentSeries::empty(ticker));
        }

        let mut rdr = csv::Reader::from_path(&path)?;
        let mut bars = Vec::new();
        for row in rdr.deserialize::<BarRow>() {
            let row = row?;
            if row.date < start || row.date > end {
                continue;
            }
            bars.push(PriceBar {
                date: row.date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        let daily = InstrumentSeries::from_unordered(ticker, bars);
        Ok(match interval {
            Interval::Daily => daily,
            Interval::Monthly => daily.to_monthly(),
        })
    }

    fn market_cap(&self, ticker: &str) -> Option<f64> {
        self.market_caps.get(&ticker.to_uppercase()).copied()
    }

    fn list_tickers(&self) -> Result<Vec<String>, TraderError> {
        let mut tickers = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if name == MARKET_CAP_FILE {
                continue;
            }
            if let Some(ticker) = name.strip_suffix(".csv") {
                tickers.push(ticker.to_string());
            }
        }
        tickers.sort();
        Ok(tickers)
    }
}

/// Tickers from the `Ticker` column of a universe file, upper-cased, in file
/// order, blanks and repeats dropped.
pub fn load_universe_file<P: AsRef<Path>>(path: P) -> Result<Vec<String>, TraderError> {
    let mut rdr = csv::Reader::from_path(path.as_ref())?;
    let mut seen = HashSet::new();
    let mut tickers = Vec::new();
    for row in rdr.deserialize::<TickerRow>() {
        let ticker = row?.ticker.trim().to_uppercase();
        if ticker.is_empty() || !seen.insert(ticker.clone()) {
            continue;
        }
        tickers.push(ticker);
    }
    Ok(tickers)
}

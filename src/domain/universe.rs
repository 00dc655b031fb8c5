//! Universe preparation: ticker lists, market-cap filtering, series loading.
//!
//! Every ticker is fetched once up front. Tickers that cannot be traded are
//! logged and skipped; only an entirely empty result is an error.

use crate::domain::error::TraderError;
use crate::domain::price_bar::{InstrumentSeries, Interval};
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),
}

/// Parse a comma-separated ticker list, upper-casing each entry.
pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = trimmed.to_uppercase();
        if !seen.insert(code.clone()) {
            return Err(UniverseError::DuplicateTicker(code));
        }
        codes.push(code);
    }

    Ok(codes)
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniverseRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub interval: Interval,
    /// Zero disables the market-cap filter.
    pub min_market_cap: f64,
    pub min_bars: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    MarketCapUnknown,
    MarketCapBelow { cap: f64, minimum: f64 },
    FetchFailed(String),
    NoData,
    InsufficientBars { bars: usize, minimum: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MarketCapUnknown => write!(f, "market cap unknown"),
            SkipReason::MarketCapBelow { cap, minimum } => {
                write!(f, "market cap {:.0} below {:.0}", cap, minimum)
            }
            SkipReason::FetchFailed(reason) => write!(f, "fetch failed: {}", reason),
            SkipReason::NoData => write!(f, "no data"),
            SkipReason::InsufficientBars { bars, minimum } => {
                write!(f, "only {} bars, minimum {} required", bars, minimum)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedCode {
    pub ticker: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    pub series: Vec<InstrumentSeries>,
    pub skipped: Vec<SkippedCode>,
}

impl Universe {
    pub fn count(&self) -> usize {
        self.series.len()
    }

    pub fn tickers(&self) -> Vec<&str> {
        self.series.iter().map(|s| s.ticker()).collect()
    }
}

fn market_cap_check(port: &dyn MarketDataPort, ticker: &str, minimum: f64) -> Option<SkipReason> {
    if minimum <= 0.0 {
        return None;
    }
    match port.market_cap(ticker) {
        None => Some(SkipReason::MarketCapUnknown),
        Some(cap) if cap < minimum => Some(SkipReason::MarketCapBelow { cap, minimum }),
        Some(_) => None,
    }
}

/// Fetch and filter every ticker. Fails only when nothing usable remains.
pub fn load_universe(
    port: &dyn MarketDataPort,
    tickers: &[String],
    request: &UniverseRequest,
) -> Result<Universe, TraderError> {
    let mut series = Vec::new();
    let mut skipped = Vec::new();

    for ticker in tickers {
        let reason = match market_cap_check(port, ticker, request.min_market_cap) {
            Some(reason) => Some(reason),
            None => match port.fetch_series(ticker, request.start_date, request.end_date, request.interval) {
                Err(e) => Some(SkipReason::FetchFailed(e.to_string())),
                Ok(s) if s.is_empty() => Some(SkipReason::NoData),
                Ok(s) if s.len() < request.min_bars => Some(SkipReason::InsufficientBars {
                    bars: s.len(),
                    minimum: request.min_bars,
                }),
                Ok(s) => {
                    series.push(s);
                    None
                }
            },
        };
        if let Some(reason) = reason {
            warn!(ticker = %ticker, reason = %reason, "skipping ticker");
            skipped.push(SkippedCode {
                ticker: ticker.clone(),
                reason,
            });
        }
    }

    if series.is_empty() {
        return Err(TraderError::UniverseExhausted);
    }

    info!(
        loaded = series.len(),
        skipped = skipped.len(),
        interval = %request.interval,
        "universe loaded"
    );
    Ok(Universe { series, skipped })
}

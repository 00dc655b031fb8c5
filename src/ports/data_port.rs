//! Market data port.

use crate::domain::error::TraderError;
use crate::domain::price_bar::{InstrumentSeries, Interval};
use chrono::NaiveDate;

pub trait MarketDataPort {
    /// Bars for `ticker` dated within `[start, end]` at the requested interval.
    ///
    /// A ticker with no data yields an empty series, not an error.
    fn fetch_series(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<InstrumentSeries, TraderError>;

    /// Market capitalisation, if known.
    fn market_cap(&self, ticker: &str) -> Option<f64>;

    fn list_tickers(&self) -> Result<Vec<String>, TraderError>;
}

//! Monthly universe screening.
//!
//! At each month boundary a gap-breakout rule is evaluated on every
//! instrument's history up to its first bar in that month. Instruments
//! signalling ENTER are ranked by that bar's volume (ties by ticker) and the
//! top N selected.

use crate::domain::price_bar::{InstrumentSeries, PriceBar};
use crate::domain::signal::{Signal, SignalRule};
use chrono::{Datelike, Months, NaiveDate};
use std::cmp::Ordering;
use std::fmt;

/// One calendar month, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn month_of(date: NaiveDate) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?;
        let end = start.checked_add_months(Months::new(1))?.pred_opt()?;
        Some(Period { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn next(&self) -> Option<Self> {
        Period::month_of(self.end.succ_opt()?)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start.format("%Y-%m"))
    }
}

/// Calendar months starting within `[start, end]` that have fully elapsed by `as_of`.
pub fn month_periods(start: NaiveDate, end: NaiveDate, as_of: NaiveDate) -> Vec<Period> {
    let mut periods = Vec::new();
    let Some(mut period) = Period::month_of(start) else {
        return periods;
    };
    if period.start < start {
        match period.next() {
            Some(next) => period = next,
            None => return periods,
        }
    }
    while period.start <= end && period.end <= as_of {
        periods.push(period);
        match period.next() {
            Some(next) => period = next,
            None => break,
        }
    }
    periods
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreeningCandidate {
    pub ticker: String,
    /// Volume of the boundary bar the signal fired on.
    pub volume: f64,
    pub close: f64,
}

/// Sort by volume descending, ticker ascending, and keep the first `top_n`.
pub fn rank_candidates(mut candidates: Vec<ScreeningCandidate>, top_n: usize) -> Vec<ScreeningCandidate> {
    candidates.sort_by(|a, b| {
        b.volume
            .partial_cmp(&a.volume)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    candidates.truncate(top_n);
    candidates
}

/// Index of the series' first bar inside `period`.
pub fn boundary_index(series: &InstrumentSeries, period: &Period) -> Option<usize> {
    let idx = series.count_through(period.start.pred_opt()?);
    series
        .bars()
        .get(idx)
        .filter(|bar| period.contains(bar.date))
        .map(|_| idx)
}

#[derive(Debug, Clone)]
pub struct Screener {
    rule: SignalRule,
    top_n: usize,
}

impl Screener {
    pub fn new(rule: SignalRule, top_n: usize) -> Self {
        Screener { rule, top_n }
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    pub fn rule(&self) -> &SignalRule {
        &self.rule
    }

    fn candidate(&self, series: &InstrumentSeries, period: &Period) -> Option<ScreeningCandidate> {
        let idx = boundary_index(series, period)?;
        let history: &[PriceBar] = &series.bars()[..=idx];
        if self.rule.evaluate(history) != Signal::Enter {
            return None;
        }
        let bar = &history[idx];
        Some(ScreeningCandidate {
            ticker: series.ticker().to_string(),
            volume: bar.volume,
            close: bar.close,
        })
    }

    /// Ranked selection for one period. Instruments without a bar in the
    /// period or without enough history simply do not qualify.
    pub fn screen<'a>(
        &self,
        universe: impl IntoIterator<Item = &'a InstrumentSeries>,
        period: &Period,
    ) -> Vec<ScreeningCandidate> {
        let candidates = universe
            .into_iter()
            .filter_map(|series| self.candidate(series, period))
            .collect();
        rank_candidates(candidates, self.top_n)
    }
}

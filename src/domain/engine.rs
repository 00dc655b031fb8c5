//! Execution engine: feeds bars to controllers and keeps the cash book.
//!
//! Two run modes share the same per-bar loop:
//! - stock-by-stock: each instrument runs alone against a fresh account
//! - month-by-month: one shared account; each month the screener picks
//!   which instruments may open positions, and open positions carry over
//!
//! All fills are at the bar's close with no commission or slippage.

use crate::domain::controller::{BarOutcome, TradeController};
use crate::domain::error::TraderError;
use crate::domain::position::TradeRecord;
use crate::domain::price_bar::{InstrumentSeries, PriceBar};
use crate::domain::screener::{Period, Screener, month_periods};
use crate::domain::sizer::PositionSizer;
use crate::domain::strategy::Strategy;
use crate::domain::trade_log::TradeLog;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    StockByStock,
    MonthByMonth,
}

impl RunMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stock_by_stock" => Some(RunMode::StockByStock),
            "month_by_month" => Some(RunMode::MonthByMonth),
            _ => None,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::StockByStock => write!(f, "stock_by_stock"),
            RunMode::MonthByMonth => write!(f, "month_by_month"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub max_cash_per_trade: f64,
}

impl BacktestConfig {
    fn in_range(&self, bar: &PriceBar) -> bool {
        self.start_date <= bar.date && bar.date <= self.end_date
    }
}

/// Cash book for one run. Buys debit, sells credit, both at fill price.
#[derive(Debug, Clone, PartialEq)]
pub struct CashAccount {
    cash: f64,
}

impl CashAccount {
    pub fn new(initial_capital: f64) -> Self {
        CashAccount {
            cash: initial_capital,
        }
    }

    pub fn available_cash(&self) -> f64 {
        self.cash
    }

    fn apply(&mut self, outcome: &BarOutcome) {
        match outcome {
            BarOutcome::Opened { shares, price } => self.cash -= *shares as f64 * price,
            BarOutcome::Closed(trade) => self.cash += trade.share_count as f64 * trade.exit_price,
            BarOutcome::Idle => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedInstrument {
    pub ticker: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutcome {
    pub log: TradeLog,
    pub skipped: Vec<SkippedInstrument>,
    /// Tickers still holding a position when the data ran out. These emit no trade.
    pub still_open: Vec<String>,
    pub cancelled: bool,
}

impl RunOutcome {
    fn skip(&mut self, error: &TraderError) {
        let ticker = match error {
            TraderError::DataUnavailable { ticker, .. }
            | TraderError::InsufficientData { ticker, .. }
            | TraderError::EngineFailure { ticker, .. } => ticker.clone(),
            _ => String::new(),
        };
        warn!(ticker = %ticker, error = %error, "instrument skipped");
        self.skipped.push(SkippedInstrument {
            ticker,
            reason: error.to_string(),
        });
    }
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
}

/// Reject series the controllers cannot trade on.
pub fn check_tradable(series: &InstrumentSeries, strategy: &Strategy) -> Result<(), TraderError> {
    if series.is_empty() {
        return Err(TraderError::DataUnavailable {
            ticker: series.ticker().to_string(),
            reason: "no bars".to_string(),
        });
    }
    if series.len() < strategy.min_bars() {
        return Err(TraderError::InsufficientData {
            ticker: series.ticker().to_string(),
            bars: series.len(),
            minimum: strategy.min_bars(),
        });
    }
    if let Some(bar) = series
        .bars()
        .iter()
        .find(|b| !b.close.is_finite() || !b.high.is_finite() || !b.low.is_finite())
    {
        return Err(TraderError::EngineFailure {
            ticker: series.ticker().to_string(),
            reason: format!("non-finite price on {}", bar.date),
        });
    }
    Ok(())
}

/// Completed trades for one instrument, plus whether a position was left open.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentRun {
    pub trades: Vec<TradeRecord>,
    pub open_at_end: bool,
}

/// Run one instrument against its own account.
pub fn run_instrument(
    series: &InstrumentSeries,
    strategy: &Strategy,
    config: &BacktestConfig,
) -> Result<InstrumentRun, TraderError> {
    check_tradable(series, strategy)?;

    let mut account = CashAccount::new(config.initial_capital);
    let mut controller = TradeController::new(
        series.ticker(),
        strategy.clone(),
        PositionSizer::new(config.max_cash_per_trade),
    );
    let mut trades = Vec::new();
    let bars = series.bars();

    for (i, bar) in bars.iter().enumerate() {
        if !config.in_range(bar) {
            continue;
        }
        let outcome = controller.on_bar(&bars[..=i], account.available_cash());
        account.apply(&outcome);
        if let BarOutcome::Closed(trade) = outcome {
            trades.push(trade);
        }
    }

    debug!(
        ticker = series.ticker(),
        trades = trades.len(),
        cash = account.available_cash(),
        "instrument finished"
    );
    Ok(InstrumentRun {
        trades,
        open_at_end: controller.is_open(),
    })
}

/// Each instrument in turn, each with `initial_capital` of its own.
pub fn run_stock_by_stock(
    universe: &[InstrumentSeries],
    strategy: &Strategy,
    config: &BacktestConfig,
    cancel: Option<&AtomicBool>,
) -> RunOutcome {
    let mut outcome = RunOutcome::default();

    for series in universe {
        if is_cancelled(cancel) {
            info!("run cancelled");
            outcome.cancelled = true;
            break;
        }
        match run_instrument(series, strategy, config) {
            Ok(run) => {
                if run.open_at_end {
                    outcome.still_open.push(series.ticker().to_string());
                }
                outcome.log.extend(run.trades);
            }
            Err(e) => outcome.skip(&e),
        }
    }
    outcome
}

/// Screen monthly and trade the selection against one shared account.
///
/// Within a month bars are delivered by date, then by ticker. An instrument
/// receives bars while it is selected for the month or holds a position.
pub fn run_month_by_month(
    universe: &[InstrumentSeries],
    strategy: &Strategy,
    screener: &Screener,
    config: &BacktestConfig,
    as_of: NaiveDate,
    cancel: Option<&AtomicBool>,
) -> RunOutcome {
    let mut outcome = RunOutcome::default();

    let mut tradable: Vec<&InstrumentSeries> = Vec::new();
    for series in universe {
        match check_tradable(series, strategy) {
            Ok(()) => tradable.push(series),
            Err(e) => outcome.skip(&e),
        }
    }
    tradable.sort_by(|a, b| a.ticker().cmp(b.ticker()));
    let by_ticker: HashMap<&str, usize> = tradable
        .iter()
        .enumerate()
        .map(|(i, s)| (s.ticker(), i))
        .collect();

    let sizer = PositionSizer::new(config.max_cash_per_trade);
    let mut controllers: Vec<TradeController> = tradable
        .iter()
        .map(|s| TradeController::new(s.ticker(), strategy.clone(), sizer))
        .collect();
    let mut account = CashAccount::new(config.initial_capital);

    for period in month_periods(config.start_date, config.end_date, as_of) {
        if is_cancelled(cancel) {
            info!("run cancelled");
            outcome.cancelled = true;
            break;
        }

        let selected: Vec<usize> = screener
            .screen(tradable.iter().copied(), &period)
            .iter()
            .filter_map(|c| by_ticker.get(c.ticker.as_str()).copied())
            .collect();
        info!(
            period = %period,
            selected = ?selected.iter().map(|&i| tradable[i].ticker()).collect::<Vec<_>>(),
            cash = account.available_cash(),
            "period screened"
        );

        let active: Vec<usize> = (0..tradable.len())
            .filter(|i| selected.contains(i) || controllers[*i].is_open())
            .collect();
        trade_period(
            &period,
            config,
            &active,
            &selected,
            &tradable,
            &mut controllers,
            &mut account,
            &mut outcome.log,
        );
    }

    outcome.still_open = controllers
        .iter()
        .filter(|c| c.is_open())
        .map(|c| c.ticker().to_string())
        .collect();
    outcome
}

#[allow(clippy::too_many_arguments)]
fn trade_period(
    period: &Period,
    config: &BacktestConfig,
    active: &[usize],
    selected: &[usize],
    tradable: &[&InstrumentSeries],
    controllers: &mut [TradeController],
    account: &mut CashAccount,
    log: &mut TradeLog,
) {
    let dates: BTreeSet<NaiveDate> = active
        .iter()
        .flat_map(|&i| tradable[i].bars().iter())
        .filter(|b| period.contains(b.date) && config.in_range(b))
        .map(|b| b.date)
        .collect();

    for date in dates {
        // `active` is in ticker order.
        for &i in active {
            // A carried-over instrument that closed this month stops receiving bars.
            if !selected.contains(&i) && !controllers[i].is_open() {
                continue;
            }
            let Some(idx) = tradable[i].index_of(date) else {
                continue;
            };
            let window = &tradable[i].bars()[..=idx];
            let outcome = controllers[i].on_bar(window, account.available_cash());
            account.apply(&outcome);
            if let BarOutcome::Closed(trade) = outcome {
                log.record(trade);
            }
        }
    }
}

//! Per-instrument trade controller.
//!
//! Owns one instrument's [`PositionState`]. Each bar is seen at most once and
//! produces at most one transition: FLAT → OPEN on an entry signal that sizes
//! to at least one share, OPEN → FLAT on target, stop, or exit signal (checked
//! in that order). Fills happen at the bar's close.

use crate::domain::position::{ExitReason, OpenPosition, PositionState, TradeRecord};
use crate::domain::price_bar::PriceBar;
use crate::domain::signal::Signal;
use crate::domain::sizer::PositionSizer;
use crate::domain::strategy::Strategy;
use chrono::NaiveDate;
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq)]
pub enum BarOutcome {
    Idle,
    Opened { shares: u64, price: f64 },
    Closed(TradeRecord),
}

#[derive(Debug, Clone)]
pub struct TradeController {
    ticker: String,
    strategy: Strategy,
    sizer: PositionSizer,
    state: PositionState,
    last_date: Option<NaiveDate>,
}

impl TradeController {
    pub fn new(ticker: impl Into<String>, strategy: Strategy, sizer: PositionSizer) -> Self {
        TradeController {
            ticker: ticker.into(),
            strategy,
            sizer,
            state: PositionState::Flat,
            last_date: None,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Process the last bar of `window`; earlier bars are history only.
    ///
    /// A bar dated on or before one already processed is ignored.
    pub fn on_bar(&mut self, window: &[PriceBar], available_cash: f64) -> BarOutcome {
        let Some(bar) = window.last() else {
            return BarOutcome::Idle;
        };
        if self.last_date.is_some_and(|last| bar.date <= last) {
            return BarOutcome::Idle;
        }
        self.last_date = Some(bar.date);

        let outcome = if self.state.is_open() {
            self.check_exit(window, bar)
        } else {
            self.try_enter(window, bar, available_cash)
        };

        match &outcome {
            BarOutcome::Closed(trade) => {
                debug!(
                    ticker = %self.ticker,
                    date = %trade.exit_date,
                    price = trade.exit_price,
                    profit = trade.profit,
                    reason = %trade.exit_reason,
                    "position closed"
                );
                self.state = PositionState::Flat;
            }
            BarOutcome::Opened { shares, price } => {
                debug!(
                    ticker = %self.ticker,
                    date = %bar.date,
                    price,
                    shares,
                    "position opened"
                );
            }
            BarOutcome::Idle => {}
        }
        outcome
    }

    fn try_enter(&mut self, window: &[PriceBar], bar: &PriceBar, available_cash: f64) -> BarOutcome {
        if self.strategy.rule.evaluate(window) != Signal::Enter {
            return BarOutcome::Idle;
        }
        let shares = self.sizer.size(available_cash, bar.close);
        if shares == 0 {
            trace!(ticker = %self.ticker, date = %bar.date, available_cash, "entry skipped, sized to zero");
            return BarOutcome::Idle;
        }
        let (stop_price, target_price) = self.strategy.risk.levels(&self.strategy.rule, window, bar.close);
        self.state = PositionState::Open(OpenPosition {
            entry_date: bar.date,
            entry_price: bar.close,
            share_count: shares,
            stop_price,
            target_price,
        });
        BarOutcome::Opened {
            shares,
            price: bar.close,
        }
    }

    fn check_exit(&self, window: &[PriceBar], bar: &PriceBar) -> BarOutcome {
        let PositionState::Open(position) = &self.state else {
            return BarOutcome::Idle;
        };
        let reason = if position.should_take_profit(bar.close) {
            ExitReason::Target
        } else if position.should_stop(bar.close) {
            ExitReason::Stop
        } else if self.strategy.rule.exits(window) {
            ExitReason::Signal
        } else {
            return BarOutcome::Idle;
        };
        BarOutcome::Closed(TradeRecord::close(&self.ticker, position, bar.date, bar.close, reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::closes;
    use crate::domain::strategy::{StrategyKind, StrategyParams};
    use approx::assert_relative_eq;

    fn crossover(fast: usize, slow: usize) -> Strategy {
        let mut params = StrategyParams::defaults_for(StrategyKind::Crossover);
        params.fast_period = fast;
        params.slow_period = slow;
        Strategy::new(StrategyKind::Crossover, &params)
    }

    fn gap_breakout() -> Strategy {
        let mut params = StrategyParams::defaults_for(StrategyKind::GapBreakout);
        params.ema_period = 3;
        Strategy::new(StrategyKind::GapBreakout, &params)
    }

    fn drive(controller: &mut TradeController, bars: &[PriceBar], cash: f64) -> Vec<BarOutcome> {
        (1..=bars.len())
            .map(|n| controller.on_bar(&bars[..n], cash))
            .collect()
    }

    #[test]
    fn crossover_round_trip() {
        let bars = closes(&[10.0, 11.0, 12.0, 13.0, 20.0, 8.0, 7.0, 6.0, 5.0, 4.0]);
        let mut controller = TradeController::new("XYZ", crossover(2, 4), PositionSizer::new(30_000.0));
        let outcomes = drive(&mut controller, &bars, 100_000.0);

        assert_eq!(outcomes[3], BarOutcome::Opened { shares: 2307, price: 13.0 });
        let trades: Vec<&TradeRecord> = outcomes
            .iter()
            .filter_map(|o| match o {
                BarOutcome::Closed(t) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(trades.len(), 1);
        let trade = trades[0];
        assert_eq!(trade.entry_date, bars[3].date);
        assert_eq!(trade.exit_date, bars[6].date);
        assert_eq!(trade.exit_reason, ExitReason::Signal);
        assert_relative_eq!(trade.profit, 2307.0 * (7.0 - 13.0));
        assert!(!controller.is_open());
    }

    #[test]
    fn rsi_position_exits_on_bar_that_also_reads_as_entry() {
        let mut params = StrategyParams::defaults_for(StrategyKind::RsiMa);
        params.fast_period = 2;
        params.slow_period = 4;
        params.rsi_period = 3;
        let strategy = Strategy::new(StrategyKind::RsiMa, &params);
        let bars = closes(&[1.0, 10.0, 10.0, 5.0, 14.0, 13.0]);
        let mut controller = TradeController::new("XYZ", strategy, PositionSizer::new(30_000.0));
        let outcomes = drive(&mut controller, &bars, 100_000.0);

        assert_eq!(outcomes[3], BarOutcome::Opened { shares: 6000, price: 5.0 });
        assert_eq!(outcomes[4], BarOutcome::Idle);
        let BarOutcome::Closed(trade) = &outcomes[5] else {
            panic!("expected a close, got {:?}", outcomes[5]);
        };
        assert_eq!(trade.exit_reason, ExitReason::Signal);
        assert_relative_eq!(trade.exit_price, 13.0);
    }

    #[test]
    fn zero_size_entry_stays_flat() {
        let bars = closes(&[10.0, 11.0, 12.0, 13.0]);
        let mut controller = TradeController::new("XYZ", crossover(2, 4), PositionSizer::new(30_000.0));
        let outcomes = drive(&mut controller, &bars, 5.0);
        assert!(outcomes.iter().all(|o| *o == BarOutcome::Idle));
        assert_eq!(controller.state(), &PositionState::Flat);
    }

    #[test]
    fn exit_signal_while_flat_is_ignored() {
        let bars = closes(&[20.0, 18.0, 16.0, 14.0, 12.0]);
        let mut controller = TradeController::new("XYZ", crossover(2, 4), PositionSizer::default());
        let outcomes = drive(&mut controller, &bars, 100_000.0);
        assert!(outcomes.iter().all(|o| *o == BarOutcome::Idle));
    }

    fn bar(day: i64, high: f64, low: f64, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(day),
            open: close,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    fn gap_setup() -> Vec<PriceBar> {
        vec![
            bar(0, 21.0, 19.0, 20.0),
            bar(1, 21.0, 19.0, 20.0),
            bar(2, 21.0, 19.0, 20.0),
            bar(3, 15.0, 13.0, 14.0),
            bar(4, 17.0, 14.0, 16.0), // enter at 16: stop 12, target 48
        ]
    }

    #[test]
    fn target_exit() {
        let mut bars = gap_setup();
        bars.push(bar(5, 31.0, 29.0, 30.0));
        bars.push(bar(6, 49.0, 47.0, 48.0));
        let mut controller = TradeController::new("GAP", gap_breakout(), PositionSizer::default());
        let outcomes = drive(&mut controller, &bars, 100_000.0);

        assert!(matches!(outcomes[4], BarOutcome::Opened { shares: 1875, .. }));
        assert_eq!(outcomes[5], BarOutcome::Idle);
        match &outcomes[6] {
            BarOutcome::Closed(trade) => {
                assert_eq!(trade.exit_reason, ExitReason::Target);
                assert_relative_eq!(trade.exit_price, 48.0);
            }
            other => panic!("expected close, got {:?}", other),
        }
    }

    #[test]
    fn stop_exit() {
        let mut bars = gap_setup();
        bars.push(bar(5, 13.0, 11.0, 12.0));
        let mut controller = TradeController::new("GAP", gap_breakout(), PositionSizer::default());
        let outcomes = drive(&mut controller, &bars, 100_000.0);
        match &outcomes[5] {
            BarOutcome::Closed(trade) => {
                assert_eq!(trade.exit_reason, ExitReason::Stop);
                assert!(trade.profit < 0.0);
            }
            other => panic!("expected close, got {:?}", other),
        }
    }

    #[test]
    fn open_position_holds_without_exit() {
        let mut bars = gap_setup();
        bars.push(bar(5, 21.0, 19.0, 20.0));
        let mut controller = TradeController::new("GAP", gap_breakout(), PositionSizer::default());
        drive(&mut controller, &bars, 100_000.0);
        assert!(controller.is_open());
    }

    #[test]
    fn replayed_bar_is_ignored() {
        let bars = closes(&[10.0, 11.0, 12.0, 13.0]);
        let mut controller = TradeController::new("XYZ", crossover(2, 4), PositionSizer::default());
        drive(&mut controller, &bars, 100_000.0);
        assert!(controller.is_open());
        assert_eq!(controller.on_bar(&bars, 100_000.0), BarOutcome::Idle);
        assert_eq!(controller.on_bar(&bars[..2], 100_000.0), BarOutcome::Idle);
    }

    #[test]
    fn empty_window_is_idle() {
        let mut controller = TradeController::new("XYZ", crossover(2, 4), PositionSizer::default());
        assert_eq!(controller.on_bar(&[], 100_000.0), BarOutcome::Idle);
    }
}

//! Integration tests across ports, engine and aggregation.
//!
//! Tests cover:
//! - Stock-by-stock pipeline through a mock market data port
//! - Partial universes (failed, empty and short series skipped)
//! - Month-by-month runs with the market-cap filter
//! - Order independence of the summary statistics
//! - Cancellation mid-run
//! - Report persistence through ReportPort
//! - Controller never holding two positions at once

mod common;

use approx::assert_relative_eq;
use common::*;
use proptest::prelude::*;
use std::cell::RefCell;
use std::sync::atomic::AtomicBool;
use swingtrader::adapters::csv_report_adapter::{CsvReportAdapter, INSTRUMENTS_FILE, SUMMARY_FILE, TRADES_FILE};
use swingtrader::domain::controller::{BarOutcome, TradeController};
use swingtrader::domain::engine::{run_month_by_month, run_stock_by_stock};
use swingtrader::domain::error::TraderError;
use swingtrader::domain::metrics::{InstrumentSummary, SummaryStatistics};
use swingtrader::domain::position::{ExitReason, TradeRecord};
use swingtrader::domain::price_bar::{Interval, PriceBar};
use swingtrader::domain::screener::Screener;
use swingtrader::domain::sizer::PositionSizer;
use swingtrader::domain::strategy::{Strategy, StrategyKind, StrategyParams};
use swingtrader::domain::sweep::SweepRow;
use swingtrader::domain::universe::{SkipReason, UniverseRequest, load_universe};
use swingtrader::ports::report_port::ReportPort;

fn request(interval: Interval, min_market_cap: f64, min_bars: usize) -> UniverseRequest {
    UniverseRequest {
        start_date: date(2024, 1, 1),
        end_date: date(2024, 12, 31),
        interval,
        min_market_cap,
        min_bars,
    }
}

fn tickers(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

mod stock_by_stock_pipeline {
    use super::*;

    #[test]
    fn crossover_scenario_through_port() {
        let port = MockMarketDataPort::new().with_bars("XYZ", daily_bars(date(2024, 1, 1), &CROSSOVER_CLOSES));
        let strategy = crossover_strategy(2, 4);

        let universe = load_universe(&port, &tickers(&["XYZ"]), &request(Interval::Daily, 0.0, strategy.min_bars()))
            .unwrap();
        let outcome = run_stock_by_stock(&universe.series, &strategy, &sample_config(), None);

        assert_eq!(outcome.log.len(), 1);
        let trade = &outcome.log.trades()[0];
        assert_eq!(trade.entry_date, date(2024, 1, 4));
        assert_eq!(trade.exit_date, date(2024, 1, 7));
        assert_relative_eq!(trade.entry_price, 13.0);
        assert_relative_eq!(trade.exit_price, 7.0);
        assert_eq!(trade.share_count, 2307);
        assert_eq!(trade.exit_reason, ExitReason::Signal);
        assert_relative_eq!(trade.profit, 2307.0 * -6.0);
        assert_relative_eq!(trade.profit_percent, -6.0 / 13.0 * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn partial_universe_skips_and_continues() {
        let port = MockMarketDataPort::new()
            .with_bars("GOOD", daily_bars(date(2024, 1, 1), &CROSSOVER_CLOSES))
            .with_bars("SHORT", daily_bars(date(2024, 1, 1), &[1.0, 2.0]))
            .with_bars("EMPTY", Vec::new())
            .with_error("DOWN", "provider timeout");
        let strategy = crossover_strategy(2, 4);

        let universe = load_universe(
            &port,
            &tickers(&["DOWN", "EMPTY", "GOOD", "SHORT"]),
            &request(Interval::Daily, 0.0, strategy.min_bars()),
        )
        .unwrap();

        assert_eq!(universe.tickers(), vec!["GOOD"]);
        assert_eq!(universe.skipped.len(), 3);
        assert!(matches!(universe.skipped[0].reason, SkipReason::FetchFailed(_)));
        assert_eq!(universe.skipped[1].reason, SkipReason::NoData);
        assert_eq!(
            universe.skipped[2].reason,
            SkipReason::InsufficientBars { bars: 2, minimum: 4 }
        );

        let outcome = run_stock_by_stock(&universe.series, &strategy, &sample_config(), None);
        assert_eq!(outcome.log.len(), 1);
    }

    #[test]
    fn no_usable_data_is_exhausted() {
        let port = MockMarketDataPort::new()
            .with_bars("EMPTY", Vec::new())
            .with_error("DOWN", "provider timeout");
        let err = load_universe(&port, &tickers(&["EMPTY", "DOWN"]), &request(Interval::Daily, 0.0, 1)).unwrap_err();
        assert!(matches!(err, TraderError::UniverseExhausted));
    }

    #[test]
    fn summary_independent_of_instrument_order() {
        let mut universe = vec![
            daily_series("AAA", &CROSSOVER_CLOSES),
            daily_series("BBB", &[5.0, 4.0, 3.0, 4.0, 6.0, 9.0, 12.0, 10.0, 7.0, 5.0, 4.0]),
            daily_series("CCC", &[8.0, 8.0, 7.0, 9.0, 12.0, 15.0, 11.0, 9.0, 16.0, 20.0, 14.0, 10.0]),
        ];
        let strategy = crossover_strategy(2, 4);

        let forward = run_stock_by_stock(&universe, &strategy, &sample_config(), None);
        universe.reverse();
        let reversed = run_stock_by_stock(&universe, &strategy, &sample_config(), None);

        assert!(!forward.log.is_empty());
        assert_eq!(
            SummaryStatistics::compute(forward.log.trades()),
            SummaryStatistics::compute(reversed.log.trades())
        );
    }

    #[test]
    fn cancelled_run_is_still_aggregable() {
        let universe = vec![daily_series("AAA", &CROSSOVER_CLOSES)];
        let cancel = AtomicBool::new(true);

        let outcome = run_stock_by_stock(&universe, &crossover_strategy(2, 4), &sample_config(), Some(&cancel));

        assert!(outcome.cancelled);
        let summary = SummaryStatistics::compute(outcome.log.trades());
        assert_eq!(summary.total_trades, 0);
        assert_relative_eq!(summary.win_rate_per_trade, 0.0);
    }
}

mod month_by_month_pipeline {
    use super::*;

    fn monthly_bar(month: u32, high: f64, close: f64, volume: f64) -> PriceBar {
        PriceBar {
            date: date(2024, month, 1),
            open: close,
            high,
            low: close - 1.0,
            close,
            volume,
        }
    }

    /// Flat, a dip in April, a gap above April's high in May, target in July.
    fn breakout_bars(volume: f64) -> Vec<PriceBar> {
        vec![
            monthly_bar(1, 21.0, 20.0, 100.0),
            monthly_bar(2, 21.0, 20.0, 100.0),
            monthly_bar(3, 21.0, 20.0, 100.0),
            monthly_bar(4, 15.0, 14.0, 100.0),
            monthly_bar(5, 17.0, 16.0, volume),
            monthly_bar(6, 31.0, 30.0, 100.0),
            monthly_bar(7, 49.0, 48.0, 100.0),
        ]
    }

    fn gap_strategy() -> Strategy {
        let mut params = StrategyParams::defaults_for(StrategyKind::GapBreakout);
        params.ema_period = 3;
        Strategy::new(StrategyKind::GapBreakout, &params)
    }

    #[test]
    fn market_cap_filter_then_monthly_run() {
        let port = MockMarketDataPort::new()
            .with_bars("AAA", breakout_bars(900.0))
            .with_bars("BBB", breakout_bars(500.0))
            .with_bars("CCC", breakout_bars(700.0))
            .with_cap("AAA", 5e9)
            .with_cap("BBB", 1e9);
        let strategy = gap_strategy();

        let universe = load_universe(
            &port,
            &tickers(&["AAA", "BBB", "CCC"]),
            &request(Interval::Monthly, 2e9, strategy.min_bars()),
        )
        .unwrap();
        assert_eq!(universe.tickers(), vec!["AAA"]);

        let screener = Screener::new(strategy.rule.clone(), 5);
        let mut config = sample_config();
        config.initial_capital = 40_000.0;
        let outcome = run_month_by_month(&universe.series, &strategy, &screener, &config, date(2025, 1, 1), None);

        assert_eq!(outcome.log.len(), 1);
        let trade = &outcome.log.trades()[0];
        assert_eq!(trade.ticker, "AAA");
        assert_eq!(trade.entry_date, date(2024, 5, 1));
        assert_eq!(trade.exit_date, date(2024, 7, 1));
        assert_eq!(trade.share_count, 1875);
        assert_eq!(trade.exit_reason, ExitReason::Target);
        assert_relative_eq!(trade.profit, 1875.0 * 32.0);
        assert!(outcome.still_open.is_empty());
    }

    #[test]
    fn top_n_limits_entries() {
        let port = MockMarketDataPort::new()
            .with_bars("AAA", breakout_bars(900.0))
            .with_bars("BBB", breakout_bars(500.0));
        let strategy = gap_strategy();
        let universe = load_universe(
            &port,
            &tickers(&["AAA", "BBB"]),
            &request(Interval::Monthly, 0.0, strategy.min_bars()),
        )
        .unwrap();

        let screener = Screener::new(strategy.rule.clone(), 1);
        let outcome = run_month_by_month(
            &universe.series,
            &strategy,
            &screener,
            &sample_config(),
            date(2025, 1, 1),
            None,
        );

        let traded: Vec<&str> = outcome.log.trades().iter().map(|t| t.ticker.as_str()).collect();
        assert_eq!(traded, vec!["AAA"]);
    }
}

mod report_persistence {
    use super::*;

    #[derive(Default)]
    struct RecordingReport {
        calls: RefCell<Vec<&'static str>>,
    }

    impl ReportPort for RecordingReport {
        fn write_trades(&self, _trades: &[TradeRecord]) -> Result<(), TraderError> {
            self.calls.borrow_mut().push("trades");
            Ok(())
        }

        fn write_summary(&self, _summary: &SummaryStatistics) -> Result<(), TraderError> {
            self.calls.borrow_mut().push("summary");
            Ok(())
        }

        fn write_instruments(&self, _instruments: &[InstrumentSummary]) -> Result<(), TraderError> {
            self.calls.borrow_mut().push("instruments");
            Ok(())
        }

        fn write_sweep(&self, _rows: &[SweepRow]) -> Result<(), TraderError> {
            self.calls.borrow_mut().push("sweep");
            Ok(())
        }
    }

    #[test]
    fn write_run_persists_all_run_reports() {
        let outcome = run_stock_by_stock(
            &[daily_series("AAA", &CROSSOVER_CLOSES)],
            &crossover_strategy(2, 4),
            &sample_config(),
            None,
        );
        let report = RecordingReport::default();

        let summary = report.write_run(outcome.log.trades()).unwrap();

        assert_eq!(*report.calls.borrow(), vec!["trades", "summary", "instruments"]);
        assert_eq!(summary.total_trades, 1);
        assert_relative_eq!(summary.win_rate_per_trade, 0.0);
    }

    #[test]
    fn csv_reports_on_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let outcome = run_stock_by_stock(
            &[daily_series("AAA", &CROSSOVER_CLOSES), daily_series("BBB", &CROSSOVER_CLOSES)],
            &crossover_strategy(2, 4),
            &sample_config(),
            None,
        );

        let summary = CsvReportAdapter::new(dir.path())
            .write_run(outcome.log.trades())
            .unwrap();

        assert_eq!(summary.total_instruments, 2);
        let trades = std::fs::read_to_string(dir.path().join(TRADES_FILE)).unwrap();
        assert_eq!(trades.lines().count(), 3);
        assert!(trades.lines().nth(1).unwrap().starts_with("AAA,2024-01-04,13.0,2024-01-07,7.0,"));
        let summary_csv = std::fs::read_to_string(dir.path().join(SUMMARY_FILE)).unwrap();
        assert!(summary_csv.lines().nth(1).unwrap().starts_with("2,2,"));
        assert!(dir.path().join(INSTRUMENTS_FILE).exists());
    }
}

proptest! {
    #[test]
    fn controller_never_holds_two_positions(
        closes in prop::collection::vec(1.0f64..100.0, 1..80),
        fast in 1usize..4,
        extra in 1usize..4,
    ) {
        let strategy = crossover_strategy(fast, fast + extra);
        let bars = daily_bars(date(2024, 1, 1), &closes);
        let mut controller = TradeController::new("XYZ", strategy, PositionSizer::new(30_000.0));
        let mut open = 0i32;

        for i in 0..bars.len() {
            match controller.on_bar(&bars[..=i], 100_000.0) {
                BarOutcome::Opened { .. } => {
                    prop_assert_eq!(open, 0);
                    open += 1;
                }
                BarOutcome::Closed(trade) => {
                    prop_assert_eq!(open, 1);
                    prop_assert!(trade.exit_date > trade.entry_date);
                    open -= 1;
                }
                BarOutcome::Idle => {}
            }
            prop_assert_eq!(controller.is_open(), open == 1);
        }
    }
}

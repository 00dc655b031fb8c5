//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::csv_adapter::{CsvMarketData, load_universe_file};
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{
    period_list, required_date, required_kind, validate_backtest_config, validate_screener_config,
    validate_strategy_config, validate_sweep_config,
};
use crate::domain::engine::{BacktestConfig, RunMode, RunOutcome, run_month_by_month, run_stock_by_stock};
use crate::domain::error::TraderError;
use crate::domain::metrics::SummaryStatistics;
use crate::domain::price_bar::Interval;
use crate::domain::screener::{Period, Screener};
use crate::domain::signal::SignalRule;
use crate::domain::strategy::{Strategy, StrategyKind, StrategyParams};
use crate::domain::sweep::{ParamGrid, SweepRow, run_sweep};
use crate::domain::universe::{Universe, UniverseRequest, load_universe, parse_codes};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "swingtrader", about = "Swing-trade lifecycle backtester")]
pub struct Cli {
    /// Emit log lines as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest over the configured universe
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// stock_by_stock or month_by_month, overriding [backtest] mode
        #[arg(long)]
        mode: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the ranked screener selection for one month
    Screen {
        #[arg(short, long)]
        config: PathBuf,
        /// Month to screen, as YYYY-MM
        #[arg(long)]
        month: String,
    },
    /// Run the SMA crossover parameter sweep
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            output,
            mode,
            dry_run,
        } => run_backtest(&config, output.as_deref(), mode.as_deref(), dry_run),
        Command::Screen { config, month } => run_screen(&config, &month),
        Command::Sweep { config, output } => run_sweep_command(&config, output.as_deref()),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, TraderError> {
    info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, TraderError> {
    Ok(BacktestConfig {
        start_date: required_date(config, "backtest", "start_date")?,
        end_date: required_date(config, "backtest", "end_date")?,
        initial_capital: config.get_double("backtest", "initial_capital", 100_000.0),
        max_cash_per_trade: config.get_double("backtest", "max_cash_per_trade", 30_000.0),
    })
}

/// Parameters for `kind`, each falling back to that kind's default.
pub fn build_strategy_params(config: &dyn ConfigPort, kind: StrategyKind) -> StrategyParams {
    let d = StrategyParams::defaults_for(kind);
    let period = |key: &str, default: usize| config.get_int("strategy", key, default as i64).max(1) as usize;
    StrategyParams {
        consolidation_bars: period("consolidation_bars", d.consolidation_bars),
        target_pct: config.get_double("strategy", "target_pct", d.target_pct),
        fast_period: period("fast_period", d.fast_period),
        slow_period: period("slow_period", d.slow_period),
        rsi_period: period("rsi_period", d.rsi_period),
        rsi_threshold: config.get_double("strategy", "rsi_threshold", d.rsi_threshold),
        atr_period: period("atr_period", d.atr_period),
        multiplier: config.get_double("strategy", "multiplier", d.multiplier),
        ema_period: period("ema_period", d.ema_period),
        stop_fraction: config.get_double("strategy", "stop_fraction", d.stop_fraction),
        target_multiple: config.get_double("strategy", "target_multiple", d.target_multiple),
    }
}

pub fn build_strategy(config: &dyn ConfigPort) -> Result<Strategy, TraderError> {
    let kind = required_kind(config)?;
    Ok(Strategy::new(kind, &build_strategy_params(config, kind)))
}

/// Gap-breakout screener, whatever the trading strategy.
///
/// `[screener] ema_period` falls back to `[strategy] ema_period`, then to the
/// gap-breakout default.
pub fn build_screener(config: &dyn ConfigPort) -> Screener {
    let top_n = config.get_int("screener", "top_n", 5).max(1) as usize;
    let default_ema = config.get_int(
        "strategy",
        "ema_period",
        StrategyParams::defaults_for(StrategyKind::GapBreakout).ema_period as i64,
    );
    let ema_period = config.get_int("screener", "ema_period", default_ema).max(1) as usize;
    Screener::new(SignalRule::GapBreakout { ema_period }, top_n)
}

pub fn build_grid(config: &dyn ConfigPort) -> Result<ParamGrid, TraderError> {
    let defaults = ParamGrid::default();
    let grid = ParamGrid {
        fast_periods: period_list(config, "sweep", "fast_periods")?.unwrap_or(defaults.fast_periods),
        slow_periods: period_list(config, "sweep", "slow_periods")?.unwrap_or(defaults.slow_periods),
    };
    if grid.combinations().is_empty() {
        return Err(TraderError::invalid(
            "sweep",
            "fast_periods",
            "no fast period is below any slow period",
        ));
    }
    Ok(grid)
}

pub fn resolve_mode(config: &dyn ConfigPort, mode_override: Option<&str>) -> Result<RunMode, TraderError> {
    let raw = mode_override
        .map(str::to_string)
        .or_else(|| config.get_string("backtest", "mode"))
        .unwrap_or_else(|| RunMode::StockByStock.to_string());
    RunMode::parse(&raw).ok_or_else(|| {
        TraderError::invalid(
            "backtest",
            "mode",
            format!("unknown mode '{}', expected stock_by_stock or month_by_month", raw),
        )
    })
}

/// Tickers from `universe_file` when set, otherwise from `codes`.
///
/// `codes = all` takes every ticker with a price file in `data_dir`.
pub fn resolve_tickers(config: &dyn ConfigPort) -> Result<Vec<String>, TraderError> {
    if let Some(file) = config
        .get_string("backtest", "universe_file")
        .filter(|s| !s.trim().is_empty())
    {
        return load_universe_file(file.trim());
    }
    let codes = config
        .get_string("backtest", "codes")
        .ok_or_else(|| TraderError::ConfigMissing {
            section: "backtest".to_string(),
            key: "codes".to_string(),
        })?;
    if codes.trim().eq_ignore_ascii_case("all") {
        return market_data(config)?.list_tickers();
    }
    parse_codes(&codes).map_err(|e| TraderError::invalid("backtest", "codes", e.to_string()))
}

pub fn build_universe_request(config: &dyn ConfigPort, min_bars: usize) -> Result<UniverseRequest, TraderError> {
    let interval = match config.get_string("backtest", "interval") {
        None => Interval::Monthly,
        Some(raw) => Interval::parse(&raw).ok_or_else(|| {
            TraderError::invalid("backtest", "interval", format!("unknown interval '{}'", raw))
        })?,
    };
    Ok(UniverseRequest {
        start_date: required_date(config, "backtest", "start_date")?,
        end_date: required_date(config, "backtest", "end_date")?,
        interval,
        min_market_cap: config.get_double("backtest", "min_market_cap", 0.0),
        min_bars,
    })
}

fn screening_as_of(config: &dyn ConfigPort) -> Result<NaiveDate, TraderError> {
    match config.get_string("screener", "as_of") {
        Some(_) => required_date(config, "screener", "as_of"),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn output_dir(config: &dyn ConfigPort, output_override: Option<&Path>) -> PathBuf {
    output_override
        .map(Path::to_path_buf)
        .or_else(|| config.get_string("backtest", "output_dir").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn market_data(config: &dyn ConfigPort) -> Result<CsvMarketData, TraderError> {
    let data_dir = config
        .get_string("backtest", "data_dir")
        .unwrap_or_else(|| "data".to_string());
    CsvMarketData::new(data_dir)
}

fn open_universe(config: &dyn ConfigPort, min_bars: usize) -> Result<Universe, TraderError> {
    let data = market_data(config)?;
    let tickers = resolve_tickers(config)?;
    let request = build_universe_request(config, min_bars)?;
    info!(tickers = tickers.len(), interval = %request.interval, "loading universe");
    let universe = load_universe(&data, &tickers, &request)?;
    info!(loaded = ?universe.tickers(), skipped = universe.skipped.len(), "universe ready");
    Ok(universe)
}

pub fn print_summary(summary: &SummaryStatistics) {
    println!("=== Summary ===");
    println!("Total Trades:                   {}", summary.total_trades);
    println!("Total Stocks:                   {}", summary.total_instruments);
    println!("Total Profit:                   {:.2}", summary.total_profit);
    println!("Average Profit per Trade:       {:.2}", summary.mean_profit_per_trade);
    println!("Median Profit per Trade:        {:.2}", summary.median_profit_per_trade);
    println!("Success Probability per Trade:  {:.1}%", summary.win_rate_per_trade * 100.0);
    println!("Average Profit per Stock:       {:.2}", summary.mean_profit_per_instrument);
    println!("Median Profit per Stock:        {:.2}", summary.median_profit_per_instrument);
    println!("Success Probability per Stock:  {:.1}%", summary.win_rate_per_instrument * 100.0);
}

fn report_outcome(outcome: &RunOutcome, output: &Path) -> Result<(), TraderError> {
    for skipped in &outcome.skipped {
        warn!(ticker = %skipped.ticker, reason = %skipped.reason, "not traded");
    }
    if !outcome.still_open.is_empty() {
        info!(tickers = ?outcome.still_open, "positions still open at end of run");
    }
    if outcome.cancelled {
        warn!(trades = outcome.log.len(), "run cancelled, reporting partial log");
    }

    if outcome.log.is_empty() {
        print_summary(&SummaryStatistics::default());
        println!("No trades to report.");
        return Ok(());
    }

    let report = CsvReportAdapter::new(output);
    let summary = report.write_run(outcome.log.trades())?;
    print_summary(&summary);
    println!("\nReports written to: {}", report.output_dir().display());
    Ok(())
}

pub fn run_backtest(
    config_path: &Path,
    output: Option<&Path>,
    mode_override: Option<&str>,
    dry_run: bool,
) -> Result<(), TraderError> {
    // Stage 1: load and validate
    let config = load_config(config_path)?;
    validate_backtest_config(&config)?;
    validate_strategy_config(&config)?;
    let mode = resolve_mode(&config, mode_override)?;
    if mode == RunMode::MonthByMonth {
        validate_screener_config(&config)?;
    }

    // Stage 2: build run inputs
    let strategy = build_strategy(&config)?;
    let bt_config = build_backtest_config(&config)?;
    let tickers = resolve_tickers(&config)?;

    if dry_run {
        eprintln!("Strategy:  {}", strategy.name);
        eprintln!("Mode:      {}", mode);
        eprintln!("Period:    {} to {}", bt_config.start_date, bt_config.end_date);
        eprintln!("Capital:   {:.2} (max {:.2} per trade)", bt_config.initial_capital, bt_config.max_cash_per_trade);
        eprintln!("Universe:  {}", tickers.join(", "));
        eprintln!("\nDry run complete: configuration is valid");
        return Ok(());
    }

    // Stage 3: fetch data
    let universe = match open_universe(&config, strategy.min_bars()) {
        Err(TraderError::UniverseExhausted) => {
            println!("No trades to report.");
            return Err(TraderError::UniverseExhausted);
        }
        other => other?,
    };

    // Stage 4: run
    info!(strategy = %strategy.name, mode = %mode, instruments = universe.count(), "running backtest");
    let outcome = match mode {
        RunMode::StockByStock => run_stock_by_stock(&universe.series, &strategy, &bt_config, None),
        RunMode::MonthByMonth => {
            let screener = build_screener(&config);
            let as_of = screening_as_of(&config)?;
            run_month_by_month(&universe.series, &strategy, &screener, &bt_config, as_of, None)
        }
    };

    // Stage 5: report
    report_outcome(&outcome, &output_dir(&config, output))
}

fn parse_month(month: &str) -> Result<Period, TraderError> {
    NaiveDate::parse_from_str(&format!("{}-01", month.trim()), "%Y-%m-%d")
        .ok()
        .and_then(Period::month_of)
        .ok_or_else(|| TraderError::invalid("screen", "month", format!("'{}' is not YYYY-MM", month)))
}

pub fn run_screen(config_path: &Path, month: &str) -> Result<(), TraderError> {
    let period = parse_month(month)?;
    let config = load_config(config_path)?;
    validate_backtest_config(&config)?;
    validate_strategy_config(&config)?;
    validate_screener_config(&config)?;

    let screener = build_screener(&config);
    let universe = open_universe(&config, screener.rule().min_bars())?;

    let selected = screener.screen(&universe.series, &period);
    println!("=== {} selection for {} (top {}) ===", screener.rule(), period, screener.top_n());
    if selected.is_empty() {
        println!("No instruments qualified.");
    }
    for (rank, candidate) in selected.iter().enumerate() {
        println!(
            "{:>3}. {:<10} volume {:>14.0}  close {:>10.2}",
            rank + 1,
            candidate.ticker,
            candidate.volume,
            candidate.close
        );
    }
    Ok(())
}

fn print_sweep(rows: &[SweepRow]) {
    println!("=== Sweep: {} combinations ===", rows.len());
    println!("{:>5} {:>5} {:>8} {:>14} {:>9}", "fast", "slow", "trades", "profit", "win rate");
    for row in rows.iter().take(10) {
        println!(
            "{:>5} {:>5} {:>8} {:>14.2} {:>8.1}%",
            row.fast,
            row.slow,
            row.total_trades,
            row.total_profit,
            row.win_rate * 100.0
        );
    }
}

pub fn run_sweep_command(config_path: &Path, output: Option<&Path>) -> Result<(), TraderError> {
    let config = load_config(config_path)?;
    validate_backtest_config(&config)?;
    validate_sweep_config(&config)?;

    let grid = build_grid(&config)?;
    let bt_config = build_backtest_config(&config)?;
    let base = build_strategy_params(&config, StrategyKind::Crossover);
    let parallel = config.get_bool("sweep", "parallel", true);
    let universe = open_universe(&config, grid.min_bars().unwrap_or(1))?;

    let rows = run_sweep(&universe.series, &base, &bt_config, &grid, parallel);
    let report = CsvReportAdapter::new(output_dir(&config, output));
    report.write_sweep(&rows)?;
    print_sweep(&rows);
    println!("\nSweep written to: {}", report.output_dir().display());
    Ok(())
}

pub fn run_validate(config_path: &Path) -> Result<(), TraderError> {
    let config = load_config(config_path)?;
    validate_backtest_config(&config)?;
    validate_strategy_config(&config)?;
    validate_screener_config(&config)?;
    validate_sweep_config(&config)?;

    let strategy = build_strategy(&config)?;
    let mode = resolve_mode(&config, None)?;
    eprintln!("Strategy: {} ({})", strategy.name, strategy.kind);
    eprintln!("Mode:     {}", mode);
    eprintln!("\nConfiguration is valid.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price_bar::{InstrumentSeries, PriceBar};

    fn config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn backtest_config_defaults() {
        let c = config("[backtest]\nstart_date = 2020-01-01\nend_date = 2021-01-01\n");
        let bt = build_backtest_config(&c).unwrap();
        assert_eq!(bt.initial_capital, 100_000.0);
        assert_eq!(bt.max_cash_per_trade, 30_000.0);
        assert_eq!(bt.start_date, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
    }

    #[test]
    fn strategy_params_override_defaults() {
        let c = config("[strategy]\nkind = rsi_ma\nfast_period = 8\n");
        let params = build_strategy_params(&c, StrategyKind::RsiMa);
        assert_eq!(params.fast_period, 8);
        assert_eq!(params.slow_period, 36);
        assert_eq!(params.rsi_threshold, 60.0);
        let strategy = build_strategy(&c).unwrap();
        assert_eq!(strategy.kind, StrategyKind::RsiMa);
    }

    fn monthly_bar(month: u32, high: f64, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2024, month, 1).unwrap(),
            open: close,
            high,
            low: close - 1.0,
            close,
            volume: 100.0,
        }
    }

    #[test]
    fn screener_is_gap_breakout_for_any_strategy() {
        let c = config("[strategy]\nkind = crossover\nfast_period = 2\nslow_period = 4\nema_period = 3\n[screener]\ntop_n = 3\n");
        let screener = build_screener(&c);
        assert_eq!(screener.top_n(), 3);
        assert_eq!(screener.rule(), &SignalRule::GapBreakout { ema_period: 3 });

        // A May close above April's high, with April's high under the EMA.
        let series = InstrumentSeries::new(
            "AAA",
            vec![
                monthly_bar(1, 21.0, 20.0),
                monthly_bar(2, 21.0, 20.0),
                monthly_bar(3, 21.0, 20.0),
                monthly_bar(4, 15.0, 14.0),
                monthly_bar(5, 17.0, 16.0),
            ],
        )
        .unwrap();
        let may = Period::month_of(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()).unwrap();
        let picked: Vec<String> = screener
            .screen([&series], &may)
            .into_iter()
            .map(|c| c.ticker)
            .collect();
        assert_eq!(picked, vec!["AAA"]);
    }

    #[test]
    fn screener_ema_period_precedence() {
        let c = config("[strategy]\nkind = rsi_ma\nema_period = 4\n[screener]\nema_period = 6\n");
        assert_eq!(build_screener(&c).rule(), &SignalRule::GapBreakout { ema_period: 6 });
        let c = config("[strategy]\nkind = rsi_ma\nema_period = 4\n");
        assert_eq!(build_screener(&c).rule(), &SignalRule::GapBreakout { ema_period: 4 });
        let c = config("[strategy]\nkind = supertrend\n");
        assert_eq!(build_screener(&c).rule(), &SignalRule::GapBreakout { ema_period: 5 });
    }

    #[test]
    fn grid_from_lists() {
        let c = config("[sweep]\nfast_periods = 2, 3\nslow_periods = 3, 4\n");
        let grid = build_grid(&c).unwrap();
        assert_eq!(grid.combinations(), vec![(2, 3), (2, 4), (3, 4)]);
        assert_eq!(build_grid(&config("[sweep]\n")).unwrap(), ParamGrid::default());
    }

    #[test]
    fn grid_without_combinations_fails() {
        let c = config("[sweep]\nfast_periods = 40\nslow_periods = 10, 20\n");
        let grid = build_grid(&c);
        assert!(matches!(grid, Err(TraderError::ConfigInvalid { .. })));
    }

    #[test]
    fn mode_override_wins() {
        let c = config("[backtest]\nmode = stock_by_stock\n");
        assert_eq!(resolve_mode(&c, None).unwrap(), RunMode::StockByStock);
        assert_eq!(resolve_mode(&c, Some("month_by_month")).unwrap(), RunMode::MonthByMonth);
        assert!(resolve_mode(&c, Some("yearly")).is_err());
        assert_eq!(resolve_mode(&config("[backtest]\n"), None).unwrap(), RunMode::StockByStock);
    }

    #[test]
    fn tickers_from_codes() {
        let c = config("[backtest]\ncodes = bhp, cba\n");
        assert_eq!(resolve_tickers(&c).unwrap(), vec!["BHP", "CBA"]);
        assert!(matches!(
            resolve_tickers(&config("[backtest]\n")),
            Err(TraderError::ConfigMissing { .. })
        ));
    }

    #[test]
    fn universe_request_interval() {
        let c = config("[backtest]\nstart_date = 2020-01-01\nend_date = 2021-01-01\ninterval = daily\nmin_market_cap = 1e9\n");
        let request = build_universe_request(&c, 12).unwrap();
        assert_eq!(request.interval, Interval::Daily);
        assert_eq!(request.min_market_cap, 1e9);
        assert_eq!(request.min_bars, 12);
        let c = config("[backtest]\nstart_date = 2020-01-01\nend_date = 2021-01-01\n");
        assert_eq!(build_universe_request(&c, 1).unwrap().interval, Interval::Monthly);
    }

    #[test]
    fn month_argument() {
        let period = parse_month("2024-02").unwrap();
        assert_eq!(period.start, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(period.end, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert!(parse_month("2024-13").is_err());
        assert!(parse_month("Feb").is_err());
    }

    #[test]
    fn output_dir_precedence() {
        let c = config("[backtest]\noutput_dir = results\n");
        assert_eq!(output_dir(&c, None), PathBuf::from("results"));
        assert_eq!(output_dir(&c, Some(Path::new("other"))), PathBuf::from("other"));
        assert_eq!(output_dir(&config("[backtest]\n"), None), PathBuf::from("."));
    }
}

//! Configuration validation.
//!
//! Validates every section before a run so that a bad value fails fast with
//! the section and key named.

use crate::domain::engine::RunMode;
use crate::domain::error::TraderError;
use crate::domain::price_bar::Interval;
use crate::domain::strategy::{StrategyKind, StrategyParams};
use crate::domain::universe::parse_codes;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_positive(config, "backtest", "initial_capital", 100_000.0)?;
    validate_positive(config, "backtest", "max_cash_per_trade", 30_000.0)?;
    validate_dates(config)?;
    validate_interval(config)?;
    validate_mode(config)?;
    validate_min_market_cap(config)?;
    validate_universe_source(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let kind = required_kind(config)?;
    let defaults = StrategyParams::defaults_for(kind);
    match kind {
        StrategyKind::Breakout => {
            validate_period(config, "consolidation_bars", defaults.consolidation_bars)?;
            validate_positive(config, "strategy", "target_pct", defaults.target_pct)?;
        }
        StrategyKind::Crossover => validate_fast_slow(config, &defaults)?,
        StrategyKind::RsiMa => {
            validate_fast_slow(config, &defaults)?;
            validate_period(config, "rsi_period", defaults.rsi_period)?;
            let threshold = config.get_double("strategy", "rsi_threshold", defaults.rsi_threshold);
            if !(threshold > 0.0 && threshold < 100.0) {
                return Err(TraderError::invalid(
                    "strategy",
                    "rsi_threshold",
                    "rsi_threshold must be between 0 and 100",
                ));
            }
            validate_stop_fraction(config, &defaults)?;
        }
        StrategyKind::Supertrend => {
            validate_period(config, "atr_period", defaults.atr_period)?;
            validate_positive(config, "strategy", "multiplier", defaults.multiplier)?;
        }
        StrategyKind::GapBreakout => {
            validate_period(config, "ema_period", defaults.ema_period)?;
            validate_stop_fraction(config, &defaults)?;
            let multiple = config.get_double("strategy", "target_multiple", defaults.target_multiple);
            if !(multiple > 1.0) {
                return Err(TraderError::invalid(
                    "strategy",
                    "target_multiple",
                    "target_multiple must be greater than 1",
                ));
            }
        }
    }
    Ok(())
}

pub fn validate_screener_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if config.get_int("screener", "top_n", 5) < 1 {
        return Err(TraderError::invalid("screener", "top_n", "top_n must be at least 1"));
    }
    if config.get_int("screener", "ema_period", 5) < 1 {
        return Err(TraderError::invalid("screener", "ema_period", "ema_period must be at least 1"));
    }
    if config.get_string("screener", "as_of").is_some() {
        required_date(config, "screener", "as_of")?;
    }
    Ok(())
}

pub fn validate_sweep_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let fast = period_list(config, "sweep", "fast_periods")?;
    let slow = period_list(config, "sweep", "slow_periods")?;
    if let (Some(fast), Some(slow)) = (fast, slow) {
        if !fast.iter().any(|f| slow.iter().any(|s| f < s)) {
            return Err(TraderError::invalid(
                "sweep",
                "fast_periods",
                "no fast period is below any slow period",
            ));
        }
    }
    Ok(())
}

/// Read `[strategy] kind`, which is required.
pub fn required_kind(config: &dyn ConfigPort) -> Result<StrategyKind, TraderError> {
    let raw = config
        .get_string("strategy", "kind")
        .ok_or_else(|| TraderError::ConfigMissing {
            section: "strategy".to_string(),
            key: "kind".to_string(),
        })?;
    StrategyKind::parse(&raw).ok_or_else(|| {
        TraderError::invalid(
            "strategy",
            "kind",
            format!(
                "unknown kind '{}', expected one of breakout, crossover, rsi_ma, supertrend, gap_breakout",
                raw
            ),
        )
    })
}

/// Parse a required YYYY-MM-DD value.
pub fn required_date(config: &dyn ConfigPort, section: &str, key: &str) -> Result<NaiveDate, TraderError> {
    match config.get_string(section, key) {
        None => Err(TraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            TraderError::invalid(section, key, format!("invalid {} format, expected YYYY-MM-DD", key))
        }),
    }
}

/// Comma list of positive integers; `None` when the key is absent.
pub fn period_list(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<Vec<usize>>, TraderError> {
    let Some(items) = config.get_list(section, key) else {
        return Ok(None);
    };
    let periods = items
        .iter()
        .map(|item| match item.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(TraderError::invalid(
                section,
                key,
                format!("'{}' is not a positive integer", item),
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;
    if periods.is_empty() {
        return Err(TraderError::invalid(section, key, "list is empty"));
    }
    Ok(Some(periods))
}

fn validate_positive(config: &dyn ConfigPort, section: &str, key: &str, default: f64) -> Result<(), TraderError> {
    let value = config.get_double(section, key, default);
    if !(value > 0.0) {
        return Err(TraderError::invalid(section, key, format!("{} must be positive", key)));
    }
    Ok(())
}

fn validate_period(config: &dyn ConfigPort, key: &str, default: usize) -> Result<(), TraderError> {
    if config.get_int("strategy", key, default as i64) < 1 {
        return Err(TraderError::invalid("strategy", key, format!("{} must be at least 1", key)));
    }
    Ok(())
}

fn validate_fast_slow(config: &dyn ConfigPort, defaults: &StrategyParams) -> Result<(), TraderError> {
    validate_period(config, "fast_period", defaults.fast_period)?;
    validate_period(config, "slow_period", defaults.slow_period)?;
    let fast = config.get_int("strategy", "fast_period", defaults.fast_period as i64);
    let slow = config.get_int("strategy", "slow_period", defaults.slow_period as i64);
    if fast >= slow {
        return Err(TraderError::invalid(
            "strategy",
            "fast_period",
            "fast_period must be less than slow_period",
        ));
    }
    Ok(())
}

fn validate_stop_fraction(config: &dyn ConfigPort, defaults: &StrategyParams) -> Result<(), TraderError> {
    let fraction = config.get_double("strategy", "stop_fraction", defaults.stop_fraction);
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(TraderError::invalid(
            "strategy",
            "stop_fraction",
            "stop_fraction must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let start_date = required_date(config, "backtest", "start_date")?;
    let end_date = required_date(config, "backtest", "end_date")?;

    if start_date >= end_date {
        return Err(TraderError::invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    Ok(())
}

fn validate_interval(config: &dyn ConfigPort) -> Result<(), TraderError> {
    match config.get_string("backtest", "interval") {
        Some(raw) if Interval::parse(&raw).is_none() => Err(TraderError::invalid(
            "backtest",
            "interval",
            format!("unknown interval '{}', expected daily or monthly", raw),
        )),
        _ => Ok(()),
    }
}

fn validate_mode(config: &dyn ConfigPort) -> Result<(), TraderError> {
    match config.get_string("backtest", "mode") {
        Some(raw) if RunMode::parse(&raw).is_none() => Err(TraderError::invalid(
            "backtest",
            "mode",
            format!("unknown mode '{}', expected stock_by_stock or month_by_month", raw),
        )),
        _ => Ok(()),
    }
}

fn validate_min_market_cap(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if config.get_double("backtest", "min_market_cap", 0.0) < 0.0 {
        return Err(TraderError::invalid(
            "backtest",
            "min_market_cap",
            "min_market_cap must be non-negative",
        ));
    }
    Ok(())
}

fn validate_universe_source(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let file = config
        .get_string("backtest", "universe_file")
        .filter(|s| !s.trim().is_empty());
    let codes = config
        .get_string("backtest", "codes")
        .filter(|s| !s.trim().is_empty());

    match (file, codes) {
        (Some(_), _) => Ok(()),
        (None, Some(c)) => parse_codes(&c)
            .map(|_| ())
            .map_err(|e| TraderError::invalid("backtest", "codes", e.to_string())),
        (None, None) => Err(TraderError::ConfigMissing {
            section: "backtest".to_string(),
            key: "codes".to_string(),
        }),
    }
}

//! Signal rules: pure functions of a trailing price window.
//!
//! Every rule sees the bars up to and including the current one and returns
//! one of [`Signal::None`], [`Signal::Enter`] or [`Signal::Exit`]. Rules keep
//! no state between calls; indicators are recomputed over the window. A
//! window shorter than [`SignalRule::min_bars`] always yields `None`.

use crate::domain::indicator::{calculate_atr, calculate_ema, calculate_rsi, calculate_sma};
use crate::domain::indicator::IndicatorSeries;
use crate::domain::price_bar::PriceBar;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    None,
    Enter,
    Exit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignalRule {
    /// Inside-bar consolidation followed by a close above the range.
    RangeBreakout { lookback: usize },
    /// Fast/slow SMA crossover.
    MaCrossover { fast: usize, slow: usize },
    /// SMA crossover confirmed by RSI above a threshold; exits below the fast SMA.
    RsiCrossover {
        fast: usize,
        slow: usize,
        rsi_period: usize,
        rsi_threshold: f64,
    },
    /// Supertrend direction flips.
    VolatilityBand { atr_period: usize, multiplier: f64 },
    /// Close above the previous high while that high sat below the EMA.
    GapBreakout { ema_period: usize },
}

impl SignalRule {
    /// Bars required before the rule can return anything but `None`.
    pub fn min_bars(&self) -> usize {
        match self {
            SignalRule::RangeBreakout { lookback } => lookback + 2,
            SignalRule::MaCrossover { slow, .. } => *slow,
            SignalRule::RsiCrossover {
                slow, rsi_period, ..
            } => (*slow).max(rsi_period + 1),
            SignalRule::VolatilityBand { atr_period, .. } => atr_period + 1,
            SignalRule::GapBreakout { ema_period } => ema_period + 1,
        }
    }

    pub fn evaluate(&self, window: &[PriceBar]) -> Signal {
        if window.len() < self.min_bars().max(2) {
            return Signal::None;
        }
        match self {
            SignalRule::RangeBreakout { lookback } => range_breakout(window, *lookback),
            SignalRule::MaCrossover { fast, slow } => {
                match crossover(window, *fast, *slow).0 {
                    Cross::Up => Signal::Enter,
                    Cross::Down => Signal::Exit,
                    Cross::None => Signal::None,
                }
            }
            SignalRule::RsiCrossover {
                fast,
                slow,
                rsi_period,
                rsi_threshold,
            } => rsi_crossover(window, *fast, *slow, *rsi_period, *rsi_threshold),
            SignalRule::VolatilityBand {
                atr_period,
                multiplier,
            } => volatility_band(window, *atr_period, *multiplier),
            SignalRule::GapBreakout { ema_period } => gap_breakout(window, *ema_period),
        }
    }

    /// Whether an open position should close on the last bar of `window`.
    ///
    /// Same as `evaluate(window) == Signal::Exit`, except that the RSI rule
    /// exits below its fast SMA even on a bar that also reads as an entry.
    pub fn exits(&self, window: &[PriceBar]) -> bool {
        match self {
            SignalRule::RsiCrossover { fast, .. } => {
                window.len() >= self.min_bars().max(2) && close_below(window, &calculate_sma(window, *fast))
            }
            _ => self.evaluate(window) == Signal::Exit,
        }
    }

    /// Lowest close of the consolidation preceding the current bar.
    ///
    /// Only meaningful for [`SignalRule::RangeBreakout`]; other rules return `None`.
    pub fn consolidation_low(&self, window: &[PriceBar]) -> Option<f64> {
        match self {
            SignalRule::RangeBreakout { lookback }
                if *lookback > 0 && window.len() > *lookback =>
            {
                let n = window.len();
                close_range(&window[n - 1 - lookback..n - 1]).map(|(low, _)| low)
            }
            _ => None,
        }
    }
}

impl fmt::Display for SignalRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalRule::RangeBreakout { lookback } => write!(f, "RANGE_BREAKOUT({})", lookback),
            SignalRule::MaCrossover { fast, slow } => write!(f, "SMA_CROSS({},{})", fast, slow),
            SignalRule::RsiCrossover {
                fast,
                slow,
                rsi_period,
                rsi_threshold,
            } => write!(
                f,
                "RSI_SMA_CROSS({},{},{},{})",
                fast, slow, rsi_period, rsi_threshold
            ),
            SignalRule::VolatilityBand {
                atr_period,
                multiplier,
            } => write!(f, "SUPERTREND({},{})", atr_period, multiplier),
            SignalRule::GapBreakout { ema_period } => write!(f, "GAP_BREAKOUT({})", ema_period),
        }
    }
}

/// (min close, max close) over `bars`.
fn close_range(bars: &[PriceBar]) -> Option<(f64, f64)> {
    if bars.is_empty() {
        return None;
    }
    Some(bars.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), b| {
        (lo.min(b.close), hi.max(b.close))
    }))
}

fn range_breakout(window: &[PriceBar], lookback: usize) -> Signal {
    if lookback == 0 {
        return Signal::None;
    }
    let n = window.len();
    let current = &window[n - 1];
    let setup = &window[n - 2];

    // The setup bar must sit strictly inside the close range of the bars before it.
    let Some((ref_low, ref_high)) = close_range(&window[n - 2 - lookback..n - 2]) else {
        return Signal::None;
    };
    let consolidating = setup.high < ref_high && setup.low > ref_low;

    let Some((_, trailing_high)) = close_range(&window[n - 1 - lookback..n - 1]) else {
        return Signal::None;
    };

    if consolidating && current.close > trailing_high {
        Signal::Enter
    } else {
        Signal::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cross {
    Up,
    Down,
    None,
}

/// Detect a sign change of (fast - slow) at the last bar.
///
/// The current sign is compared with the most recent non-zero sign earlier in
/// the window, so a touch (difference of zero) never hides a cross. With no
/// earlier sign, the first positive difference counts as an upward cross.
fn crossover(window: &[PriceBar], fast: usize, slow: usize) -> (Cross, IndicatorSeries) {
    let fast_ma = calculate_sma(window, fast);
    let slow_ma = calculate_sma(window, slow);
    let last = window.len() - 1;

    let diff = |i: usize| match (fast_ma.value_at(i), slow_ma.value_at(i)) {
        (Some(f), Some(s)) => Some(f - s),
        _ => None,
    };

    let Some(current) = diff(last) else {
        return (Cross::None, fast_ma);
    };
    let prior = (0..last)
        .rev()
        .filter_map(diff)
        .find(|d| *d != 0.0)
        .map(f64::signum);

    let cross = if current > 0.0 && prior != Some(1.0) {
        Cross::Up
    } else if current < 0.0 && prior != Some(-1.0) {
        Cross::Down
    } else {
        Cross::None
    };
    (cross, fast_ma)
}

fn rsi_crossover(
    window: &[PriceBar],
    fast: usize,
    slow: usize,
    rsi_period: usize,
    rsi_threshold: f64,
) -> Signal {
    let (cross, fast_ma) = crossover(window, fast, slow);

    // Entry wins when both hold; open positions ask `exits` instead.
    let rsi = calculate_rsi(window, rsi_period);
    if cross == Cross::Up && rsi.last().is_some_and(|value| value > rsi_threshold) {
        return Signal::Enter;
    }
    if close_below(window, &fast_ma) {
        Signal::Exit
    } else {
        Signal::None
    }
}

fn close_below(window: &[PriceBar], ma: &IndicatorSeries) -> bool {
    let close = window[window.len() - 1].close;
    ma.last().is_some_and(|value| close < value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trend {
    Long,
    Short,
}

/// Supertrend direction per bar; `None` while ATR warms up.
fn trend_directions(window: &[PriceBar], atr_period: usize, multiplier: f64) -> Vec<Option<Trend>> {
    let atr = calculate_atr(window, atr_period);
    let mut directions = Vec::with_capacity(window.len());
    let mut state: Option<(Trend, f64, f64)> = None; // (direction, final upper, final lower)

    for (i, bar) in window.iter().enumerate() {
        let Some(atr_value) = atr.value_at(i) else {
            directions.push(None);
            continue;
        };
        let basic_upper = bar.midpoint() + multiplier * atr_value;
        let basic_lower = bar.midpoint() - multiplier * atr_value;

        let next = match state {
            None => (Trend::Short, basic_upper, basic_lower),
            Some((trend, prev_upper, prev_lower)) => {
                let prev_close = window[i - 1].close;
                let upper = if basic_upper < prev_upper || prev_close > prev_upper {
                    basic_upper
                } else {
                    prev_upper
                };
                let lower = if basic_lower > prev_lower || prev_close < prev_lower {
                    basic_lower
                } else {
                    prev_lower
                };
                let trend = match trend {
                    Trend::Short if bar.close > upper => Trend::Long,
                    Trend::Long if bar.close < lower => Trend::Short,
                    unchanged => unchanged,
                };
                (trend, upper, lower)
            }
        };
        state = Some(next);
        directions.push(Some(next.0));
    }
    directions
}

fn volatility_band(window: &[PriceBar], atr_period: usize, multiplier: f64) -> Signal {
    let directions = trend_directions(window, atr_period, multiplier);
    let n = directions.len();
    match (directions[n - 2], directions[n - 1]) {
        (Some(Trend::Short), Some(Trend::Long)) => Signal::Enter,
        (Some(Trend::Long), Some(Trend::Short)) => Signal::Exit,
        _ => Signal::None,
    }
}

fn gap_breakout(window: &[PriceBar], ema_period: usize) -> Signal {
    let n = window.len();
    let current = &window[n - 1];
    let previous = &window[n - 2];

    // EMA as it stood one bar earlier, computed without the current bar.
    let ema = calculate_ema(&window[..n - 1], ema_period);
    match ema.last() {
        Some(value) if current.close > previous.high && previous.high < value => Signal::Enter,
        _ => Signal::None,
    }
}

//! Strategy composition: a signal rule plus the risk levels set at entry.

use crate::domain::price_bar::PriceBar;
use crate::domain::signal::SignalRule;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Breakout,
    Crossover,
    RsiMa,
    Supertrend,
    GapBreakout,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::Breakout,
        StrategyKind::Crossover,
        StrategyKind::RsiMa,
        StrategyKind::Supertrend,
        StrategyKind::GapBreakout,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "breakout" => Some(StrategyKind::Breakout),
            "crossover" => Some(StrategyKind::Crossover),
            "rsi_ma" => Some(StrategyKind::RsiMa),
            "supertrend" => Some(StrategyKind::Supertrend),
            "gap_breakout" => Some(StrategyKind::GapBreakout),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Breakout => "breakout",
            StrategyKind::Crossover => "crossover",
            StrategyKind::RsiMa => "rsi_ma",
            StrategyKind::Supertrend => "supertrend",
            StrategyKind::GapBreakout => "gap_breakout",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopRule {
    None,
    /// Lowest close of the consolidation that preceded the breakout.
    ConsolidationLow,
    FractionOfEntry(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetRule {
    None,
    PercentAboveEntry(f64),
    MultipleOfEntry(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskPolicy {
    pub stop: StopRule,
    pub target: TargetRule,
}

impl RiskPolicy {
    pub const NONE: RiskPolicy = RiskPolicy {
        stop: StopRule::None,
        target: TargetRule::None,
    };

    /// (stop, target) for a position entered at `entry_price` on the last bar of `window`.
    pub fn levels(
        &self,
        rule: &SignalRule,
        window: &[PriceBar],
        entry_price: f64,
    ) -> (Option<f64>, Option<f64>) {
        let stop = match self.stop {
            StopRule::None => None,
            StopRule::ConsolidationLow => rule.consolidation_low(window),
            StopRule::FractionOfEntry(fraction) => Some(entry_price * fraction),
        };
        let target = match self.target {
            TargetRule::None => None,
            TargetRule::PercentAboveEntry(pct) => Some(entry_price * (1.0 + pct / 100.0)),
            TargetRule::MultipleOfEntry(multiple) => Some(entry_price * multiple),
        };
        (stop, target)
    }
}

/// Tunable parameters; which ones matter depends on the [`StrategyKind`].
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParams {
    pub consolidation_bars: usize,
    pub target_pct: f64,
    pub fast_period: usize,
    pub slow_period: usize,
    pub rsi_period: usize,
    pub rsi_threshold: f64,
    pub atr_period: usize,
    pub multiplier: f64,
    pub ema_period: usize,
    pub stop_fraction: f64,
    pub target_multiple: f64,
}

impl StrategyParams {
    pub fn defaults_for(kind: StrategyKind) -> Self {
        let (fast_period, slow_period) = match kind {
            StrategyKind::RsiMa => (21, 36),
            _ => (10, 30),
        };
        StrategyParams {
            consolidation_bars: 3,
            target_pct: 100.0,
            fast_period,
            slow_period,
            rsi_period: 14,
            rsi_threshold: 60.0,
            atr_period: 7,
            multiplier: 3.0,
            ema_period: 5,
            stop_fraction: 0.75,
            target_multiple: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub name: String,
    pub kind: StrategyKind,
    pub rule: SignalRule,
    pub risk: RiskPolicy,
}

impl Strategy {
    pub fn new(kind: StrategyKind, params: &StrategyParams) -> Self {
        let (rule, risk) = match kind {
            StrategyKind::Breakout => (
                SignalRule::RangeBreakout {
                    lookback: params.consolidation_bars,
                },
                RiskPolicy {
                    stop: StopRule::ConsolidationLow,
                    target: TargetRule::PercentAboveEntry(params.target_pct),
                },
            ),
            StrategyKind::Crossover => (
                SignalRule::MaCrossover {
                    fast: params.fast_period,
                    slow: params.slow_period,
                },
                RiskPolicy::NONE,
            ),
            StrategyKind::RsiMa => (
                SignalRule::RsiCrossover {
                    fast: params.fast_period,
                    slow: params.slow_period,
                    rsi_period: params.rsi_period,
                    rsi_threshold: params.rsi_threshold,
                },
                RiskPolicy {
                    stop: StopRule::FractionOfEntry(params.stop_fraction),
                    target: TargetRule::None,
                },
            ),
            StrategyKind::Supertrend => (
                SignalRule::VolatilityBand {
                    atr_period: params.atr_period,
                    multiplier: params.multiplier,
                },
                RiskPolicy::NONE,
            ),
            StrategyKind::GapBreakout => (
                SignalRule::GapBreakout {
                    ema_period: params.ema_period,
                },
                RiskPolicy {
                    stop: StopRule::FractionOfEntry(params.stop_fraction),
                    target: TargetRule::MultipleOfEntry(params.target_multiple),
                },
            ),
        };
        Strategy {
            name: rule.to_string(),
            kind,
            rule,
            risk,
        }
    }

    pub fn min_bars(&self) -> usize {
        self.rule.min_bars()
    }
}

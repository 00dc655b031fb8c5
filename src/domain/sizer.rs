//! Position sizing: whole shares bounded by a per-trade cash cap.

/// Caps the cash committed to any single trade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSizer {
    pub max_cash_per_trade: f64,
}

impl PositionSizer {
    pub fn new(max_cash_per_trade: f64) -> Self {
        PositionSizer { max_cash_per_trade }
    }

    /// floor(min(cap, cash) / price); zero when nothing sensible can be bought.
    pub fn size(&self, cash_available: f64, unit_price: f64) -> u64 {
        size(cash_available, self.max_cash_per_trade, unit_price)
    }
}

impl Default for PositionSizer {
    fn default() -> Self {
        PositionSizer::new(30_000.0)
    }
}

pub fn size(cash_available: f64, max_cash_per_trade: f64, unit_price: f64) -> u64 {
    // Negated comparisons also reject NaN.
    if !(unit_price > 0.0) {
        return 0;
    }
    let budget = cash_available.min(max_cash_per_trade);
    if !(budget > 0.0) {
        return 0;
    }
    let shares = (budget / unit_price).floor();
    if shares.is_finite() { shares as u64 } else { 0 }
}

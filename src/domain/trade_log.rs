//! Append-only collection of completed trades.

use crate::domain::position::TradeRecord;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeLog {
    trades: Vec<TradeRecord>,
}

impl TradeLog {
    pub fn new() -> Self {
        TradeLog::default()
    }

    pub fn record(&mut self, trade: TradeRecord) {
        self.trades.push(trade);
    }

    pub fn extend(&mut self, trades: impl IntoIterator<Item = TradeRecord>) {
        self.trades.extend(trades);
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}

//! Report persistence port.

use crate::domain::error::TraderError;
use crate::domain::metrics::{InstrumentSummary, SummaryStatistics};
use crate::domain::position::TradeRecord;
use crate::domain::sweep::SweepRow;

/// Destination for run results.
pub trait ReportPort {
    fn write_trades(&self, trades: &[TradeRecord]) -> Result<(), TraderError>;

    fn write_summary(&self, summary: &SummaryStatistics) -> Result<(), TraderError>;

    fn write_instruments(&self, instruments: &[InstrumentSummary]) -> Result<(), TraderError>;

    fn write_sweep(&self, rows: &[SweepRow]) -> Result<(), TraderError>;

    /// Trades, summary and per-instrument breakdown in one call.
    fn write_run(&self, trades: &[TradeRecord]) -> Result<SummaryStatistics, TraderError> {
        let summary = SummaryStatistics::compute(trades);
        self.write_trades(trades)?;
        self.write_summary(&summary)?;
        self.write_instruments(&InstrumentSummary::compute_all(trades))?;
        Ok(summary)
    }
}

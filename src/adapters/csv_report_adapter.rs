//! CSV report adapter implementing ReportPort.
//!
//! Writes `trades.csv`, `summary.csv`, `instruments.csv` and `sweep.csv`
//! into one output directory. Column names come from the serialized field
//! names of each row type.

use crate::domain::error::TraderError;
use crate::domain::metrics::{InstrumentSummary, SummaryStatistics};
use crate::domain::position::TradeRecord;
use crate::domain::sweep::SweepRow;
use crate::ports::report_port::ReportPort;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const TRADES_FILE: &str = "trades.csv";
pub const SUMMARY_FILE: &str = "summary.csv";
pub const INSTRUMENTS_FILE: &str = "instruments.csv";
pub const SWEEP_FILE: &str = "sweep.csv";

#[derive(Serialize)]
struct InstrumentRow<'a> {
    ticker: &'a str,
    trades: usize,
    profitable: usize,
    losing: usize,
    total_profit: f64,
    buy_prices: String,
    sell_prices: String,
}

fn join_prices(prices: &[f64]) -> String {
    prices
        .iter()
        .map(|p| format!("{:.4}", p))
        .collect::<Vec<_>>()
        .join(";")
}

pub struct CsvReportAdapter {
    output_dir: PathBuf,
}

impl CsvReportAdapter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn write_rows<T: Serialize>(&self, file: &str, rows: impl IntoIterator<Item = T>) -> Result<(), TraderError> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(file);
        let mut writer = csv::Writer::from_path(&path)?;
        let mut count = 0usize;
        for row in rows {
            writer.serialize(row)?;
            count += 1;
        }
        writer.flush()?;
        info!(path = %path.display(), rows = count, "report written");
        Ok(())
    }
}

impl ReportPort for CsvReportAdapter {
    fn write_trades(&self, trades: &[TradeRecord]) -> Result<(), TraderError> {
        self.write_rows(TRADES_FILE, trades)
    }

    fn write_summary(&self, summary: &SummaryStatistics) -> Result<(), TraderError> {
        self.write_rows(SUMMARY_FILE, std::iter::once(summary))
    }

    fn write_instruments(&self, instruments: &[InstrumentSummary]) -> Result<(), TraderError> {
        self.write_rows(
            INSTRUMENTS_FILE,
            instruments.iter().map(|i| InstrumentRow {
                ticker: &i.ticker,
                trades: i.trades,
                profitable: i.wins,
                losing: i.losses,
                total_profit: i.total_profit,
                buy_prices: join_prices(&i.buy_prices),
                sell_prices: join_prices(&i.sell_prices),
            }),
        )
    }

    fn write_sweep(&self, rows: &[SweepRow]) -> Result<(), TraderError> {
        self.write_rows(SWEEP_FILE, rows)
    }
}

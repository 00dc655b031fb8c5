//! RSI (Relative Strength Index) with Wilder's smoothing.
//!
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! RSI = 100 - (100 / (1 + avg_gain / avg_loss)); 100 when avg_loss == 0.
//! Warmup: first n bars are invalid (n price changes seed the averages).

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::price_bar::PriceBar;

pub fn calculate_rsi(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let mut values: Vec<IndicatorPoint> = bars
        .iter()
        .map(|b| IndicatorSeries::invalid_point(b.date))
        .collect();

    if period == 0 || bars.len() <= period {
        return IndicatorSeries {
            indicator_type: IndicatorType::Rsi(period),
            values,
        };
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = bars
        .windows(2)
        .map(|w| {
            let change = w[1].close - w[0].close;
            (change.max(0.0), (-change).max(0.0))
        })
        .unzip();

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
    values[period] = point(bars[period].date, avg_gain, avg_loss);

    for i in (period + 1)..bars.len() {
        let change_idx = i - 1;
        avg_gain = (avg_gain * (period - 1) as f64 + gains[change_idx]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[change_idx]) / period as f64;
        values[i] = point(bars[i].date, avg_gain, avg_loss);
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}

fn point(date: chrono::NaiveDate, avg_gain: f64, avg_loss: f64) -> IndicatorPoint {
    let rsi = if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    };
    IndicatorPoint {
        date,
        valid: true,
        value: rsi,
    }
}

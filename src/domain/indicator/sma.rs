//! Simple Moving Average.
//!
//! SMA(n)[i] = mean(C[i-n+1..=i]). Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::price_bar::PriceBar;

pub fn calculate_sma(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());
    let mut sum = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        sum += bar.close;
        if period > 0 && i >= period {
            sum -= bars[i - period].close;
        }

        if period == 0 || i + 1 < period {
            values.push(IndicatorSeries::invalid_point(bar.date));
        } else {
            values.push(IndicatorPoint {
                date: bar.date,
                valid: true,
                value: sum / period as f64,
            });
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values,
    }
}

//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::price_bar::PriceBar;

pub fn calculate_ema(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries {
            indicator_type: IndicatorType::Ema(period),
            values: bars
                .iter()
                .map(|b| IndicatorSeries::invalid_point(b.date))
                .collect(),
        };
    }

    let mut values = Vec::with_capacity(bars.len());
    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i < period - 1 {
            sum += bar.close;
            values.push(IndicatorSeries::invalid_point(bar.date));
            continue;
        }

        if i == period - 1 {
            sum += bar.close;
            ema = sum / period as f64;
        } else {
            ema = bar.close * k + ema * (1.0 - k);
        }
        values.push(IndicatorPoint {
            date: bar.date,
            valid: true,
            value: ema,
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    }
}

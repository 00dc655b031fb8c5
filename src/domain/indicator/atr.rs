//! Average True Range with Wilder's smoothing.
//!
//! TR[0] = high - low; TR[i] = true range against the previous close.
//! Seed ATR = mean(TR[0..n]); then ATR[i] = (ATR[i-1]*(n-1) + TR[i]) / n.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::price_bar::PriceBar;

pub fn calculate_atr(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let mut values: Vec<IndicatorPoint> = Vec::with_capacity(bars.len());
    if period == 0 {
        values.extend(bars.iter().map(|b| IndicatorSeries::invalid_point(b.date)));
        return IndicatorSeries {
            indicator_type: IndicatorType::Atr(period),
            values,
        };
    }

    let mut tr_sum = 0.0;
    let mut atr = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        let tr = if i == 0 {
            bar.high - bar.low
        } else {
            bar.true_range(bars[i - 1].close)
        };

        if i < period - 1 {
            tr_sum += tr;
            values.push(IndicatorSeries::invalid_point(bar.date));
            continue;
        }

        if i == period - 1 {
            tr_sum += tr;
            atr = tr_sum / period as f64;
        } else {
            atr = (atr * (period - 1) as f64 + tr) / period as f64;
        }
        values.push(IndicatorPoint {
            date: bar.date,
            valid: true,
            value: atr,
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values,
    }
}

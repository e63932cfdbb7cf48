use std::collections::HashMap;

use analysis_core::{DailyClose, MaPoint};
use chrono::{Duration, NaiveDate};

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percent distance of the current price from a moving average, rounded to
/// two decimals. None when the average is missing, not finite, or zero.
pub fn percent_from_ma(current: f64, ma: Option<f64>) -> Option<f64> {
    match ma {
        Some(ma) if ma.is_finite() && ma != 0.0 => Some(round2((current - ma) / ma * 100.0)),
        _ => None,
    }
}

/// Percent difference of the latest daily volume from the trailing average.
/// None unless both sides are finite and nonzero.
pub fn volume_comparison(most_recent: f64, average: Option<f64>) -> Option<f64> {
    match average {
        Some(avg)
            if avg.is_finite() && avg != 0.0 && most_recent.is_finite() && most_recent != 0.0 =>
        {
            Some(round2((most_recent - avg) / avg * 100.0))
        }
        _ => None,
    }
}

/// Label for a daily percent change
pub fn price_sentiment_label(change_percent: f64) -> &'static str {
    if change_percent > 2.0 {
        "Bullish"
    } else if change_percent > 0.0 {
        "Somewhat Bullish"
    } else if change_percent > -2.0 {
        "Neutral"
    } else if change_percent > -5.0 {
        "Somewhat Bearish"
    } else {
        "Bearish"
    }
}

/// Simple moving average aligned to the input series. The first
/// `period - 1` points carry None; a zero period or a series shorter than
/// the period yields no defined values at all.
pub fn sma_series(closes: &[DailyClose], period: usize) -> Vec<MaPoint> {
    let mut result: Vec<MaPoint> = closes
        .iter()
        .map(|c| MaPoint {
            date: c.date,
            value: None,
        })
        .collect();
    if period == 0 || closes.len() < period {
        return result;
    }

    for i in period - 1..closes.len() {
        let sum: f64 = closes[i + 1 - period..=i].iter().map(|c| c.close).sum();
        result[i].value = Some(sum / period as f64);
    }
    result
}

/// Price/MA crossovers found inside a lookback window. When a direction
/// crosses more than once in the window, the most recent occurrence wins.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CrossoverScan {
    pub up: bool,
    pub up_date: Option<NaiveDate>,
    pub down: bool,
    pub down_date: Option<NaiveDate>,
}

/// Scan closes against a moving average for crossovers dated within
/// `lookback_days` of `today`. Closes are joined to MA points by date,
/// skipping dates where the MA is undefined, then walked as consecutive
/// pairs in ascending order. Fewer than two joined points means no signal.
pub fn detect_crossovers(
    closes: &[DailyClose],
    ma: &[MaPoint],
    today: NaiveDate,
    lookback_days: u32,
) -> CrossoverScan {
    let cutoff = today - Duration::days(lookback_days as i64);

    let ma_by_date: HashMap<NaiveDate, f64> = ma
        .iter()
        .filter_map(|p| p.value.map(|v| (p.date, v)))
        .collect();

    let joined: Vec<(NaiveDate, f64, f64)> = closes
        .iter()
        .filter(|c| c.date >= cutoff && c.date <= today)
        .filter_map(|c| ma_by_date.get(&c.date).map(|&v| (c.date, c.close, v)))
        .collect();

    let mut scan = CrossoverScan::default();
    if joined.len() < 2 {
        return scan;
    }

    for pair in joined.windows(2) {
        let (_, prev_close, prev_ma) = pair[0];
        let (date, close, ma_value) = pair[1];
        if prev_close < prev_ma && close > ma_value {
            scan.up = true;
            scan.up_date = Some(date);
        }
        if prev_close > prev_ma && close < ma_value {
            scan.down = true;
            scan.down_date = Some(date);
        }
    }
    scan
}

/// Same-day crossover of the 200-day MA based on the latest quote.
/// Returns (up, down).
pub fn same_day_crossover(previous_close: f64, price: f64, sma200: Option<f64>) -> (bool, bool) {
    match sma200 {
        Some(ma) if ma.is_finite() => (
            previous_close < ma && price > ma,
            previous_close > ma && price < ma,
        ),
        _ => (false, false),
    }
}

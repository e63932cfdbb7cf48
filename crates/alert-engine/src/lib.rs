//! Threshold alerting over analysis results: pure evaluation of which
//! alerts fire, plus cooldown and mute-until-midnight bookkeeping.

use std::collections::HashMap;

use analysis_core::AnalysisResult;
use chrono::{DateTime, Duration, NaiveTime, Utc};

/// Alert thresholds and per-family once-per-day mute switches.
#[derive(Debug, Clone)]
pub struct AlertConfig {
    /// Percent band around the 50/200-day MA that counts as "at the MA".
    pub ma_tolerance: f64,
    /// Percent deviation from 20-day average volume that fires.
    pub volume_tolerance: f64,
    /// Percent intraday change that fires.
    pub price_change_tolerance: f64,
    /// Cooldown between repeats of the same alert. Values below one
    /// second fall back to the 300s default.
    pub cooldown_secs: f64,
    pub mute_ma: bool,
    pub mute_volume: bool,
    pub mute_price_change: bool,
    pub mute_crossover_up: bool,
    pub mute_crossover_down: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            ma_tolerance: 1.0,
            volume_tolerance: 20.0,
            price_change_tolerance: 5.0,
            cooldown_secs: 300.0,
            mute_ma: false,
            mute_volume: false,
            mute_price_change: false,
            mute_crossover_up: false,
            mute_crossover_down: false,
        }
    }
}

impl AlertConfig {
    pub fn cooldown(&self) -> Duration {
        if self.cooldown_secs.is_nan() || self.cooldown_secs < 1.0 {
            Duration::seconds(300)
        } else {
            Duration::milliseconds((self.cooldown_secs * 1000.0).round() as i64)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    Ma50,
    Ma200,
    Ma200CrossoverUp,
    Ma200CrossoverDown,
    Ma200CrossoverUpLookback,
    Ma200CrossoverDownLookback,
    Volume,
    PriceChange,
}

impl AlertKind {
    /// Stable key string, also used in throttle map keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Ma50 => "MA50",
            AlertKind::Ma200 => "MA200",
            AlertKind::Ma200CrossoverUp => "MA200_Crossover_Up",
            AlertKind::Ma200CrossoverDown => "MA200_Crossover_Down",
            AlertKind::Ma200CrossoverUpLookback => "MA200_Crossover_Up_Lookback",
            AlertKind::Ma200CrossoverDownLookback => "MA200_Crossover_Down_Lookback",
            AlertKind::Volume => "Volume",
            AlertKind::PriceChange => "PriceChange",
        }
    }
}

/// One alert that fired during evaluation, ready to dispatch.
#[derive(Debug, Clone)]
pub struct AlertEvent {
    pub symbol: String,
    pub kind: AlertKind,
    pub subject: String,
    pub body_html: String,
    /// Whether this alert's family is set to fire at most once per day.
    pub once_per_day: bool,
}

/// Evaluate which alerts fire for one analysis result. Pure: throttling
/// is the caller's concern.
pub fn evaluate(
    result: &AnalysisResult,
    config: &AlertConfig,
    lookback_days: u32,
) -> Vec<AlertEvent> {
    let quote = match result.quote.data() {
        Some(quote) => quote,
        None => return Vec::new(),
    };
    let symbol = &result.symbol;
    let mut events = Vec::new();

    if let Some(percent) = quote.percent_from_50_day_ma {
        if percent >= -config.ma_tolerance && percent <= config.ma_tolerance {
            events.push(AlertEvent {
                symbol: symbol.clone(),
                kind: AlertKind::Ma50,
                subject: format!(
                    "Percent from 50-Day MA Alert: {}% within {}%",
                    percent, config.ma_tolerance
                ),
                body_html: format!(
                    "<p>Stock: {}</p><p>Percent from 50-Day MA: {}%</p><p>Tolerance: {}%</p>",
                    symbol, percent, config.ma_tolerance
                ),
                once_per_day: config.mute_ma,
            });
        }
    }

    if let Some(percent) = quote.percent_from_200_day_ma {
        if percent >= -config.ma_tolerance && percent <= config.ma_tolerance {
            events.push(AlertEvent {
                symbol: symbol.clone(),
                kind: AlertKind::Ma200,
                subject: format!(
                    "Percent from 200-Day MA Alert: {}% within {}%",
                    percent, config.ma_tolerance
                ),
                body_html: format!(
                    "<p>Stock: {}</p><p>Percent from 200-Day MA: {}%</p><p>Tolerance: {}%</p>",
                    symbol, percent, config.ma_tolerance
                ),
                once_per_day: config.mute_ma,
            });
        }
    }

    let ma_200_line = result
        .sma_200
        .data()
        .map(|ma| format!("<p>200-Day MA: ${}</p>", ma))
        .unwrap_or_default();

    if quote.crossover_200_up {
        events.push(AlertEvent {
            symbol: symbol.clone(),
            kind: AlertKind::Ma200CrossoverUp,
            subject: format!("ALERT: {} Price Crossover Above 200-Day MA!", symbol),
            body_html: format!(
                "<p>Stock: {}</p><p>Previous Close: ${}</p><p>Current Price: ${}</p>{}<p>Action: Price moved from below to above 200-Day MA.</p>",
                symbol, quote.previous_close, quote.price, ma_200_line
            ),
            once_per_day: config.mute_crossover_up,
        });
    }

    if quote.crossover_200_down {
        events.push(AlertEvent {
            symbol: symbol.clone(),
            kind: AlertKind::Ma200CrossoverDown,
            subject: format!("ALERT: {} Price Crossover Below 200-Day MA!", symbol),
            body_html: format!(
                "<p>Stock: {}</p><p>Previous Close: ${}</p><p>Current Price: ${}</p>{}<p>Action: Price moved from above to below 200-Day MA.</p>",
                symbol, quote.previous_close, quote.price, ma_200_line
            ),
            once_per_day: config.mute_crossover_down,
        });
    }

    if quote.crossover_200_up_lookback {
        let date_line = quote
            .crossover_200_up_date
            .map(|date| format!("<p>Date: {}</p>", date))
            .unwrap_or_default();
        events.push(AlertEvent {
            symbol: symbol.clone(),
            kind: AlertKind::Ma200CrossoverUpLookback,
            subject: format!(
                "ALERT: {} Crossover Above 200-Day MA in last {} days!",
                symbol, lookback_days
            ),
            body_html: format!(
                "<p>Stock: {}</p><p>Action: Price crossed above 200-Day MA within last {} days.</p>{}",
                symbol, lookback_days, date_line
            ),
            once_per_day: config.mute_crossover_up,
        });
    }

    if quote.crossover_200_down_lookback {
        let date_line = quote
            .crossover_200_down_date
            .map(|date| format!("<p>Date: {}</p>", date))
            .unwrap_or_default();
        events.push(AlertEvent {
            symbol: symbol.clone(),
            kind: AlertKind::Ma200CrossoverDownLookback,
            subject: format!(
                "ALERT: {} Crossover Below 200-Day MA in last {} days!",
                symbol, lookback_days
            ),
            body_html: format!(
                "<p>Stock: {}</p><p>Action: Price crossed below 200-Day MA within last {} days.</p>{}",
                symbol, lookback_days, date_line
            ),
            once_per_day: config.mute_crossover_down,
        });
    }

    if let Some(volume) = quote.volume_comparison {
        if volume.abs() > config.volume_tolerance {
            events.push(AlertEvent {
                symbol: symbol.clone(),
                kind: AlertKind::Volume,
                subject: format!(
                    "Volume Comparison Alert: {}% > {}%",
                    volume, config.volume_tolerance
                ),
                body_html: format!(
                    "<p>Stock: {}</p><p>Volume Comparison to 20-Day Average: {}%</p><p>Tolerance: {}%</p>",
                    symbol, volume, config.volume_tolerance
                ),
                once_per_day: config.mute_volume,
            });
        }
    }

    if quote.change_percent.abs() > config.price_change_tolerance {
        events.push(AlertEvent {
            symbol: symbol.clone(),
            kind: AlertKind::PriceChange,
            subject: format!(
                "Price Change Alert: {}% > {}%",
                quote.change_percent, config.price_change_tolerance
            ),
            body_html: format!(
                "<p>Stock: {}</p><p>Percent Change: {}%</p><p>Tolerance: {}%</p>",
                symbol, quote.change_percent, config.price_change_tolerance
            ),
            once_per_day: config.mute_price_change,
        });
    }

    events
}

/// Cooldown and mute bookkeeping for dispatched alerts, keyed by
/// symbol and alert kind. Owned by the caller; nothing here is global.
#[derive(Debug, Default)]
pub struct AlertThrottle {
    last_sent: HashMap<String, DateTime<Utc>>,
    muted_until: HashMap<String, DateTime<Utc>>,
}

impl AlertThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether an alert may be dispatched at `now`, recording the
    /// send when permitted. A muted alert whose once-per-day switch has
    /// since been turned off is unmuted and re-evaluated from scratch.
    pub fn permit(
        &mut self,
        symbol: &str,
        kind: AlertKind,
        once_per_day: bool,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        let key = format!("{}_{}", symbol, kind.as_str());

        if let Some(&until) = self.muted_until.get(&key) {
            if until > now {
                if once_per_day {
                    tracing::debug!("Alert {} is muted until {}", key, until);
                    return false;
                }
                self.muted_until.remove(&key);
                self.last_sent.remove(&key);
                tracing::debug!("Alert {} manually unmuted", key);
            }
        }

        if let Some(&last) = self.last_sent.get(&key) {
            if now - last <= cooldown {
                tracing::debug!("Alert {} throttled", key);
                return false;
            }
        }

        self.last_sent.insert(key.clone(), now);
        if once_per_day {
            let midnight = (now.date_naive() + Duration::days(1))
                .and_time(NaiveTime::MIN)
                .and_utc();
            self.muted_until.insert(key, midnight);
        } else {
            self.muted_until.remove(&key);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{
        AnalysisResult, CalendarEvents, ChartSeries, QuoteAnalysis, Section,
    };
    use chrono::TimeZone;

    fn quote() -> QuoteAnalysis {
        QuoteAnalysis {
            price: 100.0,
            open: 99.0,
            high: 101.0,
            low: 98.5,
            previous_close: 99.0,
            change: 1.0,
            change_percent: 1.01,
            price_sentiment: "Somewhat Bullish".to_string(),
            percent_from_50_day_ma: Some(5.0),
            percent_from_200_day_ma: Some(8.0),
            volume_comparison: Some(10.0),
            crossover_200_up: false,
            crossover_200_down: false,
            crossover_200_up_lookback: false,
            crossover_200_up_date: None,
            crossover_200_down_lookback: false,
            crossover_200_down_date: None,
        }
    }

    fn result_with(quote: QuoteAnalysis) -> AnalysisResult {
        AnalysisResult {
            symbol: "NVDA".to_string(),
            company_name: "NVIDIA Corporation".to_string(),
            company_name_error: None,
            generated_at: Utc::now(),
            quote: Section::Ok { data: quote },
            sma_50: Section::Ok { data: 95.0 },
            sma_200: Section::Ok { data: 92.0 },
            volume: Section::Failed {
                error: "skipped".to_string(),
            },
            news: Section::Failed {
                error: "skipped".to_string(),
            },
            chart: ChartSeries::default(),
            events: CalendarEvents::default(),
        }
    }

    #[test]
    fn ma_band_is_inclusive() {
        let mut q = quote();
        q.percent_from_50_day_ma = Some(-1.0);
        q.percent_from_200_day_ma = Some(1.0);
        let config = AlertConfig::default();

        let events = evaluate(&result_with(q), &config, 1);

        let kinds: Vec<AlertKind> = events.iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&AlertKind::Ma50));
        assert!(kinds.contains(&AlertKind::Ma200));
    }

    #[test]
    fn volume_and_price_change_are_strict() {
        let mut q = quote();
        q.volume_comparison = Some(20.0);
        q.change_percent = 5.0;
        let config = AlertConfig::default();

        let events = evaluate(&result_with(q), &config, 1);

        assert!(events.iter().all(|e| e.kind != AlertKind::Volume));
        assert!(events.iter().all(|e| e.kind != AlertKind::PriceChange));

        let mut q = quote();
        q.volume_comparison = Some(-20.01);
        q.change_percent = -5.01;
        let events = evaluate(&result_with(q), &config, 1);

        let kinds: Vec<AlertKind> = events.iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&AlertKind::Volume));
        assert!(kinds.contains(&AlertKind::PriceChange));
    }

    #[test]
    fn lookback_crossover_carries_date() {
        let mut q = quote();
        q.crossover_200_up_lookback = true;
        q.crossover_200_up_date = chrono::NaiveDate::from_ymd_opt(2024, 3, 8);
        let config = AlertConfig::default();

        let events = evaluate(&result_with(q), &config, 30);

        let event = events
            .iter()
            .find(|e| e.kind == AlertKind::Ma200CrossoverUpLookback)
            .unwrap();
        assert!(event.subject.contains("last 30 days"));
        assert!(event.body_html.contains("2024-03-08"));
    }

    #[test]
    fn failed_quote_section_fires_nothing() {
        let mut result = result_with(quote());
        result.quote = Section::Failed {
            error: "quote unavailable".to_string(),
        };

        assert!(evaluate(&result, &AlertConfig::default(), 1).is_empty());
    }

    #[test]
    fn cooldown_denies_at_and_below_boundary() {
        let mut throttle = AlertThrottle::new();
        let start = Utc.with_ymd_and_hms(2024, 3, 11, 12, 0, 0).unwrap();
        let cooldown = Duration::seconds(60);

        assert!(throttle.permit("NVDA", AlertKind::Ma50, false, cooldown, start));
        assert!(!throttle.permit(
            "NVDA",
            AlertKind::Ma50,
            false,
            cooldown,
            start + Duration::seconds(60)
        ));
        assert!(throttle.permit(
            "NVDA",
            AlertKind::Ma50,
            false,
            cooldown,
            start + Duration::seconds(61)
        ));
    }

    #[test]
    fn throttle_keys_are_per_symbol_and_kind() {
        let mut throttle = AlertThrottle::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 11, 12, 0, 0).unwrap();
        let cooldown = Duration::seconds(300);

        assert!(throttle.permit("NVDA", AlertKind::Ma50, false, cooldown, now));
        assert!(throttle.permit("NVDA", AlertKind::Volume, false, cooldown, now));
        assert!(throttle.permit("MSFT", AlertKind::Ma50, false, cooldown, now));
    }

    #[test]
    fn once_per_day_mutes_until_utc_midnight() {
        let mut throttle = AlertThrottle::new();
        let noon = Utc.with_ymd_and_hms(2024, 3, 11, 12, 0, 0).unwrap();
        let cooldown = Duration::seconds(1);

        assert!(throttle.permit("NVDA", AlertKind::Ma200, true, cooldown, noon));
        assert!(!throttle.permit(
            "NVDA",
            AlertKind::Ma200,
            true,
            cooldown,
            Utc.with_ymd_and_hms(2024, 3, 11, 23, 59, 59).unwrap()
        ));
        assert!(throttle.permit(
            "NVDA",
            AlertKind::Ma200,
            true,
            cooldown,
            Utc.with_ymd_and_hms(2024, 3, 12, 0, 0, 0).unwrap()
        ));
    }

    #[test]
    fn clearing_once_per_day_unmutes_immediately() {
        let mut throttle = AlertThrottle::new();
        let noon = Utc.with_ymd_and_hms(2024, 3, 11, 12, 0, 0).unwrap();
        let cooldown = Duration::seconds(300);

        assert!(throttle.permit("NVDA", AlertKind::Ma200, true, cooldown, noon));
        // Still the same day and inside the cooldown, but the mute switch
        // is off, so state resets and the alert goes out again.
        assert!(throttle.permit(
            "NVDA",
            AlertKind::Ma200,
            false,
            cooldown,
            noon + Duration::seconds(10)
        ));
    }

    #[test]
    fn short_cooldown_falls_back_to_default() {
        let config = AlertConfig {
            cooldown_secs: 0.5,
            ..AlertConfig::default()
        };
        assert_eq!(config.cooldown(), Duration::seconds(300));

        let config = AlertConfig {
            cooldown_secs: 2.0,
            ..AlertConfig::default()
        };
        assert_eq!(config.cooldown(), Duration::seconds(2));
    }
}

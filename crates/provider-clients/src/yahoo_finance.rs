use std::time::Duration;

use analysis_core::{
    AnalysisError, CalendarEvent, CalendarEventKind, CalendarEvents, DailyClose, NewsArticle,
    ProviderClient, Quote, VolumeStats,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveTime, Utc};
use reqwest::Client;
use serde_json::Value;

use crate::pacing::Pacer;

const BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance";
const CHART_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";

pub struct YahooFinanceClient {
    client: Client,
    pacer: Pacer,
}

struct DailyBar {
    date: NaiveDate,
    close: f64,
    volume: f64,
}

impl YahooFinanceClient {
    pub fn new() -> Self {
        // Yahoo rejects requests without a browser user agent.
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .timeout(Duration::from_secs(90))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            pacer: Pacer::from_env("YAHOO_PACING_MS", 1_000),
        }
    }

    async fn get_json(&self, url: &str) -> Result<Value, AnalysisError> {
        self.pacer.pace().await;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AnalysisError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::Upstream(format!(
                "HTTP {}: {}",
                status,
                response.text().await.unwrap_or_default()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AnalysisError::Upstream(e.to_string()))
    }

    async fn quote_result(&self, symbol: &str) -> Result<Value, AnalysisError> {
        let url = format!("{}/quote?symbols={}", BASE_URL, symbol);
        let json = self.get_json(&url).await?;

        json.get("quoteResponse")
            .and_then(|v| v.get("result"))
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .cloned()
            .ok_or_else(|| AnalysisError::Upstream(format!("No quote data found for {}", symbol)))
    }

    async fn daily_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyBar>, AnalysisError> {
        let period1 = from.and_time(NaiveTime::MIN).and_utc().timestamp();
        let period2 = (to + ChronoDuration::days(1))
            .and_time(NaiveTime::MIN)
            .and_utc()
            .timestamp();
        let url = format!(
            "{}/{}?period1={}&period2={}&interval=1d",
            CHART_URL, symbol, period1, period2
        );
        let json = self.get_json(&url).await?;
        parse_chart_bars(&json, symbol)
    }
}

impl Default for YahooFinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderClient for YahooFinanceClient {
    fn name(&self) -> &'static str {
        "yfinance"
    }

    async fn get_overview(&self, symbol: &str) -> Result<String, AnalysisError> {
        tracing::debug!("Fetching overview for {} with Yahoo Finance", symbol);
        let result = self.quote_result(symbol).await?;

        result
            .get("longName")
            .or_else(|| result.get("shortName"))
            .and_then(|v| v.as_str())
            .map(|name| name.to_string())
            .ok_or_else(|| {
                AnalysisError::Upstream(format!("No overview data available for {}", symbol))
            })
    }

    async fn get_quote(&self, symbol: &str) -> Result<Quote, AnalysisError> {
        tracing::debug!("Fetching quote for {} with Yahoo Finance", symbol);
        let result = self.quote_result(symbol).await?;

        let price = result
            .get("regularMarketPrice")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| {
                AnalysisError::Upstream(format!("No quote data available for {}", symbol))
            })?;
        let previous_close = result
            .get("regularMarketPreviousClose")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        let divisor = if previous_close != 0.0 {
            previous_close
        } else {
            1.0
        };

        Ok(Quote {
            price,
            open: result
                .get("regularMarketOpen")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0),
            high: result
                .get("regularMarketDayHigh")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0),
            low: result
                .get("regularMarketDayLow")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0),
            previous_close,
            change: price - previous_close,
            change_percent: (price - previous_close) / divisor * 100.0,
        })
    }

    async fn get_sma(&self, symbol: &str, period: u32) -> Result<f64, AnalysisError> {
        let field = match period {
            50 => "fiftyDayAverage",
            200 => "twoHundredDayAverage",
            other => {
                return Err(AnalysisError::Unsupported(format!(
                    "{}-day SMA not published by Yahoo Finance",
                    other
                )))
            }
        };

        tracing::debug!("Fetching {}-day SMA for {} with Yahoo Finance", period, symbol);
        let result = self.quote_result(symbol).await?;
        result.get(field).and_then(|v| v.as_f64()).ok_or_else(|| {
            AnalysisError::Upstream(format!("No {}-day SMA for {}", period, symbol))
        })
    }

    async fn get_average_volume(&self, symbol: &str) -> Result<VolumeStats, AnalysisError> {
        tracing::debug!("Fetching daily volumes for {} with Yahoo Finance", symbol);
        let today = Utc::now().date_naive();
        let bars = self
            .daily_bars(symbol, today - ChronoDuration::days(60), today)
            .await?;

        // Newest first, capped at the 20 most recent bars.
        let volumes: Vec<f64> = bars.iter().rev().take(20).map(|b| b.volume).collect();
        if volumes.is_empty() {
            return Err(AnalysisError::Upstream(format!(
                "No volume data for {}",
                symbol
            )));
        }

        Ok(VolumeStats {
            average: volumes.iter().sum::<f64>() / volumes.len() as f64,
            most_recent: volumes[0],
        })
    }

    async fn get_news_sentiment(
        &self,
        _symbol: &str,
        _from: NaiveDate,
        _to: NaiveDate,
    ) -> Result<Vec<NewsArticle>, AnalysisError> {
        Err(AnalysisError::Unsupported(
            "News sentiment not available from Yahoo Finance".to_string(),
        ))
    }

    async fn get_historical_closes(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyClose>, AnalysisError> {
        tracing::debug!("Fetching daily history for {} with Yahoo Finance", symbol);
        let bars = self.daily_bars(symbol, from, to).await?;
        Ok(bars
            .into_iter()
            .map(|bar| DailyClose {
                date: bar.date,
                close: bar.close,
            })
            .collect())
    }

    async fn get_calendar_events(&self, symbol: &str) -> Result<CalendarEvents, AnalysisError> {
        tracing::debug!("Fetching calendar events for {} with Yahoo Finance", symbol);
        let url = format!("{}/{}?modules=calendarEvents", SUMMARY_URL, symbol);
        let json = self.get_json(&url).await?;

        let calendar = json
            .get("quoteSummary")
            .and_then(|v| v.get("result"))
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|v| v.get("calendarEvents"))
            .ok_or_else(|| {
                AnalysisError::Upstream(format!("No calendar events found for {}", symbol))
            })?;

        Ok(classify_calendar(calendar, Utc::now().date_naive()))
    }
}

/// Zip the chart arrays into daily bars, skipping rows with null closes
fn parse_chart_bars(json: &Value, symbol: &str) -> Result<Vec<DailyBar>, AnalysisError> {
    let chart = json
        .get("chart")
        .and_then(|v| v.get("result"))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| AnalysisError::Upstream(format!("No chart data found for {}", symbol)))?;

    let timestamps = chart
        .get("timestamp")
        .and_then(|v| v.as_array())
        .ok_or_else(|| AnalysisError::Upstream(format!("No timestamps for {}", symbol)))?;

    let quote = chart
        .get("indicators")
        .and_then(|v| v.get("quote"))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| AnalysisError::Upstream(format!("No quote series for {}", symbol)))?;

    let closes = quote.get("close").and_then(|v| v.as_array());
    let volumes = quote.get("volume").and_then(|v| v.as_array());

    let mut bars = Vec::new();
    for (i, ts) in timestamps.iter().enumerate() {
        let ts = match ts.as_i64() {
            Some(ts) => ts,
            None => continue,
        };
        let close = match closes.and_then(|arr| arr.get(i)).and_then(|v| v.as_f64()) {
            Some(close) => close,
            None => continue,
        };
        let date = match DateTime::from_timestamp(ts, 0) {
            Some(dt) => dt.date_naive(),
            None => continue,
        };
        let volume = volumes
            .and_then(|arr| arr.get(i))
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        bars.push(DailyBar {
            date,
            close,
            volume,
        });
    }
    Ok(bars)
}

/// Bucket earnings and ex-dividend dates around today: upcoming covers
/// today through +90 days ascending, recent past covers the 90 days
/// before today descending. A date falling on today counts as upcoming.
fn classify_calendar(calendar: &Value, today: NaiveDate) -> CalendarEvents {
    let mut events = CalendarEvents::default();

    if let Some(dates) = calendar
        .get("earnings")
        .and_then(|v| v.get("earningsDate"))
        .and_then(|v| v.as_array())
    {
        for value in dates {
            if let Some(date) = event_date(value) {
                push_event(&mut events, CalendarEventKind::Earnings, date, today);
            }
        }
    }

    if let Some(date) = calendar.get("exDividendDate").and_then(event_date) {
        push_event(&mut events, CalendarEventKind::ExDividend, date, today);
    }

    events.upcoming.sort_by_key(|e| e.date);
    events.recent_past.sort_by_key(|e| std::cmp::Reverse(e.date));
    events
}

/// Dates arrive either as { raw, fmt } objects, bare unix seconds, or
/// ISO strings depending on the endpoint flavor
fn event_date(value: &Value) -> Option<NaiveDate> {
    let raw = value.get("raw").unwrap_or(value);
    if let Some(ts) = raw.as_i64() {
        return DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive());
    }
    raw.as_str()
        .and_then(|s| s.get(..10))
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

fn push_event(
    events: &mut CalendarEvents,
    kind: CalendarEventKind,
    date: NaiveDate,
    today: NaiveDate,
) {
    let horizon = today + ChronoDuration::days(90);
    let floor = today - ChronoDuration::days(90);
    if date >= today && date <= horizon {
        events.upcoming.push(CalendarEvent { kind, date });
    } else if date > floor && date < today {
        events.recent_past.push(CalendarEvent { kind, date });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn unix(d: NaiveDate) -> i64 {
        d.and_time(NaiveTime::MIN).and_utc().timestamp()
    }

    #[test]
    fn chart_bars_skip_null_closes() {
        let json = json!({
            "chart": {
                "result": [{
                    "timestamp": [unix(date(2024, 3, 11)), unix(date(2024, 3, 12)), unix(date(2024, 3, 13))],
                    "indicators": {
                        "quote": [{
                            "close": [100.0, null, 102.0],
                            "volume": [1000.0, null, 1200.0]
                        }]
                    }
                }]
            }
        });
        let bars = parse_chart_bars(&json, "NVDA").unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, date(2024, 3, 11));
        assert!((bars[1].close - 102.0).abs() < 0.001);
        assert!((bars[1].volume - 1200.0).abs() < 0.001);
    }

    #[test]
    fn chart_without_result_is_an_error() {
        let json = json!({ "chart": { "result": [] } });
        assert!(parse_chart_bars(&json, "NVDA").is_err());
    }

    #[test]
    fn calendar_buckets_events_around_today() {
        let today = date(2024, 3, 13);
        let calendar = json!({
            "earnings": {
                "earningsDate": [
                    { "raw": unix(date(2024, 5, 22)) },
                    { "raw": unix(date(2024, 2, 21)) }
                ]
            },
            "exDividendDate": { "raw": unix(date(2024, 3, 13)) }
        });
        let events = classify_calendar(&calendar, today);

        assert_eq!(events.upcoming.len(), 2);
        // Today's ex-dividend date counts as upcoming and sorts first.
        assert_eq!(events.upcoming[0].kind, CalendarEventKind::ExDividend);
        assert_eq!(events.upcoming[0].date, today);
        assert_eq!(events.upcoming[1].kind, CalendarEventKind::Earnings);

        assert_eq!(events.recent_past.len(), 1);
        assert_eq!(events.recent_past[0].date, date(2024, 2, 21));
    }

    #[test]
    fn calendar_ignores_events_beyond_ninety_days() {
        let today = date(2024, 3, 13);
        let calendar = json!({
            "earnings": {
                "earningsDate": [
                    { "raw": unix(date(2024, 6, 12)) },
                    { "raw": unix(date(2023, 12, 1)) }
                ]
            }
        });
        let events = classify_calendar(&calendar, today);
        // Both fall outside the +/- 90 day windows (91 and 103 days out).
        assert!(events.upcoming.is_empty());
        assert!(events.recent_past.is_empty());
    }

    #[test]
    fn recent_past_sorts_descending() {
        let today = date(2024, 3, 13);
        let calendar = json!({
            "earnings": {
                "earningsDate": [
                    { "raw": unix(date(2024, 1, 10)) },
                    { "raw": unix(date(2024, 2, 21)) }
                ]
            }
        });
        let events = classify_calendar(&calendar, today);
        assert_eq!(events.recent_past.len(), 2);
        assert!(events.recent_past[0].date > events.recent_past[1].date);
    }

    #[test]
    fn event_date_accepts_raw_objects_and_strings() {
        let from_raw = event_date(&json!({ "raw": unix(date(2024, 3, 13)) }));
        assert_eq!(from_raw, Some(date(2024, 3, 13)));

        let from_string = event_date(&json!("2024-03-13T00:00:00Z"));
        assert_eq!(from_string, Some(date(2024, 3, 13)));

        assert_eq!(event_date(&json!({ "fmt": true })), None);
    }
}

use std::time::Duration;

use analysis_core::{
    AnalysisError, CalendarEvents, DailyClose, NewsArticle, ProviderClient, Quote, VolumeStats,
};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::pacing::Pacer;

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Extra attempts for the news feed, which the free tier drops regularly
const NEWS_RETRIES: u32 = 2;

pub struct AlphaVantageClient {
    api_key: String,
    client: Client,
    pacer: Pacer,
}

impl AlphaVantageClient {
    pub fn new(api_key: String) -> Self {
        // Free tier allows 5 requests/minute, so space calls 12s apart.
        // Premium keys can lower ALPHA_VANTAGE_PACING_MS.
        let client = Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_key,
            client,
            pacer: Pacer::from_env("ALPHA_VANTAGE_PACING_MS", 12_000),
        }
    }

    async fn get_json(&self, query: &[(&str, &str)]) -> Result<Value, AnalysisError> {
        self.pacer.pace().await;

        let response = self
            .client
            .get(BASE_URL)
            .query(query)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| AnalysisError::Upstream(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AnalysisError::MissingCredential(format!(
                "Access denied (HTTP {}). Check ALPHA_VANTAGE_API_KEY or free tier limits",
                status.as_u16()
            )));
        }
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
}

#[async_trait]
impl ProviderClient for AlphaVantageClient {
    fn name(&self) -> &'static str {
        "alpha_vantage"
    }

    async fn get_overview(&self, symbol: &str) -> Result<String, AnalysisError> {
        tracing::debug!("Fetching overview for {} with Alpha Vantage", symbol);
        let body = self
            .get_json(&[("function", "OVERVIEW"), ("symbol", symbol)])
            .await?;

        body.get("Name")
            .and_then(|v| v.as_str())
            .map(|name| name.to_string())
            .ok_or_else(|| {
                missing_data_error(&body, format!("No overview data returned for {}", symbol))
            })
    }

    async fn get_quote(&self, symbol: &str) -> Result<Quote, AnalysisError> {
        tracing::debug!("Fetching quote for {} with Alpha Vantage", symbol);
        let body = self
            .get_json(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol)])
            .await?;

        let quote = body
            .get("Global Quote")
            .and_then(|v| v.as_object())
            .filter(|map| !map.is_empty())
            .ok_or_else(|| missing_data_error(&body, format!("No quote data for {}", symbol)))?;

        parse_global_quote(quote).ok_or_else(|| {
            AnalysisError::Upstream(format!("Malformed quote payload for {}", symbol))
        })
    }

    async fn get_sma(&self, symbol: &str, period: u32) -> Result<f64, AnalysisError> {
        tracing::debug!("Fetching {}-day SMA for {} with Alpha Vantage", period, symbol);
        let period_param = period.to_string();
        let body = self
            .get_json(&[
                ("function", "SMA"),
                ("symbol", symbol),
                ("interval", "daily"),
                ("time_period", period_param.as_str()),
                ("series_type", "close"),
            ])
            .await?;

        body.get("Technical Analysis: SMA")
            .and_then(|v| v.as_object())
            .and_then(latest_sma_value)
            .ok_or_else(|| {
                missing_data_error(
                    &body,
                    format!("No SMA data for {} (period: {})", symbol, period),
                )
            })
    }

    async fn get_average_volume(&self, symbol: &str) -> Result<VolumeStats, AnalysisError> {
        tracing::debug!("Fetching daily volumes for {} with Alpha Vantage", symbol);
        let body = self
            .get_json(&[("function", "TIME_SERIES_DAILY"), ("symbol", symbol)])
            .await?;

        body.get("Time Series (Daily)")
            .and_then(|v| v.as_object())
            .and_then(volume_stats_from_series)
            .ok_or_else(|| missing_data_error(&body, format!("No daily data for {}", symbol)))
    }

    async fn get_news_sentiment(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NewsArticle>, AnalysisError> {
        let time_from = format!("{}T0000", from.format("%Y%m%d"));
        let time_to = format!("{}T2359", to.format("%Y%m%d"));

        let mut last_error =
            AnalysisError::Upstream(format!("No news sentiment data for {}", symbol));
        for attempt in 0..=NEWS_RETRIES {
            tracing::debug!(
                "Fetching news sentiment for {} with Alpha Vantage, attempt {}",
                symbol,
                attempt + 1
            );
            let result = self
                .get_json(&[
                    ("function", "NEWS_SENTIMENT"),
                    ("tickers", symbol),
                    ("time_from", time_from.as_str()),
                    ("time_to", time_to.as_str()),
                    ("limit", "1000"),
                ])
                .await;

            match result {
                Ok(body) => {
                    // An empty feed is a data gap, not a transient fault;
                    // retrying it would just burn quota.
                    return match body.get("feed").and_then(|v| v.as_array()) {
                        Some(feed) if !feed.is_empty() => Ok(parse_news_feed(feed, symbol)),
                        _ => Err(missing_data_error(
                            &body,
                            format!(
                                "No news sentiment data for {} from {} to {}",
                                symbol, from, to
                            ),
                        )),
                    };
                }
                Err(err @ AnalysisError::MissingCredential(_)) => return Err(err),
                Err(err) => {
                    if attempt < NEWS_RETRIES {
                        tracing::warn!(
                            "Retry {}/{} for {} news: {}",
                            attempt + 1,
                            NEWS_RETRIES,
                            symbol,
                            err
                        );
                    }
                    last_error = err;
                }
            }
        }
        Err(last_error)
    }

    async fn get_historical_closes(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyClose>, AnalysisError> {
        tracing::debug!("Fetching daily history for {} with Alpha Vantage", symbol);
        let body = self
            .get_json(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol),
                ("outputsize", "full"),
            ])
            .await?;

        match body.get("Time Series (Daily)").and_then(|v| v.as_object()) {
            Some(series) => Ok(closes_in_range(series, from, to)),
            None => Err(missing_data_error(
                &body,
                format!("No daily history for {}", symbol),
            )),
        }
    }

    async fn get_calendar_events(&self, _symbol: &str) -> Result<CalendarEvents, AnalysisError> {
        Err(AnalysisError::Unsupported(
            "Calendar events not available from Alpha Vantage".to_string(),
        ))
    }
}

/// Alpha Vantage reports throttling and bad symbols inside a 200 body
fn envelope_error(body: &Value) -> Option<&str> {
    body.get("Information")
        .or_else(|| body.get("Error Message"))
        .or_else(|| body.get("Note"))
        .and_then(|v| v.as_str())
}

fn missing_data_error(body: &Value, default: String) -> AnalysisError {
    match envelope_error(body) {
        Some(message) => AnalysisError::Upstream(message.to_string()),
        None => AnalysisError::Upstream(default),
    }
}

fn parse_global_quote(map: &serde_json::Map<String, Value>) -> Option<Quote> {
    // Every field arrives as a string; change percent carries a % suffix.
    let field = |key: &str| -> Option<f64> {
        map.get(key)?.as_str()?.trim_end_matches('%').parse().ok()
    };

    Some(Quote {
        price: field("05. price")?,
        open: field("02. open")?,
        high: field("03. high")?,
        low: field("04. low")?,
        previous_close: field("08. previous close")?,
        change: field("09. change")?,
        change_percent: field("10. change percent")?,
    })
}

/// The SMA payload is keyed by ISO date; take the newest entry
fn latest_sma_value(map: &serde_json::Map<String, Value>) -> Option<f64> {
    map.iter()
        .max_by(|a, b| a.0.cmp(b.0))
        .and_then(|(_, row)| row.get("SMA")?.as_str()?.parse().ok())
}

/// Average over the 20 most recent rows; most_recent is the newest row
fn volume_stats_from_series(map: &serde_json::Map<String, Value>) -> Option<VolumeStats> {
    let mut dates: Vec<&String> = map.keys().collect();
    dates.sort_by(|a, b| b.cmp(a));

    let volumes: Vec<f64> = dates
        .iter()
        .take(20)
        .filter_map(|date| map.get(*date)?.get("5. volume")?.as_str()?.parse().ok())
        .collect();
    if volumes.is_empty() {
        return None;
    }

    Some(VolumeStats {
        average: volumes.iter().sum::<f64>() / volumes.len() as f64,
        most_recent: volumes[0],
    })
}

/// Flatten feed entries into per-ticker articles for `symbol`. Entries
/// with unparseable timestamps or scores are dropped rather than failing
/// the whole feed.
fn parse_news_feed(feed: &[Value], symbol: &str) -> Vec<NewsArticle> {
    let mut articles = Vec::new();
    for entry in feed {
        let published = entry
            .get("time_published")
            .and_then(|v| v.as_str())
            .and_then(|s| NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S").ok());
        let published = match published {
            Some(published) => published,
            None => continue,
        };

        let tickers = match entry.get("ticker_sentiment").and_then(|v| v.as_array()) {
            Some(tickers) => tickers,
            None => continue,
        };

        for ticker in tickers {
            let name = ticker.get("ticker").and_then(|v| v.as_str());
            if name != Some(symbol) {
                continue;
            }
            let relevance = parse_score(ticker.get("relevance_score"));
            let sentiment = parse_score(ticker.get("ticker_sentiment_score"));
            if let (Some(relevance), Some(sentiment)) = (relevance, sentiment) {
                articles.push(NewsArticle {
                    published,
                    relevance,
                    sentiment,
                    symbol: symbol.to_string(),
                });
            }
        }
    }
    articles
}

/// Scores are serialized as strings; tolerate bare numbers too
fn parse_score(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Closes within the inclusive date range, ascending
fn closes_in_range(
    map: &serde_json::Map<String, Value>,
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<DailyClose> {
    let mut closes: Vec<DailyClose> = map
        .iter()
        .filter_map(|(date, row)| {
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
            if date < from || date > to {
                return None;
            }
            let close = row.get("4. close")?.as_str()?.parse().ok()?;
            Some(DailyClose { date, close })
        })
        .collect();
    closes.sort_by_key(|c| c.date);
    closes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_global_quote_strings() {
        let body = json!({
            "05. price": "131.2800",
            "02. open": "129.0000",
            "03. high": "132.5000",
            "04. low": "128.5000",
            "08. previous close": "130.0000",
            "09. change": "1.2800",
            "10. change percent": "0.9846%"
        });
        let quote = parse_global_quote(body.as_object().unwrap()).unwrap();
        assert!((quote.price - 131.28).abs() < 0.001);
        assert!((quote.previous_close - 130.0).abs() < 0.001);
        assert!((quote.change_percent - 0.9846).abs() < 0.0001);
    }

    #[test]
    fn global_quote_with_missing_field_is_rejected() {
        let body = json!({ "05. price": "131.2800" });
        assert!(parse_global_quote(body.as_object().unwrap()).is_none());
    }

    #[test]
    fn latest_sma_picks_newest_date() {
        let body = json!({
            "2024-03-11": { "SMA": "100.5000" },
            "2024-03-12": { "SMA": "101.2500" },
            "2024-03-08": { "SMA": "99.0000" }
        });
        let sma = latest_sma_value(body.as_object().unwrap()).unwrap();
        assert!((sma - 101.25).abs() < 0.001);
    }

    #[test]
    fn volume_stats_use_twenty_most_recent_rows() {
        let mut rows = serde_json::Map::new();
        for i in 1..=22 {
            rows.insert(
                format!("2024-03-{:02}", i),
                json!({ "5. volume": format!("{}", i * 100) }),
            );
        }
        let stats = volume_stats_from_series(&rows).unwrap();
        // Rows 3..=22 survive; the newest row is 2200.
        assert!((stats.most_recent - 2200.0).abs() < 0.001);
        assert!((stats.average - 1250.0).abs() < 0.001);
    }

    #[test]
    fn news_feed_flattens_to_requested_ticker_only() {
        let feed = vec![json!({
            "time_published": "20240312T133000",
            "ticker_sentiment": [
                { "ticker": "NVDA", "relevance_score": "0.8", "ticker_sentiment_score": "0.25" },
                { "ticker": "AMD", "relevance_score": "0.4", "ticker_sentiment_score": "-0.1" }
            ]
        })];
        let articles = parse_news_feed(&feed, "NVDA");
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].symbol, "NVDA");
        assert!((articles[0].relevance - 0.8).abs() < 0.001);
        assert!((articles[0].sentiment - 0.25).abs() < 0.001);
        assert_eq!(
            articles[0].published.date(),
            NaiveDate::from_ymd_opt(2024, 3, 12).unwrap()
        );
    }

    #[test]
    fn news_entries_with_bad_timestamps_are_dropped() {
        let feed = vec![
            json!({
                "time_published": "not-a-date",
                "ticker_sentiment": [
                    { "ticker": "NVDA", "relevance_score": "0.8", "ticker_sentiment_score": "0.2" }
                ]
            }),
            json!({
                "time_published": "20240312T090000",
                "ticker_sentiment": [
                    { "ticker": "NVDA", "relevance_score": 0.6, "ticker_sentiment_score": 0.1 }
                ]
            }),
        ];
        let articles = parse_news_feed(&feed, "NVDA");
        assert_eq!(articles.len(), 1);
        assert!((articles[0].relevance - 0.6).abs() < 0.001);
    }

    #[test]
    fn closes_filter_to_range_and_sort_ascending() {
        let body = json!({
            "2024-03-12": { "4. close": "103.0" },
            "2024-03-08": { "4. close": "101.0" },
            "2024-03-11": { "4. close": "102.0" },
            "2024-02-01": { "4. close": "90.0" }
        });
        let closes = closes_in_range(
            body.as_object().unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 12).unwrap(),
        );
        assert_eq!(closes.len(), 3);
        assert!(closes.windows(2).all(|w| w[0].date < w[1].date));
        assert!((closes[0].close - 101.0).abs() < 0.001);
        assert!((closes[2].close - 103.0).abs() < 0.001);
    }

    #[test]
    fn envelope_error_prefers_information_field() {
        let body = json!({
            "Information": "Thank you for using Alpha Vantage! Our standard API rate limit is 25 requests per day."
        });
        let err = missing_data_error(&body, "default".to_string());
        match err {
            AnalysisError::Upstream(message) => assert!(message.contains("rate limit")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}

use std::time::Duration;

use analysis_core::{
    AnalysisError, CalendarEvents, DailyClose, NewsArticle, ProviderClient, Quote, VolumeStats,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::pacing::Pacer;

const BASE_URL: &str = "https://api.polygon.io";

pub struct PolygonClient {
    api_key: String,
    client: Client,
    pacer: Pacer,
}

impl PolygonClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_key,
            client,
            pacer: Pacer::from_env("POLYGON_PACING_MS", 1_000),
        }
    }

    /// Send a paced request with automatic 429 retry
    async fn send_request(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, AnalysisError> {
        let request = builder
            .build()
            .map_err(|e| AnalysisError::Upstream(e.to_string()))?;

        for attempt in 0..3u32 {
            self.pacer.pace().await;
            let cloned = request
                .try_clone()
                .ok_or_else(|| AnalysisError::Upstream("Cannot clone request".to_string()))?;
            let response = self
                .client
                .execute(cloned)
                .await
                .map_err(|e| AnalysisError::Upstream(e.to_string()))?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            let wait_secs = 15u64;
            tracing::warn!(
                "Polygon 429 rate limited, waiting {}s before retry {}/3",
                wait_secs,
                attempt + 1
            );
            tokio::time::sleep(Duration::from_secs(wait_secs)).await;
        }

        Err(AnalysisError::Upstream(
            "Rate limited by Polygon after 3 retries".to_string(),
        ))
    }

    async fn get_parsed<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, AnalysisError> {
        let response = self
            .send_request(
                self.client
                    .get(url)
                    .query(query)
                    .query(&[("apiKey", self.api_key.as_str())]),
            )
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AnalysisError::MissingCredential(format!(
                "Access denied (HTTP {}). Check POLYGON_API_KEY",
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
            .json::<T>()
            .await
            .map_err(|e| AnalysisError::Upstream(e.to_string()))
    }

    async fn daily_aggregates(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
        limit: u32,
    ) -> Result<Vec<AggregateBar>, AnalysisError> {
        let url = format!(
            "{}/v2/aggs/ticker/{}/range/1/day/{}/{}",
            BASE_URL,
            symbol,
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        );
        let limit_param = limit.to_string();
        let response: AggregateResponse = self
            .get_parsed(&url, &[("adjusted", "true"), ("limit", limit_param.as_str())])
            .await?;
        Ok(response.results)
    }
}

#[async_trait]
impl ProviderClient for PolygonClient {
    fn name(&self) -> &'static str {
        "polygon"
    }

    async fn get_overview(&self, symbol: &str) -> Result<String, AnalysisError> {
        tracing::debug!("Fetching overview for {} with Polygon.io", symbol);
        let url = format!("{}/v3/reference/tickers/{}", BASE_URL, symbol);
        let response: TickerDetailsResponse = self.get_parsed(&url, &[]).await?;

        response
            .results
            .map(|details| details.name)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                AnalysisError::Upstream(format!("No overview data returned for {}", symbol))
            })
    }

    async fn get_quote(&self, symbol: &str) -> Result<Quote, AnalysisError> {
        tracing::debug!("Fetching quote for {} with Polygon.io", symbol);
        let today = Utc::now().date_naive();
        let bars = self
            .daily_aggregates(symbol, today - ChronoDuration::days(14), today, 14)
            .await?;
        quote_from_bars(&bars, symbol)
    }

    async fn get_sma(&self, symbol: &str, period: u32) -> Result<f64, AnalysisError> {
        tracing::debug!("Fetching {}-day SMA for {} with Polygon.io", period, symbol);
        let today = Utc::now().date_naive();
        let bars = self
            .daily_aggregates(
                symbol,
                today - ChronoDuration::days(period as i64),
                today,
                period,
            )
            .await?;
        if bars.is_empty() {
            return Err(AnalysisError::Upstream(format!(
                "No SMA data returned for {}",
                symbol
            )));
        }

        let closes: Vec<f64> = bars.iter().take(period as usize).map(|b| b.c).collect();
        let sma = closes.iter().sum::<f64>() / closes.len() as f64;
        Ok((sma * 100.0).round() / 100.0)
    }

    async fn get_average_volume(&self, symbol: &str) -> Result<VolumeStats, AnalysisError> {
        tracing::debug!("Fetching daily volumes for {} with Polygon.io", symbol);
        let today = Utc::now().date_naive();
        let bars = self
            .daily_aggregates(symbol, today - ChronoDuration::days(20), today, 20)
            .await?;
        if bars.is_empty() {
            return Err(AnalysisError::Upstream(format!(
                "No volume data returned for {}",
                symbol
            )));
        }

        let volumes: Vec<f64> = bars.iter().map(|b| b.v).collect();
        Ok(VolumeStats {
            average: (volumes.iter().sum::<f64>() / volumes.len() as f64).round(),
            most_recent: volumes[volumes.len() - 1],
        })
    }

    async fn get_news_sentiment(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NewsArticle>, AnalysisError> {
        tracing::debug!("Fetching news for {} with Polygon.io", symbol);
        let url = format!("{}/v2/reference/news", BASE_URL);
        let gte = format!("{}T00:00:00Z", from.format("%Y-%m-%d"));
        let lte = format!("{}T23:59:59Z", to.format("%Y-%m-%d"));
        let response: NewsResponse = self
            .get_parsed(
                &url,
                &[
                    ("ticker", symbol),
                    ("published_utc.gte", gte.as_str()),
                    ("published_utc.lte", lte.as_str()),
                    ("limit", "1000"),
                ],
            )
            .await?;

        if response.results.is_empty() {
            return Err(AnalysisError::Upstream(format!(
                "No news sentiment data returned for {}",
                symbol
            )));
        }
        Ok(articles_from_news(&response.results, symbol))
    }

    async fn get_historical_closes(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyClose>, AnalysisError> {
        tracing::debug!("Fetching daily history for {} with Polygon.io", symbol);
        let bars = self.daily_aggregates(symbol, from, to, 50_000).await?;

        Ok(bars
            .iter()
            .filter_map(|bar| {
                DateTime::from_timestamp_millis(bar.t).map(|dt| DailyClose {
                    date: dt.date_naive(),
                    close: bar.c,
                })
            })
            .collect())
    }

    async fn get_calendar_events(&self, _symbol: &str) -> Result<CalendarEvents, AnalysisError> {
        Err(AnalysisError::Unsupported(
            "Calendar events not available from Polygon.io".to_string(),
        ))
    }
}

/// Quote from the last two daily aggregates: the newest bar supplies the
/// price and the one before it the previous close
fn quote_from_bars(bars: &[AggregateBar], symbol: &str) -> Result<Quote, AnalysisError> {
    if bars.len() < 2 {
        return Err(AnalysisError::Upstream(format!(
            "Not enough aggregate data to quote {}",
            symbol
        )));
    }

    let latest = &bars[bars.len() - 1];
    let previous = &bars[bars.len() - 2];
    let divisor = if previous.c != 0.0 { previous.c } else { 1.0 };

    Ok(Quote {
        price: latest.c,
        open: latest.o,
        high: latest.h,
        low: latest.l,
        previous_close: previous.c,
        change: latest.c - previous.c,
        change_percent: (latest.c - previous.c) / divisor * 100.0,
    })
}

/// Polygon news carries no per-ticker scores, so articles mentioning the
/// symbol count as coverage with a flat mid relevance and neutral sentiment
fn articles_from_news(results: &[NewsItem], symbol: &str) -> Vec<NewsArticle> {
    results
        .iter()
        .filter(|item| item.tickers.iter().any(|t| t == symbol))
        .filter_map(|item| {
            let published = DateTime::parse_from_rfc3339(&item.published_utc).ok()?;
            Some(NewsArticle {
                published: published.naive_utc(),
                relevance: 0.5,
                sentiment: 0.0,
                symbol: symbol.to_string(),
            })
        })
        .collect()
}

// Response structures
#[derive(Debug, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    results: Vec<AggregateBar>,
}

#[derive(Debug, Deserialize)]
struct AggregateBar {
    t: i64, // timestamp (ms)
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    results: Vec<NewsItem>,
}

#[derive(Debug, Deserialize)]
struct NewsItem {
    published_utc: String,
    #[serde(default)]
    tickers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TickerDetailsResponse {
    results: Option<TickerDetails>,
}

#[derive(Debug, Deserialize)]
struct TickerDetails {
    name: String,
}

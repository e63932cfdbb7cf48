//! Runs the per-symbol analysis pipeline: fans out provider fetches,
//! derives indicators and sentiment locally, and assembles the result.

use std::cmp;
use std::sync::Arc;

use analysis_core::{
    validate_lookback_days, validate_symbol, AnalysisError, AnalysisResult, CalendarEvents,
    ChartSeries, DailyClose, NewsArticle, ProviderClient, QuoteAnalysis, Section, SymbolOutcome,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use dashmap::DashMap;
use provider_clients::{ProviderKind, ProviderRegistry};
use sentiment_aggregation::{aggregate, news_window};
use technical_indicators::{
    detect_crossovers, percent_from_ma, price_sentiment_label, same_day_crossover, sma_series,
    volume_comparison,
};

/// Internal cache entry with timestamp
struct CacheEntry<T> {
    data: T,
    cached_at: DateTime<Utc>,
}

/// Cached close history along with the range it was fetched for, so a
/// wider fetch can serve narrower requests.
struct HistoryEntry {
    from: NaiveDate,
    to: NaiveDate,
    closes: Vec<DailyClose>,
}

pub struct AnalysisOrchestrator {
    registry: Arc<ProviderRegistry>,
    /// Cache close history per (provider, symbol) (5-min TTL)
    history_cache: DashMap<String, CacheEntry<HistoryEntry>>,
    /// Cache news articles per (provider, symbol, window) (5-min TTL)
    news_cache: DashMap<String, CacheEntry<Vec<NewsArticle>>>,
}

const CACHE_TTL_SECS: i64 = 300; // 5 minutes

fn is_fresh<T>(entry: &CacheEntry<T>) -> bool {
    (Utc::now() - entry.cached_at).num_seconds() < CACHE_TTL_SECS
}

impl AnalysisOrchestrator {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            history_cache: DashMap::new(),
            news_cache: DashMap::new(),
        }
    }

    /// Analyze a single symbol through the given provider.
    ///
    /// Fails fast on an invalid symbol or lookback and on a provider with
    /// no configured credential. Upstream failures past that point degrade
    /// the affected section instead of failing the whole analysis.
    pub async fn analyze(
        &self,
        symbol: &str,
        kind: ProviderKind,
        lookback_days: u32,
    ) -> Result<AnalysisResult, AnalysisError> {
        let symbol = symbol.trim().to_uppercase();
        validate_symbol(&symbol)?;
        validate_lookback_days(lookback_days)?;
        let provider = self.registry.resolve(kind)?;
        self.run_analysis(provider, &symbol, lookback_days).await
    }

    /// Analyze a batch of symbols concurrently, all through the same
    /// provider. Outcomes come back in input order; one symbol failing
    /// never aborts the others.
    pub async fn analyze_batch(
        &self,
        symbols: &[String],
        kind: ProviderKind,
        lookback_days: u32,
    ) -> Vec<SymbolOutcome> {
        let tasks = symbols.iter().map(|symbol| async move {
            let normalized = symbol.trim().to_uppercase();
            match self.analyze(symbol, kind, lookback_days).await {
                Ok(result) => SymbolOutcome {
                    symbol: normalized,
                    data: Some(result),
                    error: None,
                },
                Err(err) => {
                    tracing::warn!("Analysis failed for {}: {}", normalized, err);
                    SymbolOutcome {
                        symbol: normalized,
                        data: None,
                        error: Some(err.to_string()),
                    }
                }
            }
        });

        futures_util::future::join_all(tasks).await
    }

    async fn run_analysis(
        &self,
        provider: Arc<dyn ProviderClient>,
        symbol: &str,
        lookback_days: u32,
    ) -> Result<AnalysisResult, AnalysisError> {
        tracing::info!(
            "Starting analysis for {} via {} (lookback: {} days)",
            symbol,
            provider.name(),
            lookback_days
        );

        let today = Utc::now().date_naive();
        let (news_from, news_to) = news_window(today);
        // Enough closes for a 200-day MA at every point of the crossover
        // window, and at least two years of chart context.
        let history_span = cmp::max(lookback_days as i64 + 200 + 365, 730 + 200);
        let history_from = today - Duration::days(history_span);

        let (overview, quote, sma_50, sma_200, volume, news, history, events) = tokio::join!(
            provider.get_overview(symbol),
            provider.get_quote(symbol),
            provider.get_sma(symbol, 50),
            provider.get_sma(symbol, 200),
            provider.get_average_volume(symbol),
            self.news(provider.as_ref(), symbol, news_from, news_to),
            self.history(provider.as_ref(), symbol, history_from, today),
            provider.get_calendar_events(symbol),
        );

        let (company_name, company_name_error) = match overview {
            Ok(name) => (name, None),
            Err(err) => {
                tracing::warn!("Company name unavailable for {}: {}", symbol, err);
                (symbol.to_string(), Some(err.to_string()))
            }
        };

        let closes = match history {
            Ok(closes) => closes,
            Err(err) => {
                tracing::warn!("Close history unavailable for {}: {}", symbol, err);
                Vec::new()
            }
        };
        let sma_50_series = sma_series(&closes, 50);
        let sma_200_series = sma_series(&closes, 200);
        let scan = detect_crossovers(&closes, &sma_200_series, today, lookback_days);

        let sma_50 = Section::from_result(sma_50);
        let sma_200 = Section::from_result(sma_200);
        let volume = Section::from_result(volume);

        let quote = match quote {
            Ok(quote) => {
                let sma_50_value = sma_50.data().copied();
                let sma_200_value = sma_200.data().copied();
                let (crossed_up, crossed_down) =
                    same_day_crossover(quote.previous_close, quote.price, sma_200_value);
                Section::Ok {
                    data: QuoteAnalysis {
                        price: quote.price,
                        open: quote.open,
                        high: quote.high,
                        low: quote.low,
                        previous_close: quote.previous_close,
                        change: quote.change,
                        change_percent: quote.change_percent,
                        price_sentiment: price_sentiment_label(quote.change_percent).to_string(),
                        percent_from_50_day_ma: percent_from_ma(quote.price, sma_50_value),
                        percent_from_200_day_ma: percent_from_ma(quote.price, sma_200_value),
                        volume_comparison: volume
                            .data()
                            .and_then(|v| volume_comparison(v.most_recent, Some(v.average))),
                        crossover_200_up: crossed_up,
                        crossover_200_down: crossed_down,
                        crossover_200_up_lookback: scan.up,
                        crossover_200_up_date: scan.up_date,
                        crossover_200_down_lookback: scan.down,
                        crossover_200_down_date: scan.down_date,
                    },
                }
            }
            Err(err) => Section::Failed {
                error: err.to_string(),
            },
        };

        let news = match news {
            Ok(articles) => Section::Ok {
                data: aggregate(symbol, &articles, today),
            },
            Err(AnalysisError::Unsupported(note)) => Section::Unsupported { note },
            Err(err) => Section::Failed {
                error: err.to_string(),
            },
        };

        let events = match events {
            Ok(events) => events,
            Err(AnalysisError::Unsupported(_)) => CalendarEvents::default(),
            Err(err) => {
                tracing::warn!("Calendar events unavailable for {}: {}", symbol, err);
                CalendarEvents::default()
            }
        };

        Ok(AnalysisResult {
            symbol: symbol.to_string(),
            company_name,
            company_name_error,
            generated_at: Utc::now(),
            quote,
            sma_50,
            sma_200,
            volume,
            news,
            chart: ChartSeries {
                prices: closes,
                sma_50: sma_50_series,
                sma_200: sma_200_series,
            },
            events,
        })
    }

    /// Fetch close history through the cache. A fresh entry fetched for a
    /// range covering the requested one is narrowed instead of refetched.
    async fn history(
        &self,
        provider: &dyn ProviderClient,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyClose>, AnalysisError> {
        let cache_key = format!("{}:{}", provider.name(), symbol);
        if let Some(entry) = self.history_cache.get(&cache_key) {
            if is_fresh(&entry) && entry.data.from <= from && entry.data.to >= to {
                tracing::debug!("History cache hit for {}", cache_key);
                return Ok(entry
                    .data
                    .closes
                    .iter()
                    .filter(|c| c.date >= from && c.date <= to)
                    .cloned()
                    .collect());
            }
        }

        let closes = provider.get_historical_closes(symbol, from, to).await?;
        self.history_cache.insert(
            cache_key,
            CacheEntry {
                data: HistoryEntry {
                    from,
                    to,
                    closes: closes.clone(),
                },
                cached_at: Utc::now(),
            },
        );
        Ok(closes)
    }

    /// Fetch news articles through the cache, keyed by the exact window.
    async fn news(
        &self,
        provider: &dyn ProviderClient,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NewsArticle>, AnalysisError> {
        let cache_key = format!("{}:{}:{}:{}", provider.name(), symbol, from, to);
        if let Some(entry) = self.news_cache.get(&cache_key) {
            if is_fresh(&entry) {
                tracing::debug!("News cache hit for {}", cache_key);
                return Ok(entry.data.clone());
            }
        }

        let articles = provider.get_news_sentiment(symbol, from, to).await?;
        self.news_cache.insert(
            cache_key,
            CacheEntry {
                data: articles.clone(),
                cached_at: Utc::now(),
            },
        );
        Ok(articles)
    }
}

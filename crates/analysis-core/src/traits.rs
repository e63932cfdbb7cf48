use crate::{AnalysisError, CalendarEvents, DailyClose, NewsArticle, Quote, VolumeStats};
use async_trait::async_trait;
use chrono::NaiveDate;

/// Trait for market data and news providers. Every operation fails on its
/// own; a provider that does not offer a capability returns
/// `AnalysisError::Unsupported` rather than an upstream failure so callers
/// can tell the two apart.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Stable provider id, e.g. "alpha_vantage".
    fn name(&self) -> &'static str;

    /// Company name for the symbol.
    async fn get_overview(&self, symbol: &str) -> Result<String, AnalysisError>;

    /// Latest quote.
    async fn get_quote(&self, symbol: &str) -> Result<Quote, AnalysisError>;

    /// Latest simple moving average over `period` trading days.
    async fn get_sma(&self, symbol: &str, period: u32) -> Result<f64, AnalysisError>;

    /// Average and most recent volume over the 20 most recent daily bars.
    async fn get_average_volume(&self, symbol: &str) -> Result<VolumeStats, AnalysisError>;

    /// Per-article relevance and sentiment for the date range, inclusive.
    async fn get_news_sentiment(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NewsArticle>, AnalysisError>;

    /// Daily close history for the date range, ascending by date.
    async fn get_historical_closes(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyClose>, AnalysisError>;

    /// Earnings and ex-dividend dates near today.
    async fn get_calendar_events(&self, symbol: &str) -> Result<CalendarEvents, AnalysisError>;
}

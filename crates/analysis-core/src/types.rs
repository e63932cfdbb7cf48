use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Latest quote as reported by a provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quote {
    pub price: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub previous_close: f64,
    pub change: f64,
    pub change_percent: f64,
}

/// One day of closing-price history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub close: f64,
}

/// One point of a moving-average series aligned to the close series.
/// `value` stays None until the window has enough history behind it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaPoint {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

/// Trading volume over the 20 most recent daily bars
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VolumeStats {
    pub average: f64,
    pub most_recent: f64,
}

/// A news article reduced to what sentiment aggregation needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsArticle {
    pub published: NaiveDateTime,
    pub relevance: f64,
    pub sentiment: f64,
    pub symbol: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarEventKind {
    Earnings,
    ExDividend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub kind: CalendarEventKind,
    pub date: NaiveDate,
}

/// Company events within 90 days of today. `upcoming` is ascending by
/// date and includes today, `recent_past` is descending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalendarEvents {
    pub upcoming: Vec<CalendarEvent>,
    pub recent_past: Vec<CalendarEvent>,
}

/// Outcome of one analysis section. Sections fail independently so a
/// bad SMA fetch never takes down the quote next to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Section<T> {
    Ok { data: T },
    Failed { error: String },
    Unsupported { note: String },
}

impl<T> Section<T> {
    pub fn from_result(result: Result<T, AnalysisError>) -> Self {
        match result {
            Ok(data) => Section::Ok { data },
            Err(AnalysisError::Unsupported(note)) => Section::Unsupported { note },
            Err(err) => Section::Failed {
                error: err.to_string(),
            },
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Section::Ok { data } => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Section::Failed { error } => Some(error),
            _ => None,
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Section::Unsupported { .. })
    }
}

/// Aggregate sentiment over one bucket of articles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentSnapshot {
    pub score: f64,
    pub classification: String,
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
}

/// Mention counts for today against the trailing window average.
/// `comparison` is a formatted percent like "12.50%" when both sides
/// are nonzero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentionStats {
    pub today: usize,
    pub average: f64,
    pub comparison: Option<String>,
}

/// News aggregation output for one symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsDigest {
    pub mentions: MentionStats,
    pub sentiment_today: SentimentSnapshot,
    pub sentiment_average: SentimentSnapshot,
}

/// Quote fields enriched with derived indicators and crossover signals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteAnalysis {
    pub price: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub previous_close: f64,
    pub change: f64,
    pub change_percent: f64,
    pub price_sentiment: String,
    pub percent_from_50_day_ma: Option<f64>,
    pub percent_from_200_day_ma: Option<f64>,
    pub volume_comparison: Option<f64>,
    pub crossover_200_up: bool,
    pub crossover_200_down: bool,
    pub crossover_200_up_lookback: bool,
    pub crossover_200_up_date: Option<NaiveDate>,
    pub crossover_200_down_lookback: bool,
    pub crossover_200_down_date: Option<NaiveDate>,
}

/// Close history plus both SMA series, aligned for charting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartSeries {
    pub prices: Vec<DailyClose>,
    pub sma_50: Vec<MaPoint>,
    pub sma_200: Vec<MaPoint>,
}

/// Full analysis record for one symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub symbol: String,
    pub company_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name_error: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub quote: Section<QuoteAnalysis>,
    pub sma_50: Section<f64>,
    pub sma_200: Section<f64>,
    pub volume: Section<VolumeStats>,
    pub news: Section<NewsDigest>,
    pub chart: ChartSeries,
    pub events: CalendarEvents,
}

/// One entry of a batch response, kept in request order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolOutcome {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<AnalysisResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

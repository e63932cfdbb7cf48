//! Date-bucketed news sentiment aggregation.
//!
//! Providers hand back per-article relevance and sentiment; this crate
//! reduces them to a snapshot for today plus a trailing trading-day
//! average the dashboard renders side by side.

use std::collections::HashMap;

use analysis_core::{MentionStats, NewsArticle, NewsDigest, SentimentSnapshot};
use chrono::{Datelike, Duration, NaiveDate};
use tracing::debug;

/// Articles at or below this relevance are noise for the symbol, not coverage.
pub const RELEVANCE_FLOOR: f64 = 0.1;

/// Length of the trailing average window, in trading days.
pub const TRAILING_TRADING_DAYS: usize = 20;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Label for an aggregate sentiment score
pub fn classify_sentiment(score: f64) -> &'static str {
    if score >= 0.35 {
        "Bullish"
    } else if score >= 0.15 {
        "Somewhat Bullish"
    } else if score > -0.15 {
        "Neutral"
    } else if score > -0.35 {
        "Somewhat Bearish"
    } else {
        "Bearish"
    }
}

/// The `n` most recent trading days strictly before `today`, ascending.
/// Weekends are skipped; exchange holidays are not tracked.
pub fn last_trading_days(n: usize, today: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(n);
    let mut date = today - Duration::days(1);
    while days.len() < n {
        if date.weekday().number_from_monday() <= 5 {
            days.push(date);
        }
        date -= Duration::days(1);
    }
    days.reverse();
    days
}

/// Date range a news fetch must cover so the trailing average has data:
/// from the oldest trailing trading day through today.
pub fn news_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let days = last_trading_days(TRAILING_TRADING_DAYS, today);
    (days.first().copied().unwrap_or(today), today)
}

#[derive(Debug, Default, Clone)]
struct DayBucket {
    mentions: usize,
    score_sum: f64,
    positive: usize,
    negative: usize,
}

impl DayBucket {
    fn mean_score(&self) -> f64 {
        if self.mentions == 0 {
            0.0
        } else {
            self.score_sum / self.mentions as f64
        }
    }
}

fn day_snapshot(bucket: &DayBucket) -> SentimentSnapshot {
    let score = round2(bucket.mean_score());
    let (positive, negative) = if bucket.mentions > 0 {
        (
            round2(bucket.positive as f64 / bucket.mentions as f64 * 100.0),
            round2(bucket.negative as f64 / bucket.mentions as f64 * 100.0),
        )
    } else {
        (0.0, 0.0)
    };
    SentimentSnapshot {
        score,
        classification: classify_sentiment(score).to_string(),
        positive,
        negative,
        neutral: round2(100.0 - positive - negative),
    }
}

/// Reduce articles to mention counts and sentiment for `symbol`: one
/// snapshot for `today` and one averaged over the trailing trading days.
/// Articles for other symbols or at or below the relevance floor are
/// dropped before bucketing. A day with zero qualifying articles does not
/// dilute the average; it is left out of the denominator entirely.
pub fn aggregate(symbol: &str, articles: &[NewsArticle], today: NaiveDate) -> NewsDigest {
    let mut by_day: HashMap<NaiveDate, DayBucket> = HashMap::new();
    for article in articles {
        if article.symbol != symbol || article.relevance <= RELEVANCE_FLOOR {
            continue;
        }
        let bucket = by_day.entry(article.published.date()).or_default();
        bucket.mentions += 1;
        bucket.score_sum += article.sentiment;
        if article.sentiment >= 0.15 {
            bucket.positive += 1;
        } else if article.sentiment <= -0.15 {
            bucket.negative += 1;
        }
    }

    let today_bucket = by_day.get(&today).cloned().unwrap_or_default();
    let sentiment_today = day_snapshot(&today_bucket);

    let mut sum_mentions = 0usize;
    let mut sum_scores = 0.0;
    let mut sum_positive = 0usize;
    let mut sum_negative = 0usize;
    let mut valid_days = 0usize;
    for day in last_trading_days(TRAILING_TRADING_DAYS, today) {
        if let Some(bucket) = by_day.get(&day) {
            sum_mentions += bucket.mentions;
            sum_scores += bucket.mean_score();
            sum_positive += bucket.positive;
            sum_negative += bucket.negative;
            valid_days += 1;
        }
    }

    let average_mentions = if valid_days > 0 {
        round2(sum_mentions as f64 / valid_days as f64)
    } else {
        0.0
    };
    let average_score = if valid_days > 0 {
        round2(sum_scores / valid_days as f64)
    } else {
        0.0
    };
    let (avg_positive, avg_negative) = if average_mentions > 0.0 {
        (
            round2(sum_positive as f64 / valid_days as f64 / average_mentions * 100.0),
            round2(sum_negative as f64 / valid_days as f64 / average_mentions * 100.0),
        )
    } else {
        (0.0, 0.0)
    };
    let sentiment_average = SentimentSnapshot {
        score: average_score,
        classification: classify_sentiment(average_score).to_string(),
        positive: avg_positive,
        negative: avg_negative,
        neutral: round2(100.0 - avg_positive - avg_negative),
    };

    let comparison = if today_bucket.mentions > 0 && average_mentions > 0.0 {
        Some(format!(
            "{:.2}%",
            (today_bucket.mentions as f64 - average_mentions) / average_mentions * 100.0
        ))
    } else {
        None
    };

    debug!(
        "Aggregated {} news days for {}: {} mentions today, {} valid trailing days",
        by_day.len(),
        symbol,
        today_bucket.mentions,
        valid_days
    );

    NewsDigest {
        mentions: MentionStats {
            today: today_bucket.mentions,
            average: average_mentions,
            comparison,
        },
        sentiment_today,
        sentiment_average,
    }
}

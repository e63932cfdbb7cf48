//! HTTP clients for the upstream market data providers.
//!
//! Each client implements [`ProviderClient`] from analysis-core and owns a
//! [`Pacer`], so concurrent sections of one analysis request still reach
//! the upstream API one call at a time.

pub mod alpha_vantage;
pub mod pacing;
pub mod polygon;
pub mod yahoo_finance;

pub use alpha_vantage::AlphaVantageClient;
pub use pacing::Pacer;
pub use polygon::PolygonClient;
pub use yahoo_finance::YahooFinanceClient;

use std::str::FromStr;
use std::sync::Arc;

use analysis_core::{AnalysisError, ProviderClient};

/// Providers the dashboard can analyze with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    AlphaVantage,
    Yahoo,
    Polygon,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::AlphaVantage => "alpha_vantage",
            ProviderKind::Yahoo => "yfinance",
            ProviderKind::Polygon => "polygon",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alpha_vantage" => Ok(ProviderKind::AlphaVantage),
            "yfinance" => Ok(ProviderKind::Yahoo),
            "polygon" => Ok(ProviderKind::Polygon),
            other => Err(AnalysisError::InvalidInput(format!(
                "Unknown provider '{}'. Expected alpha_vantage, yfinance, or polygon",
                other
            ))),
        }
    }
}

/// Clients constructed once at startup. Keyed providers without their API
/// key stay disabled and resolve to a MissingCredential error at request
/// time; Yahoo needs no key and is always available.
pub struct ProviderRegistry {
    alpha_vantage: Option<Arc<AlphaVantageClient>>,
    yahoo: Arc<YahooFinanceClient>,
    polygon: Option<Arc<PolygonClient>>,
}

impl ProviderRegistry {
    pub fn from_env() -> Self {
        let alpha_vantage = std::env::var("ALPHA_VANTAGE_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .map(|key| Arc::new(AlphaVantageClient::new(key)));
        if alpha_vantage.is_none() {
            tracing::warn!("ALPHA_VANTAGE_API_KEY not set, alpha_vantage provider disabled");
        }

        let polygon = std::env::var("POLYGON_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .map(|key| Arc::new(PolygonClient::new(key)));
        if polygon.is_none() {
            tracing::warn!("POLYGON_API_KEY not set, polygon provider disabled");
        }

        Self {
            alpha_vantage,
            yahoo: Arc::new(YahooFinanceClient::new()),
            polygon,
        }
    }

    pub fn resolve(&self, kind: ProviderKind) -> Result<Arc<dyn ProviderClient>, AnalysisError> {
        match kind {
            ProviderKind::AlphaVantage => {
                self.alpha_vantage
                    .clone()
                    .map(|client| client as Arc<dyn ProviderClient>)
                    .ok_or_else(|| {
                        AnalysisError::MissingCredential(
                            "ALPHA_VANTAGE_API_KEY not set".to_string(),
                        )
                    })
            }
            ProviderKind::Yahoo => Ok(self.yahoo.clone() as Arc<dyn ProviderClient>),
            ProviderKind::Polygon => self
                .polygon
                .clone()
                .map(|client| client as Arc<dyn ProviderClient>)
                .ok_or_else(|| {
                    AnalysisError::MissingCredential("POLYGON_API_KEY not set".to_string())
                }),
        }
    }

    /// Provider ids that can serve requests right now
    pub fn available(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.alpha_vantage.is_some() {
            names.push(ProviderKind::AlphaVantage.as_str());
        }
        names.push(ProviderKind::Yahoo.as_str());
        if self.polygon.is_some() {
            names.push(ProviderKind::Polygon.as_str());
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_parses_known_ids() {
        assert_eq!(
            "alpha_vantage".parse::<ProviderKind>().ok(),
            Some(ProviderKind::AlphaVantage)
        );
        assert_eq!(
            "yfinance".parse::<ProviderKind>().ok(),
            Some(ProviderKind::Yahoo)
        );
        assert_eq!(
            "polygon".parse::<ProviderKind>().ok(),
            Some(ProviderKind::Polygon)
        );
    }

    #[test]
    fn provider_kind_rejects_unknown_ids() {
        let err = "bloomberg".parse::<ProviderKind>().unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }

    #[test]
    fn provider_kind_round_trips_through_as_str() {
        for kind in [
            ProviderKind::AlphaVantage,
            ProviderKind::Yahoo,
            ProviderKind::Polygon,
        ] {
            assert_eq!(kind.as_str().parse::<ProviderKind>().ok(), Some(kind));
        }
    }
}

//! Analysis API Routes
//!
//! Endpoints for running stock analyses and checking provider health.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use alert_engine::{evaluate, AlertConfig};
use analysis_core::{validate_lookback_days, AnalysisError, SymbolOutcome};
use notification_service::Alert;
use provider_clients::ProviderKind;

use crate::{ApiResponse, AppError, AppState};

/// Request body for a batch analysis.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct AnalyzeRequest {
    /// Ticker symbols to analyze, e.g. ["NVDA", "MSFT"]
    pub symbols: Vec<String>,
    /// Data provider: alpha_vantage, yfinance, or polygon
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Crossover lookback window in days (1-365)
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    /// Optional alert thresholds; alerts are emailed when SMTP is configured
    #[serde(default)]
    pub alerts: Option<AlertConfigRequest>,
}

fn default_provider() -> String {
    "alpha_vantage".to_string()
}

fn default_lookback_days() -> u32 {
    1
}

/// Alert thresholds and mute switches, all optional.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct AlertConfigRequest {
    #[serde(default = "default_ma_tolerance")]
    pub ma_tolerance: f64,
    #[serde(default = "default_volume_tolerance")]
    pub volume_tolerance: f64,
    #[serde(default = "default_price_change_tolerance")]
    pub price_change_tolerance: f64,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: f64,
    #[serde(default)]
    pub mute_ma: bool,
    #[serde(default)]
    pub mute_volume: bool,
    #[serde(default)]
    pub mute_price_change: bool,
    #[serde(default)]
    pub mute_crossover_up: bool,
    #[serde(default)]
    pub mute_crossover_down: bool,
}

fn default_ma_tolerance() -> f64 {
    1.0
}

fn default_volume_tolerance() -> f64 {
    20.0
}

fn default_price_change_tolerance() -> f64 {
    5.0
}

fn default_cooldown_secs() -> f64 {
    300.0
}

impl From<AlertConfigRequest> for AlertConfig {
    fn from(req: AlertConfigRequest) -> Self {
        Self {
            ma_tolerance: req.ma_tolerance,
            volume_tolerance: req.volume_tolerance,
            price_change_tolerance: req.price_change_tolerance,
            cooldown_secs: req.cooldown_secs,
            mute_ma: req.mute_ma,
            mute_volume: req.mute_volume,
            mute_price_change: req.mute_price_change,
            mute_crossover_up: req.mute_crossover_up,
            mute_crossover_down: req.mute_crossover_down,
        }
    }
}

/// Response payload for a batch analysis.
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub results: Vec<SymbolOutcome>,
}

/// Service health and configured providers.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub providers: Vec<&'static str>,
}

pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/api/analyze", post(analyze))
        .route("/api/health", get(health))
}

/// Analyze one or more symbols through the selected provider
#[utoipa::path(
    post,
    path = "/api/analyze",
    request_body = AnalyzeRequest,
    responses((status = 200, description = "Per-symbol analysis outcomes in input order")),
    tag = "Analysis"
)]
pub(crate) async fn analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<ApiResponse<AnalyzeResponse>>, AppError> {
    let symbols: Vec<String> = req
        .symbols
        .iter()
        .map(|s| s.trim().to_uppercase())
        .collect();
    if symbols.is_empty() {
        return Err(AnalysisError::InvalidInput("No stock symbols provided".to_string()).into());
    }

    let kind: ProviderKind = req.provider.parse()?;
    validate_lookback_days(req.lookback_days)?;

    let results = state
        .orchestrator
        .analyze_batch(&symbols, kind, req.lookback_days)
        .await;

    if let Some(alerts) = req.alerts {
        if state.notifier.is_enabled() {
            dispatch_alerts(&state, &results, alerts.into(), req.lookback_days).await;
        }
    }

    Ok(Json(ApiResponse::success(AnalyzeResponse { results })))
}

/// Evaluate alerts over successful results and email the ones the
/// throttle lets through. Delivery itself is fire-and-forget.
async fn dispatch_alerts(
    state: &AppState,
    results: &[SymbolOutcome],
    config: AlertConfig,
    lookback_days: u32,
) {
    let cooldown = config.cooldown();
    let now = Utc::now();
    let mut throttle = state.throttle.lock().await;

    for outcome in results {
        let result = match &outcome.data {
            Some(result) => result,
            None => continue,
        };
        for event in evaluate(result, &config, lookback_days) {
            if throttle.permit(&event.symbol, event.kind, event.once_per_day, cooldown, now) {
                tracing::info!("Dispatching {} alert for {}", event.kind.as_str(), event.symbol);
                let alert = Alert::new(
                    event.kind.as_str(),
                    event.symbol,
                    event.subject,
                    event.body_html,
                );
                state.notifier.send_alert(alert);
            }
        }
    }
}

/// Service health and the providers with configured credentials
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service status and configured providers")),
    tag = "Analysis"
)]
pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        providers: state.registry.available(),
    })
}

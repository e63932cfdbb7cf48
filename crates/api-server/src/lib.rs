//! HTTP layer over the analysis pipeline.

pub mod analysis_routes;

use std::sync::Arc;

use alert_engine::AlertThrottle;
use analysis_core::AnalysisError;
use analysis_orchestrator::AnalysisOrchestrator;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use notification_service::{NotificationConfig, NotificationService};
use provider_clients::ProviderRegistry;
use serde::Serialize;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<AnalysisOrchestrator>,
    pub registry: Arc<ProviderRegistry>,
    pub notifier: Arc<NotificationService>,
    pub throttle: Arc<Mutex<AlertThrottle>>,
}

/// Uniform JSON envelope for all endpoints.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Route handler error: invalid input maps to 400, everything else 500.
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<AnalysisError>() {
            Some(AnalysisError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {:#}", self.0);
        }
        (status, Json(ApiResponse::<()>::error(self.0.to_string()))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(analysis_routes::analyze, analysis_routes::health),
    components(schemas(
        analysis_routes::AnalyzeRequest,
        analysis_routes::AlertConfigRequest
    )),
    tags((name = "Analysis", description = "Stock analysis and alerting endpoints"))
)]
struct ApiDoc;

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let registry = Arc::new(ProviderRegistry::from_env());
    let state = AppState {
        orchestrator: Arc::new(AnalysisOrchestrator::new(registry.clone())),
        registry,
        notifier: Arc::new(NotificationService::new(&NotificationConfig::from_env())),
        throttle: Arc::new(Mutex::new(AlertThrottle::new())),
    };

    let app = axum::Router::new()
        .merge(analysis_routes::analysis_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("API server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

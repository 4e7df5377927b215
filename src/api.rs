/// HTTP API для прогноза

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::ForecastError;
use crate::pipeline::{ForecastPipeline, RunOptions};
use crate::types::{ForecastReport, ForecastRequest, WeatherSummary};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ForecastPipeline>,
}

pub struct ApiError(ForecastError);

impl From<ForecastError> for ApiError {
    fn from(e: ForecastError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ForecastError::DataFileNotFound(_) => StatusCode::NOT_FOUND,
            ForecastError::InvalidCity(_) | ForecastError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/forecast", post(forecast))
        .route("/api/summary", get(summary))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Weather Forecast API",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn forecast(
    State(state): State<AppState>,
    Json(request): Json<ForecastRequest>,
) -> Result<Json<ForecastReport>, ApiError> {
    tracing::info!("Forecast request: city={} horizon={:?}", request.city, request.horizon);

    if let Some(horizon) = request.horizon {
        state.pipeline.config().check_horizon(horizon)?;
    }
    crate::data::validate_city(&request.city)?;

    let options = RunOptions {
        horizon: request.horizon,
        start_date: request.start_date,
        targets: request.targets,
    };

    let report = Arc::clone(&state.pipeline)
        .run_configured(request.city, options)
        .await?;

    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
struct SummaryQuery {
    city: String,
}

async fn summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<WeatherSummary>, ApiError> {
    tracing::info!("Summary request: city={}", query.city);
    crate::data::validate_city(&query.city)?;

    let pipeline = Arc::clone(&state.pipeline);
    let summary = tokio::task::spawn_blocking(move || pipeline.summary(&query.city))
        .await
        .map_err(|e| ForecastError::Model(format!("summary task failed: {}", e)))??;

    Ok(Json(summary))
}

//! HTTP front end: parses requests into `resolve` calls and renders results.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer};

use crate::error::{FetchFailure, ResolveError, UpstreamError};
use crate::service::WeatherService;
use crate::types::{DataKind, MAX_HORIZON_DAYS};

#[derive(Clone)]
pub struct AppState {
    service: Arc<WeatherService>,
}

#[derive(Debug, Deserialize)]
pub struct WeatherRequest {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
pub struct ForecastRequest {
    lat: f64,
    lon: f64,
    days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
    retryable: bool,
}

pub struct ApiError(ResolveError);

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ResolveError::Validation(_) => StatusCode::BAD_REQUEST,
            ResolveError::Unavailable {
                source: FetchFailure::Upstream(UpstreamError::NotFound(_)),
                ..
            } => StatusCode::NOT_FOUND,
            err if err.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_GATEWAY,
        };

        let body = ErrorResponse {
            error: self.0.to_string(),
            retryable: self.0.is_retryable(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(service: Arc<WeatherService>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/weather", post(weather_post))
        .route("/weather/:lat/:lon", get(weather_get))
        .route("/forecast", post(forecast_post))
        .route("/forecast/:lat/:lon", get(forecast_get))
        .route("/forecast/:lat/:lon/:days", get(forecast_get_days))
        .route("/api/cache/stats", get(cache_stats))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::very_permissive())
        .with_state(AppState { service })
}

async fn index(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "service": "weather-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "provider": state.service.provider_name(),
        "api_key_configured": state.service.is_configured(),
        "cache_ttl": format!("{} seconds", state.service.cache_ttl_seconds()),
        "endpoints": {
            "GET /": "This information page",
            "GET /health": "Health check",
            "POST /weather": "Current weather (lat, lon)",
            "GET /weather/{lat}/{lon}": "Current weather",
            "POST /forecast": "Forecast (lat, lon, days)",
            "GET /forecast/{lat}/{lon}": format!("{MAX_HORIZON_DAYS}-day forecast"),
            "GET /forecast/{lat}/{lon}/{days}": "N-day forecast",
            "GET /api/cache/stats": "Cache statistics"
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "weather-gateway",
        "api_configured": state.service.is_configured(),
        "cache_ttl": state.service.cache_ttl_seconds(),
    }))
}

async fn weather_post(
    State(state): State<AppState>,
    Json(request): Json<WeatherRequest>,
) -> Result<Response, ApiError> {
    resolve(&state, request.lat, request.lon, DataKind::Current, None).await
}

async fn weather_get(
    State(state): State<AppState>,
    Path((lat, lon)): Path<(f64, f64)>,
) -> Result<Response, ApiError> {
    resolve(&state, lat, lon, DataKind::Current, None).await
}

async fn forecast_post(
    State(state): State<AppState>,
    Json(request): Json<ForecastRequest>,
) -> Result<Response, ApiError> {
    resolve(&state, request.lat, request.lon, DataKind::Forecast, request.days).await
}

async fn forecast_get(
    State(state): State<AppState>,
    Path((lat, lon)): Path<(f64, f64)>,
) -> Result<Response, ApiError> {
    resolve(&state, lat, lon, DataKind::Forecast, None).await
}

async fn forecast_get_days(
    State(state): State<AppState>,
    Path((lat, lon, days)): Path<(f64, f64, i64)>,
) -> Result<Response, ApiError> {
    resolve(&state, lat, lon, DataKind::Forecast, Some(days)).await
}

async fn cache_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.cache_stats())
}

async fn resolve(
    state: &AppState,
    lat: f64,
    lon: f64,
    kind: DataKind,
    days: Option<i64>,
) -> Result<Response, ApiError> {
    let payload = state.service.resolve(lat, lon, kind, days).await?;
    Ok(Json(payload).into_response())
}

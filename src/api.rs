//! HTTP API handlers for Skyward.
//!
//! The query surface is read-only and polled: every handler reads the
//! shared [`Monitor`] as of `Utc::now()` and never triggers a fetch.
//!
//! # Not-yet-initialized
//!
//! Until the first weather fetch completes, `/weather` answers
//! `503 Service Unavailable` with a `not_yet_initialized` body; after a
//! failed first fetch it answers 200 with state `no_data_yet`.
//! `/metrics/derived` stays 503 until a fetch succeeds. Satellite products
//! that have never been fetched are still listed, with state
//! `not_yet_initialized`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::alerts::AlertReport;
use crate::cache::CacheKey;
use crate::error::CacheError;
use crate::model::DerivedMetrics;
use crate::monitor::{Monitor, ProductStatus, Snapshot, WeatherStatus};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Monitor>,
}

type Unavailable = (StatusCode, Json<Value>);

fn not_yet_initialized(err: CacheError) -> Unavailable {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "status": "not_yet_initialized",
            "message": err.to_string(),
        })),
    )
}

/// Build the router with every route.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/snapshot", get(get_snapshot))
        .route("/weather", get(get_weather))
        .route("/metrics/derived", get(get_metrics))
        .route("/alerts", get(get_alerts))
        .route("/products", get(get_products))
        .route("/products/:id", get(get_product))
        .with_state(state)
}

/// GET /snapshot - Everything the monitor currently knows.
///
/// # Response
///
/// ```json
/// {
///     "generated_at": "2024-08-01T03:00:00Z",
///     "location": { "latitude": 35.6762, "longitude": 139.6503 },
///     "locus": "default-location",
///     "weather": { "state": "available", "quality": "high", "snapshot": { ... } },
///     "forecast": { "state": "available", "forecast": { ... } },
///     "metrics": { "feels_like": 54.2, "comfort_label": "poor", ... },
///     "alerts": { "alerts": [ ... ], "highest_severity": "high", "fast_mode": true },
///     "products": [ { "product": "sea-surface-temperature", "state": "available", ... } ]
/// }
/// ```
#[instrument(skip(state))]
pub async fn get_snapshot(State(state): State<AppState>) -> Json<Snapshot> {
    let snapshot = state.monitor.snapshot(Utc::now());
    info!(
        weather = ?snapshot.weather.status.state,
        alert_count = snapshot.alerts.alerts.len(),
        "Snapshot queried"
    );
    Json(snapshot)
}

/// GET /weather - Latest conditions with their quality verdict.
#[instrument(skip(state))]
pub async fn get_weather(
    State(state): State<AppState>,
) -> Result<Json<WeatherStatus>, Unavailable> {
    match state.monitor.require_weather(Utc::now()) {
        Ok(weather) => {
            info!(quality = ?weather.status.quality, "Weather queried");
            Ok(Json(weather))
        }
        Err(e) => {
            warn!(error = %e, "Weather requested before first fetch");
            Err(not_yet_initialized(e))
        }
    }
}

/// GET /metrics/derived - Latest derived metrics.
#[instrument(skip(state))]
pub async fn get_metrics(
    State(state): State<AppState>,
) -> Result<Json<DerivedMetrics>, Unavailable> {
    state.monitor.metrics().map(Json).ok_or_else(|| {
        warn!("Derived metrics requested before first weather fetch");
        not_yet_initialized(CacheError::NotYetInitialized(CacheKey::current_weather()))
    })
}

/// GET /alerts - Active alerts.
///
/// # Response
///
/// ```json
/// {
///     "alerts": [
///         {
///             "kind": "heat_warning",
///             "locus": "default-location",
///             "severity": "high",
///             "value": 36.0,
///             "threshold": 35.0,
///             "title": "Extreme Heat Warning",
///             ...
///         }
///     ],
///     "highest_severity": "high",
///     "fast_mode": true
/// }
/// ```
#[instrument(skip(state))]
pub async fn get_alerts(State(state): State<AppState>) -> Json<AlertReport> {
    let report = state.monitor.alerts();
    info!(
        alert_count = report.alerts.len(),
        fast_mode = report.fast_mode,
        "Alerts queried"
    );
    Json(report)
}

/// GET /products - Status of every satellite product and imagery source.
#[instrument(skip(state))]
pub async fn get_products(State(state): State<AppState>) -> Json<Vec<ProductStatus>> {
    Json(state.monitor.products(Utc::now()))
}

/// GET /products/:id - One numeric product or imagery source by
/// kebab-case id, e.g. `sea-surface-temperature` or `himawari-infrared`.
#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductStatus>, StatusCode> {
    let status = state
        .monitor
        .product_by_slug(&id, Utc::now())
        .ok_or_else(|| {
            warn!(product = %id, "Unknown product");
            StatusCode::NOT_FOUND
        })?;

    info!(
        product = %id,
        state = ?status.status.state,
        quality = ?status.status.quality,
        "Product queried"
    );
    Ok(Json(status))
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

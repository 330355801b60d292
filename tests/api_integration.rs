//! Integration tests for Skyward API endpoints.
//!
//! These tests verify the full request/response cycle through the HTTP API.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum_test::TestServer;
use chrono::{DateTime, Duration, Utc};
use tower::ServiceExt;

use skyward::api::{AppState, router};
use skyward::config::Config;
use skyward::error::FetchError;
use skyward::model::{
    Coordinates, ImageryRef, ImagerySource, ProductId, ProductValue, Record, SatelliteProduct,
    SourceId, Spectrum, WeatherSnapshot,
};
use skyward::monitor::Monitor;
use skyward::scheduler::Scheduler;
use skyward::sources::{Feed, SourceClient, Sources};

/// Never called: these tests feed the scheduler directly.
struct Idle;

#[async_trait]
impl SourceClient for Idle {
    async fn fetch(
        &self,
        _feed: Feed,
        _coordinates: Coordinates,
        _since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Record>, FetchError> {
        Ok(Vec::new())
    }
}

fn hot_snapshot() -> WeatherSnapshot {
    WeatherSnapshot {
        observed_at: Utc::now() - Duration::minutes(2),
        coordinates: Coordinates::TOKYO,
        temperature: 36.0,
        humidity: Some(70.0),
        pressure: Some(1005.0),
        wind_speed: 20.0,
        wind_direction: 135.0,
        wind_gust: Some(30.0),
        visibility: Some(20000.0),
        cloud_cover: Some(10.0),
        precipitation: Some(0.0),
        precipitation_probability: Some(10.0),
        uv_index: Some(7.5),
        weather_code: 1,
    }
}

fn sea_surface(cloud_cover: f64) -> Record {
    Record::Satellite(SatelliteProduct {
        product: ProductId::SeaSurfaceTemperature,
        source: SourceId::Himawari,
        platform: "himawari-9".to_string(),
        value: ProductValue::Numeric(27.8),
        spectrum: Spectrum::Visible,
        captured_at: Utc::now() - Duration::minutes(5),
        cloud_cover,
        sun_elevation: 60.0,
    })
}

fn infrared_at_night() -> Record {
    let source = ImagerySource::HimawariInfrared;
    Record::Satellite(SatelliteProduct {
        product: ProductId::ImageryReference,
        source: SourceId::Imagery(source),
        platform: "himawari-9".to_string(),
        value: ProductValue::Reference(ImageryRef {
            url: source.latest_image_url().to_string(),
            region: source.region().to_string(),
            band: source.band().to_string(),
        }),
        spectrum: Spectrum::Infrared,
        captured_at: Utc::now() - Duration::minutes(5),
        cloud_cover: 100.0,
        sun_elevation: -40.0,
    })
}

fn create_monitor() -> (Arc<Monitor>, Scheduler) {
    let monitor = Monitor::shared(Config::default());
    let sources = Sources::new(Arc::new(Idle), Arc::new(Idle));
    let scheduler = Scheduler::new(Arc::clone(&monitor), sources);
    (monitor, scheduler)
}

fn create_test_server(monitor: Arc<Monitor>) -> TestServer {
    TestServer::new(router(AppState { monitor })).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (monitor, _) = create_monitor();
    let server = create_test_server(monitor);

    let response = server.get("/health").await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_weather_before_first_fetch_is_unavailable() {
    let (monitor, _) = create_monitor();
    let server = create_test_server(monitor);

    let response = server.get("/weather").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "not_yet_initialized");

    server
        .get("/metrics/derived")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_snapshot_before_first_fetch() {
    let (monitor, _) = create_monitor();
    let server = create_test_server(monitor);

    let response = server.get("/snapshot").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["weather"]["state"], "not_yet_initialized");
    assert_eq!(
        body["products"].as_array().unwrap().len(),
        ProductId::NUMERIC.len() + ImagerySource::ALL.len()
    );
    assert!(body["metrics"].is_null());
    assert!(body["alerts"]["alerts"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_weather_metrics_and_alerts_after_hot_reading() {
    let (monitor, scheduler) = create_monitor();
    scheduler.apply(
        Feed::Weather,
        Ok(vec![Record::Weather(hot_snapshot())]),
        Utc::now(),
    );
    let server = create_test_server(monitor);

    let response = server.get("/weather").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["state"], "available");
    assert_eq!(body["quality"], "high");
    assert_eq!(body["snapshot"]["temperature"], 36.0);

    let response = server.get("/metrics/derived").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert!(body["feels_like"].as_f64().unwrap() >= 36.0);
    assert_eq!(body["comfort_label"], "poor");
    assert_eq!(body["wind_cardinal"], "SE");

    let response = server.get("/alerts").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["alerts"][0]["kind"], "heat_warning");
    assert_eq!(body["alerts"][0]["severity"], "high");
    assert_eq!(body["highest_severity"], "high");
    assert_eq!(body["fast_mode"], true);
}

#[tokio::test]
async fn test_product_by_id() {
    let (monitor, scheduler) = create_monitor();
    scheduler.apply(
        Feed::Satellite(ProductId::SeaSurfaceTemperature),
        Ok(vec![sea_surface(95.0)]),
        Utc::now(),
    );
    let server = create_test_server(monitor);

    let response = server.get("/products/sea-surface-temperature").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["state"], "available");
    assert_eq!(body["quality"], "low");
    assert_eq!(body["observation"]["value"]["numeric"], 27.8);

    let response = server.get("/products/cloud-top-height").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["state"], "not_yet_initialized");
}

#[tokio::test]
async fn test_imagery_source_by_slug() {
    let (monitor, scheduler) = create_monitor();
    scheduler.apply(
        Feed::Imagery(ImagerySource::HimawariInfrared),
        Ok(vec![infrared_at_night()]),
        Utc::now(),
    );
    let server = create_test_server(monitor);

    let response = server.get("/products/himawari-infrared").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["state"], "available");
    assert_eq!(body["quality"], "high");
    assert_eq!(body["source"]["imagery"], "himawari-infrared");
    assert_eq!(body["observation"]["spectrum"], "infrared");

    let response = server.get("/products/jma-radar-nationwide").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["state"], "not_yet_initialized");

    server
        .get("/products/imagery-reference")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let (monitor, _) = create_monitor();
    let server = create_test_server(monitor);

    server
        .get("/products/rainbow-index")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_product_reports_reason() {
    let (monitor, scheduler) = create_monitor();
    scheduler.apply(
        Feed::Satellite(ProductId::WildfireCount),
        Err(FetchError::RateLimited),
        Utc::now(),
    );
    let server = create_test_server(monitor);

    let response = server.get("/products").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    let wildfire = body
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["product"] == "wildfire-count")
        .unwrap();
    assert_eq!(wildfire["state"], "no_data_yet");
    assert_eq!(wildfire["attempts"], 1);
    assert_eq!(wildfire["last_failure"]["kind"], "rate_limited");
}

#[tokio::test]
async fn test_router_serves_without_test_server() {
    let (monitor, _) = create_monitor();
    let app = router(AppState { monitor });

    let response = app
        .oneshot(Request::builder().uri("/alerts").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

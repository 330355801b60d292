//! Skyward - a weather and satellite monitoring core for one location.
//!
//! # Overview
//!
//! Skyward polls a numeric weather model (Open-Meteo's JMA endpoint) and a
//! set of Himawari-derived satellite products, keeps the latest record of
//! each in memory with a quality verdict, derives comfort and trend metrics
//! from the weather, and maintains threshold alerts.
//!
//! Data never disappears once fetched. A provider that fails or goes quiet
//! leaves its last good record in place, and the record's quality verdict
//! degrades toward STALE as it ages.
//!
//! # API Endpoints
//!
//! - `GET /snapshot` - Everything at once
//! - `GET /weather` - Current conditions
//! - `GET /metrics/derived` - Heat index, feels-like, comfort, trends
//! - `GET /alerts` - Active alerts
//! - `GET /products`, `GET /products/:id` - Satellite products
//! - `GET /health` - Health check
//!
//! # Modules
//!
//! - [`config`]: Startup configuration from the environment
//! - [`model`]: Records, alerts and derived metrics
//! - [`sources`]: Provider clients
//! - [`quality`]: Quality grading
//! - [`cache`]: Latest-record store and rolling window
//! - [`metrics`]: Derived weather metrics
//! - [`alerts`]: Alert state machine
//! - [`scheduler`]: Per-feed refresh loops
//! - [`monitor`]: Shared state and read views
//! - [`api`]: HTTP API handlers

pub mod alerts;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod monitor;
pub mod quality;
pub mod scheduler;
pub mod sources;

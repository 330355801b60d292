//! Shared monitor state and its read-only views.
//!
//! [`Monitor`] owns the cache, the alert engine and the latest derived
//! metrics. The scheduler is its only writer; the HTTP layer only reads.
//!
//! Quality verdicts in the views are graded at read time against the
//! caller's `now`, so a feed that has gone quiet is reported STALE as soon
//! as its data passes the age limit, not at its next fetch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::alerts::{AlertEngine, AlertReport, Transition};
use crate::cache::{Cache, CacheEntry, CacheKey};
use crate::config::{Config, QualityThresholds};
use crate::error::{CacheError, FetchError};
use crate::model::{
    Coordinates, DerivedMetrics, Forecast, ImagerySource, Locus, ProductId, QualityVerdict,
    Record, SatelliteProduct, SourceId, WeatherSnapshot,
};
use crate::quality;

/// Whether a key has produced data yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedState {
    /// No fetch for the key has completed.
    NotYetInitialized,
    /// Every fetch so far has failed.
    NoDataYet,
    Available,
}

/// Bookkeeping common to every cached key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryStatus {
    pub state: FeedState,
    pub quality: Option<QualityVerdict>,
    pub age_seconds: Option<i64>,
    /// Failed attempts since the last success.
    pub attempts: u32,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<FetchError>,
}

impl EntryStatus {
    fn from_entry(
        entry: Option<&CacheEntry>,
        now: DateTime<Utc>,
        thresholds: &QualityThresholds,
    ) -> Self {
        let Some(entry) = entry else {
            return Self {
                state: FeedState::NotYetInitialized,
                quality: None,
                age_seconds: None,
                attempts: 0,
                last_success: None,
                last_failure: None,
            };
        };

        Self {
            state: if entry.has_data() {
                FeedState::Available
            } else {
                FeedState::NoDataYet
            },
            quality: entry
                .record
                .as_ref()
                .map(|r| quality::assess(r, now, thresholds)),
            age_seconds: entry.age_seconds(now),
            attempts: entry.attempts,
            last_success: entry.last_success,
            last_failure: entry.last_failure.clone(),
        }
    }
}

/// Current conditions with their status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherStatus {
    #[serde(flatten)]
    pub status: EntryStatus,
    pub snapshot: Option<WeatherSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastStatus {
    #[serde(flatten)]
    pub status: EntryStatus,
    pub forecast: Option<Forecast>,
}

/// One satellite product or imagery source with its status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductStatus {
    pub product: ProductId,
    pub source: SourceId,
    pub label: &'static str,
    pub unit: Option<&'static str>,
    #[serde(flatten)]
    pub status: EntryStatus,
    pub observation: Option<SatelliteProduct>,
}

/// Everything the monitor knows, as of one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub generated_at: DateTime<Utc>,
    pub location: Coordinates,
    pub locus: Locus,
    pub weather: WeatherStatus,
    pub forecast: ForecastStatus,
    pub metrics: Option<DerivedMetrics>,
    pub alerts: AlertReport,
    pub products: Vec<ProductStatus>,
}

/// Shared state behind the scheduler and the query surface.
pub struct Monitor {
    config: Config,
    cache: Cache,
    alerts: RwLock<AlertEngine>,
    metrics: RwLock<Option<DerivedMetrics>>,
}

impl Monitor {
    pub fn new(config: Config) -> Self {
        let cache = Cache::new(config.quality.clone(), config.trend.history_capacity);
        let alerts = AlertEngine::new(config.alerts.clone(), config.locus.clone());
        Self {
            config,
            cache,
            alerts: RwLock::new(alerts),
            metrics: RwLock::new(None),
        }
    }

    /// Convenience for sharing between tasks.
    pub fn shared(config: Config) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub(crate) fn set_metrics(&self, metrics: DerivedMetrics) {
        *self.metrics.write() = Some(metrics);
    }

    pub(crate) fn evaluate_alerts(&self, snapshot: &WeatherSnapshot) -> Vec<Transition> {
        self.alerts.write().evaluate(snapshot)
    }

    pub fn metrics(&self) -> Option<DerivedMetrics> {
        self.metrics.read().clone()
    }

    pub fn alerts(&self) -> AlertReport {
        self.alerts.read().report()
    }

    /// Whether weather should be polled at the fast interval.
    pub fn fast_mode(&self) -> bool {
        self.alerts.read().fast_mode()
    }

    fn status(&self, entry: Option<&CacheEntry>, now: DateTime<Utc>) -> (EntryStatus, Option<Record>) {
        let status = EntryStatus::from_entry(entry, now, &self.config.quality);
        let record = entry.and_then(|e| e.record.clone());
        (status, record)
    }

    fn weather_status(&self, entry: Option<&CacheEntry>, now: DateTime<Utc>) -> WeatherStatus {
        let (status, record) = self.status(entry, now);
        let snapshot = match record {
            Some(Record::Weather(snapshot)) => Some(snapshot),
            _ => None,
        };
        WeatherStatus { status, snapshot }
    }

    pub fn weather(&self, now: DateTime<Utc>) -> WeatherStatus {
        let entry = self.cache.get(&CacheKey::current_weather());
        self.weather_status(entry.as_deref(), now)
    }

    /// Weather status, or an error when no weather fetch has completed.
    ///
    /// A key whose fetches have all failed is initialized: it reports
    /// `no_data_yet` with the failure reason.
    pub fn require_weather(&self, now: DateTime<Utc>) -> Result<WeatherStatus, CacheError> {
        let entry = self.cache.require(&CacheKey::current_weather())?;
        Ok(self.weather_status(Some(&entry), now))
    }

    pub fn forecast(&self, now: DateTime<Utc>) -> ForecastStatus {
        let entry = self.cache.get(&CacheKey::forecast());
        let (status, record) = self.status(entry.as_deref(), now);
        let forecast = match record {
            Some(Record::Forecast(forecast)) => Some(forecast),
            _ => None,
        };
        ForecastStatus { status, forecast }
    }

    fn satellite_status(
        &self,
        key: CacheKey,
        product: ProductId,
        label: &'static str,
        unit: Option<&'static str>,
        now: DateTime<Utc>,
    ) -> ProductStatus {
        let entry = self.cache.get(&key);
        let (status, record) = self.status(entry.as_deref(), now);
        let observation = match record {
            Some(Record::Satellite(observation)) => Some(observation),
            _ => None,
        };
        ProductStatus {
            product,
            source: key.source,
            label,
            unit,
            status,
            observation,
        }
    }

    pub fn product(&self, product: ProductId, now: DateTime<Utc>) -> ProductStatus {
        self.satellite_status(
            CacheKey::satellite(product),
            product,
            product.label(),
            product.unit(),
            now,
        )
    }

    pub fn imagery(&self, source: ImagerySource, now: DateTime<Utc>) -> ProductStatus {
        self.satellite_status(
            CacheKey::imagery(source),
            ProductId::ImageryReference,
            source.label(),
            None,
            now,
        )
    }

    /// Look up a numeric product or an imagery source by its slug.
    pub fn product_by_slug(&self, slug: &str, now: DateTime<Utc>) -> Option<ProductStatus> {
        if let Some(product) = ProductId::from_slug(slug).filter(ProductId::is_numeric) {
            return Some(self.product(product, now));
        }
        ImagerySource::from_slug(slug).map(|source| self.imagery(source, now))
    }

    /// Every numeric product then every imagery source, including ones
    /// never fetched.
    pub fn products(&self, now: DateTime<Utc>) -> Vec<ProductStatus> {
        ProductId::NUMERIC
            .into_iter()
            .map(|product| self.product(product, now))
            .chain(
                ImagerySource::ALL
                    .into_iter()
                    .map(|source| self.imagery(source, now)),
            )
            .collect()
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> Snapshot {
        Snapshot {
            generated_at: now,
            location: self.config.location,
            locus: self.config.locus.clone(),
            weather: self.weather(now),
            forecast: self.forecast(now),
            metrics: self.metrics(),
            alerts: self.alerts(),
            products: self.products(now),
        }
    }
}

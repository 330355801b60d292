//! In-memory cache of the most recent record per key.
//!
//! Entries are never evicted by time. Freshness is expressed entirely
//! through the quality verdict, so once a key has held data it keeps
//! holding it (possibly STALE) until a newer record replaces it.
//!
//! # Concurrency
//!
//! Entries are stored as `Arc<CacheEntry>` and swapped whole. [`Cache::put`]
//! holds the write lock for its entire read-modify-write, so concurrent puts
//! to the same key are serialized and readers see either the old or the new
//! entry, never a mix.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::config::QualityThresholds;
use crate::error::{CacheError, FetchError};
use crate::model::{ImagerySource, ProductId, QualityVerdict, Record, SourceId, WeatherSnapshot};
use crate::quality;

/// What a cache key holds for its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKey {
    Current,
    Forecast,
    Satellite(ProductId),
}

/// `(source, product)` pair identifying one cached record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CacheKey {
    pub source: SourceId,
    pub product: ProductKey,
}

impl CacheKey {
    pub const fn current_weather() -> Self {
        Self {
            source: SourceId::OpenMeteoJma,
            product: ProductKey::Current,
        }
    }

    pub const fn forecast() -> Self {
        Self {
            source: SourceId::OpenMeteoJma,
            product: ProductKey::Forecast,
        }
    }

    pub const fn satellite(product: ProductId) -> Self {
        Self {
            source: SourceId::Himawari,
            product: ProductKey::Satellite(product),
        }
    }

    pub const fn imagery(source: ImagerySource) -> Self {
        Self {
            source: SourceId::Imagery(source),
            product: ProductKey::Satellite(ProductId::ImageryReference),
        }
    }

    /// The key a record is stored under.
    pub fn for_record(record: &Record) -> Self {
        let product = match record {
            Record::Weather(_) => ProductKey::Current,
            Record::Forecast(_) => ProductKey::Forecast,
            Record::Satellite(s) => ProductKey::Satellite(s.product),
        };
        Self {
            source: record.source(),
            product,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.product {
            ProductKey::Current => write!(f, "{}/current", self.source),
            ProductKey::Forecast => write!(f, "{}/forecast", self.source),
            ProductKey::Satellite(p) => write!(f, "{}/{}", self.source, p),
        }
    }
}

/// One cached record plus its fetch bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    /// `None` only when every attempt so far has failed.
    pub record: Option<Record>,
    /// Set whenever `record` is.
    pub quality: Option<QualityVerdict>,
    /// Failed attempts since the last success.
    pub attempts: u32,
    pub last_success: Option<DateTime<Utc>>,
    pub last_attempt: DateTime<Utc>,
    pub last_failure: Option<FetchError>,
}

impl CacheEntry {
    pub fn has_data(&self) -> bool {
        self.record.is_some()
    }

    /// Age of the held record relative to `now`, in whole seconds.
    pub fn age_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        self.record
            .as_ref()
            .map(|r| quality::age_seconds(r.captured_at(), now).floor() as i64)
    }
}

/// Shared store of the latest record per key and the rolling weather window.
pub struct Cache {
    entries: RwLock<HashMap<CacheKey, Arc<CacheEntry>>>,
    history: RwLock<VecDeque<WeatherSnapshot>>,
    history_capacity: usize,
    thresholds: QualityThresholds,
}

impl Cache {
    /// Create an empty cache.
    ///
    /// # Arguments
    ///
    /// * `thresholds` - Quality policy applied on every put
    /// * `history_capacity` - Snapshots kept in the rolling window (at least 2)
    pub fn new(thresholds: QualityThresholds, history_capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            history: RwLock::new(VecDeque::with_capacity(history_capacity)),
            history_capacity: history_capacity.max(2),
            thresholds,
        }
    }

    /// Current entry for `key`, if any fetch for it has completed.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        self.entries.read().get(key).cloned()
    }

    /// Like [`Cache::get`], but absence is an error.
    pub fn require(&self, key: &CacheKey) -> Result<Arc<CacheEntry>, CacheError> {
        self.get(key).ok_or(CacheError::NotYetInitialized(*key))
    }

    /// Record the outcome of a fetch for `key`.
    ///
    /// On success the record replaces whatever was held, the attempt counter
    /// resets and the failure reason clears. On failure the previously held
    /// record is kept untouched, the attempt counter increments, the reason
    /// is recorded, and the verdict is re-graded against `now` so staleness
    /// keeps advancing without new data. A failure with no prior entry
    /// stores a no-data entry with one attempt.
    pub fn put(
        &self,
        key: CacheKey,
        outcome: Result<Record, FetchError>,
        now: DateTime<Utc>,
    ) -> Arc<CacheEntry> {
        let mut entries = self.entries.write();

        let entry = match outcome {
            Ok(record) => {
                let quality = quality::assess(&record, now, &self.thresholds);
                CacheEntry {
                    key,
                    record: Some(record),
                    quality: Some(quality),
                    attempts: 0,
                    last_success: Some(now),
                    last_attempt: now,
                    last_failure: None,
                }
            }
            Err(err) => match entries.get(&key) {
                Some(previous) => CacheEntry {
                    key,
                    record: previous.record.clone(),
                    quality: previous
                        .record
                        .as_ref()
                        .map(|r| quality::assess(r, now, &self.thresholds)),
                    attempts: previous.attempts.saturating_add(1),
                    last_success: previous.last_success,
                    last_attempt: now,
                    last_failure: Some(err),
                },
                None => CacheEntry {
                    key,
                    record: None,
                    quality: None,
                    attempts: 1,
                    last_success: None,
                    last_attempt: now,
                    last_failure: Some(err),
                },
            },
        };

        let entry = Arc::new(entry);
        entries.insert(key, Arc::clone(&entry));
        entry
    }

    /// The provider answered but had nothing newer for `key`.
    ///
    /// Clears the failure bookkeeping and re-grades the held record against
    /// `now`. Returns `None` if the key has never been stored.
    pub fn confirm_unchanged(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<Arc<CacheEntry>> {
        let mut entries = self.entries.write();
        let previous = entries.get(key)?;

        let entry = Arc::new(CacheEntry {
            key: *key,
            record: previous.record.clone(),
            quality: previous
                .record
                .as_ref()
                .map(|r| quality::assess(r, now, &self.thresholds)),
            attempts: 0,
            last_success: previous.last_success,
            last_attempt: now,
            last_failure: None,
        });
        entries.insert(*key, Arc::clone(&entry));
        Some(entry)
    }

    /// Append a snapshot to the rolling window, dropping the oldest when full.
    pub fn push_history(&self, snapshot: WeatherSnapshot) {
        let mut history = self.history.write();
        while history.len() >= self.history_capacity {
            history.pop_front();
        }
        history.push_back(snapshot);
    }

    /// Rolling window, oldest first.
    pub fn history(&self) -> Vec<WeatherSnapshot> {
        self.history.read().iter().cloned().collect()
    }

    /// Number of keys with an entry.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Coordinates, ImageryRef, ProductValue, SatelliteProduct, Spectrum};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 1, 3, 0, 0).unwrap()
    }

    fn sst(captured_at: DateTime<Utc>) -> Record {
        Record::Satellite(SatelliteProduct {
            product: ProductId::SeaSurfaceTemperature,
            source: SourceId::Himawari,
            platform: "himawari-9".to_string(),
            value: ProductValue::Numeric(18.5),
            spectrum: Spectrum::Visible,
            captured_at,
            cloud_cover: 10.0,
            sun_elevation: 40.0,
        })
    }

    fn snapshot(minute: i64, temperature: f64) -> WeatherSnapshot {
        WeatherSnapshot {
            observed_at: t0() + Duration::minutes(minute),
            coordinates: Coordinates::TOKYO,
            temperature,
            humidity: Some(50.0),
            pressure: Some(1013.0),
            wind_speed: 10.0,
            wind_direction: 90.0,
            wind_gust: None,
            visibility: None,
            cloud_cover: None,
            precipitation: None,
            precipitation_probability: None,
            uv_index: None,
            weather_code: 0,
        }
    }

    fn cache() -> Cache {
        Cache::new(QualityThresholds::default(), 7)
    }

    #[test]
    fn test_get_missing_key_is_not_initialized() {
        let cache = cache();
        let key = CacheKey::satellite(ProductId::CloudTopHeight);

        assert!(cache.get(&key).is_none());
        assert_eq!(
            cache.require(&key).unwrap_err(),
            CacheError::NotYetInitialized(key)
        );
    }

    #[test]
    fn test_put_success_stores_record() {
        let cache = cache();
        let key = CacheKey::satellite(ProductId::SeaSurfaceTemperature);

        let entry = cache.put(key, Ok(sst(t0())), t0() + Duration::minutes(2));

        assert_eq!(entry.attempts, 0);
        assert_eq!(entry.quality, Some(QualityVerdict::High));
        assert!(entry.last_failure.is_none());
        assert_eq!(cache.get(&key).unwrap().as_ref(), entry.as_ref());
    }

    #[test]
    fn test_failure_after_success_retains_record() {
        let cache = cache();
        let key = CacheKey::satellite(ProductId::SeaSurfaceTemperature);
        let record = sst(t0());

        cache.put(key, Ok(record.clone()), t0());
        let entry = cache.put(key, Err(FetchError::Timeout), t0() + Duration::minutes(10));

        assert_eq!(entry.record.as_ref(), Some(&record));
        assert_eq!(entry.attempts, 1);
        assert_eq!(entry.last_failure, Some(FetchError::Timeout));
        assert_eq!(entry.last_success, Some(t0()));

        let entry = cache.put(key, Err(FetchError::RateLimited), t0() + Duration::minutes(20));
        assert_eq!(entry.record.as_ref(), Some(&record));
        assert_eq!(entry.attempts, 2);
        assert_eq!(entry.last_failure, Some(FetchError::RateLimited));
    }

    #[test]
    fn test_failures_advance_toward_stale() {
        let cache = cache();
        let key = CacheKey::satellite(ProductId::SeaSurfaceTemperature);

        cache.put(key, Ok(sst(t0())), t0());

        let entry = cache.put(key, Err(FetchError::Timeout), t0() + Duration::minutes(45));
        assert_eq!(entry.quality, Some(QualityVerdict::Medium));

        let entry = cache.put(key, Err(FetchError::Timeout), t0() + Duration::minutes(61));
        assert_eq!(entry.quality, Some(QualityVerdict::Stale));
        assert!(entry.has_data());
    }

    #[test]
    fn test_failure_without_prior_entry_stores_sentinel() {
        let cache = cache();
        let key = CacheKey::current_weather();

        let entry = cache.put(
            key,
            Err(FetchError::Unreachable("dns".to_string())),
            t0(),
        );

        assert!(!entry.has_data());
        assert_eq!(entry.quality, None);
        assert_eq!(entry.attempts, 1);
        assert!(cache.require(&key).is_ok());
    }

    #[test]
    fn test_success_after_failures_resets_attempts() {
        let cache = cache();
        let key = CacheKey::satellite(ProductId::SeaSurfaceTemperature);

        cache.put(key, Err(FetchError::Timeout), t0());
        cache.put(key, Err(FetchError::Timeout), t0() + Duration::minutes(1));
        let entry = cache.put(key, Ok(sst(t0())), t0() + Duration::minutes(2));

        assert_eq!(entry.attempts, 0);
        assert!(entry.last_failure.is_none());
    }

    #[test]
    fn test_confirm_unchanged_regrades_and_clears_failure() {
        let cache = cache();
        let key = CacheKey::satellite(ProductId::SeaSurfaceTemperature);

        assert!(cache.confirm_unchanged(&key, t0()).is_none());

        cache.put(key, Ok(sst(t0())), t0());
        cache.put(key, Err(FetchError::Timeout), t0() + Duration::minutes(5));
        let entry = cache
            .confirm_unchanged(&key, t0() + Duration::minutes(70))
            .unwrap();

        assert_eq!(entry.attempts, 0);
        assert!(entry.last_failure.is_none());
        assert_eq!(entry.quality, Some(QualityVerdict::Stale));
    }

    #[test]
    fn test_history_is_bounded() {
        let cache = Cache::new(QualityThresholds::default(), 3);
        for i in 0..5 {
            cache.push_history(snapshot(i * 10, 20.0 + i as f64));
        }

        let history = cache.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].temperature, 22.0);
        assert_eq!(history[2].temperature, 24.0);
    }

    #[test]
    fn test_key_display() {
        assert_eq!(CacheKey::current_weather().to_string(), "open_meteo_jma/current");
        assert_eq!(
            CacheKey::satellite(ProductId::WildfireCount).to_string(),
            "himawari/wildfire-count"
        );
        assert_eq!(
            CacheKey::imagery(ImagerySource::HimawariInfrared).to_string(),
            "himawari-infrared/imagery-reference"
        );
    }

    #[test]
    fn test_imagery_sources_get_separate_keys() {
        let cache = cache();
        let infrared = Record::Satellite(SatelliteProduct {
            product: ProductId::ImageryReference,
            source: SourceId::Imagery(ImagerySource::HimawariInfrared),
            platform: "himawari-9".to_string(),
            value: ProductValue::Reference(ImageryRef {
                url: ImagerySource::HimawariInfrared.latest_image_url().to_string(),
                region: "japan".to_string(),
                band: "b13".to_string(),
            }),
            spectrum: Spectrum::Infrared,
            captured_at: t0(),
            cloud_cover: 20.0,
            sun_elevation: -30.0,
        });

        let key = CacheKey::for_record(&infrared);
        assert_eq!(key, CacheKey::imagery(ImagerySource::HimawariInfrared));
        cache.put(key, Ok(infrared), t0());

        assert!(cache.get(&CacheKey::imagery(ImagerySource::HimawariWaterVapor)).is_none());
        assert!(cache.get(&CacheKey::satellite(ProductId::ImageryReference)).is_none());
    }

    #[test]
    fn test_concurrent_failures_do_not_lose_attempts() {
        let cache = Arc::new(cache());
        let key = CacheKey::satellite(ProductId::SolarRadiation);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        cache.put(key, Err(FetchError::Timeout), t0());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.get(&key).unwrap().attempts, 200);
    }
}

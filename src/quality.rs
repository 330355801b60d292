//! Quality grading of cached records.
//!
//! # Clock injection
//!
//! [`assess`] takes `now` as an argument instead of calling `Utc::now()`,
//! so a verdict is a pure function of the record, the thresholds and the
//! supplied instant.
//!
//! # Policy
//!
//! Rules are applied in order and the first match wins:
//!
//! 1. older than `data_age_limit` → `Stale`
//! 2. optical record with declared cloud cover above `cloud_coverage_limit` → `Low`
//! 3. optical record with sun elevation below `sun_elevation_min` → `Low`
//! 4. younger than half the record's nominal update interval → `High`
//! 5. otherwise → `Medium`

use chrono::{DateTime, Utc};

use crate::config::QualityThresholds;
use crate::model::{QualityVerdict, Record};

/// Grade a record as of `now`.
pub fn assess(record: &Record, now: DateTime<Utc>, thresholds: &QualityThresholds) -> QualityVerdict {
    let age = age_seconds(record.captured_at(), now);

    if age > thresholds.data_age_limit.as_secs_f64() {
        return QualityVerdict::Stale;
    }

    if let Record::Satellite(product) = record
        && record.is_optical()
    {
        if product.cloud_cover > thresholds.cloud_coverage_limit {
            return QualityVerdict::Low;
        }
        if product.sun_elevation < thresholds.sun_elevation_min {
            return QualityVerdict::Low;
        }
    }

    if age < record.nominal_interval().as_secs_f64() * 0.5 {
        QualityVerdict::High
    } else {
        QualityVerdict::Medium
    }
}

/// Signed age in seconds; negative when the capture time is ahead of `now`.
pub fn age_seconds(captured_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - captured_at).num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Coordinates, ImageryRef, ImagerySource, ProductId, ProductValue, SatelliteProduct,
        SourceId, WeatherSnapshot,
    };
    use chrono::{Duration, TimeZone};

    /// A fixed "now" used across all tests: 2024-08-01 03:00:00 UTC.
    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 1, 3, 0, 0).unwrap()
    }

    fn product(
        product: ProductId,
        age_minutes: i64,
        cloud_cover: f64,
        sun_elevation: f64,
    ) -> Record {
        Record::Satellite(SatelliteProduct {
            product,
            source: SourceId::Himawari,
            platform: "himawari-9".to_string(),
            value: ProductValue::Numeric(18.5),
            spectrum: product.spectrum(),
            captured_at: fixed_now() - Duration::minutes(age_minutes),
            cloud_cover,
            sun_elevation,
        })
    }

    fn imagery(
        source: ImagerySource,
        age_minutes: i64,
        cloud_cover: f64,
        sun_elevation: f64,
    ) -> Record {
        Record::Satellite(SatelliteProduct {
            product: ProductId::ImageryReference,
            source: SourceId::Imagery(source),
            platform: "himawari-9".to_string(),
            value: ProductValue::Reference(ImageryRef {
                url: source.latest_image_url().to_string(),
                region: source.region().to_string(),
                band: source.band().to_string(),
            }),
            spectrum: source.spectrum(),
            captured_at: fixed_now() - Duration::minutes(age_minutes),
            cloud_cover,
            sun_elevation,
        })
    }

    fn weather(age_minutes: i64) -> Record {
        Record::Weather(WeatherSnapshot {
            observed_at: fixed_now() - Duration::minutes(age_minutes),
            coordinates: Coordinates::TOKYO,
            temperature: 24.0,
            humidity: Some(55.0),
            pressure: Some(1012.0),
            wind_speed: 8.0,
            wind_direction: 180.0,
            wind_gust: None,
            visibility: None,
            // Would be LOW if the optical rules applied.
            cloud_cover: Some(100.0),
            precipitation: None,
            precipitation_probability: None,
            uv_index: None,
            weather_code: 3,
        })
    }

    #[test]
    fn test_old_record_is_stale_before_anything_else() {
        let record = product(ProductId::SolarRadiation, 61, 99.0, 0.0);
        assert_eq!(
            assess(&record, fixed_now(), &QualityThresholds::default()),
            QualityVerdict::Stale
        );
    }

    #[test]
    fn test_exactly_at_age_limit_is_not_stale() {
        let record = product(ProductId::SeaSurfaceTemperature, 60, 10.0, 45.0);
        assert_ne!(
            assess(&record, fixed_now(), &QualityThresholds::default()),
            QualityVerdict::Stale
        );
    }

    #[test]
    fn test_cloudy_sea_surface_temperature_is_low() {
        // 5 minutes old, 95% cloud: the cloud rule fires, not the freshness one.
        let record = product(ProductId::SeaSurfaceTemperature, 5, 95.0, 45.0);
        assert_eq!(
            assess(&record, fixed_now(), &QualityThresholds::default()),
            QualityVerdict::Low
        );
    }

    #[test]
    fn test_low_sun_is_low() {
        let record = product(ProductId::VegetationIndex, 5, 20.0, 4.0);
        assert_eq!(
            assess(&record, fixed_now(), &QualityThresholds::default()),
            QualityVerdict::Low
        );
    }

    #[test]
    fn test_fresh_relative_to_half_interval_is_high() {
        // Cloud top height updates every 10 minutes; 4 minutes old is < 5.
        let record = product(ProductId::CloudTopHeight, 4, 20.0, 45.0);
        assert_eq!(
            assess(&record, fixed_now(), &QualityThresholds::default()),
            QualityVerdict::High
        );
    }

    #[test]
    fn test_past_half_interval_is_medium() {
        let record = product(ProductId::CloudTopHeight, 6, 20.0, 45.0);
        assert_eq!(
            assess(&record, fixed_now(), &QualityThresholds::default()),
            QualityVerdict::Medium
        );
    }

    #[test]
    fn test_weather_skips_optical_rules() {
        let thresholds = QualityThresholds::default();
        assert_eq!(assess(&weather(2), fixed_now(), &thresholds), QualityVerdict::High);
        assert_eq!(assess(&weather(20), fixed_now(), &thresholds), QualityVerdict::Medium);
        assert_eq!(assess(&weather(90), fixed_now(), &thresholds), QualityVerdict::Stale);
    }

    #[test]
    fn test_infrared_imagery_at_night_is_not_low() {
        let thresholds = QualityThresholds::default();
        let record = imagery(ImagerySource::HimawariInfrared, 5, 20.0, -30.0);
        assert!(!record.is_optical());
        assert_eq!(assess(&record, fixed_now(), &thresholds), QualityVerdict::High);

        // Infrared sees cloud tops, so full overcast is not a defect either.
        let record = imagery(ImagerySource::HimawariWaterVapor, 20, 98.0, -30.0);
        assert_eq!(assess(&record, fixed_now(), &thresholds), QualityVerdict::Medium);
    }

    #[test]
    fn test_visible_imagery_at_night_is_low() {
        let record = imagery(ImagerySource::HimawariJapan, 5, 20.0, -30.0);
        assert!(record.is_optical());
        assert_eq!(
            assess(&record, fixed_now(), &QualityThresholds::default()),
            QualityVerdict::Low
        );
    }

    #[test]
    fn test_radar_uses_its_own_interval() {
        // Radar refreshes every 5 minutes, so 3 minutes old is past half.
        let record = imagery(ImagerySource::JmaRadarNationwide, 3, 100.0, -10.0);
        assert_eq!(
            assess(&record, fixed_now(), &QualityThresholds::default()),
            QualityVerdict::Medium
        );
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = QualityThresholds {
            cloud_coverage_limit: 50.0,
            ..QualityThresholds::default()
        };
        let record = product(ProductId::AerosolOpticalDepth, 5, 60.0, 45.0);
        assert_eq!(assess(&record, fixed_now(), &thresholds), QualityVerdict::Low);
    }

    #[test]
    fn test_assess_is_deterministic() {
        let thresholds = QualityThresholds::default();
        for record in [
            product(ProductId::WildfireCount, 3, 12.0, 30.0),
            imagery(ImagerySource::HimawariJapan, 40, 91.0, 30.0),
            weather(7),
        ] {
            let first = assess(&record, fixed_now(), &thresholds);
            let second = assess(&record, fixed_now(), &thresholds);
            assert_eq!(first, second);
        }
    }
}

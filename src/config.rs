//! Startup configuration.
//!
//! All tunables live in one immutable [`Config`] built once in `main` and
//! passed down by reference. Values come from `SKYWARD_*` environment
//! variables; anything unset falls back to a default. A variable that is set
//! but cannot be parsed is a fatal [`ConfigError`].

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::model::{Coordinates, Locus, Severity};

/// Default HTTP port for the query surface.
pub const DEFAULT_PORT: u16 = 3000;

/// Default Open-Meteo base URL.
pub const DEFAULT_OPEN_METEO_URL: &str = "https://api.open-meteo.com";

/// Default satellite product gateway.
pub const DEFAULT_HIMAWARI_URL: &str = "https://www.data.jma.go.jp/mscweb/data/himawari";

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub location: Coordinates,
    pub locus: Locus,
    pub port: u16,
    pub open_meteo_url: String,
    pub himawari_url: String,
    pub schedule: ScheduleConfig,
    pub alerts: AlertConfig,
    pub quality: QualityThresholds,
    pub comfort: ComfortConfig,
    pub trend: TrendConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            location: Coordinates::TOKYO,
            locus: Locus::default(),
            port: DEFAULT_PORT,
            open_meteo_url: DEFAULT_OPEN_METEO_URL.to_string(),
            himawari_url: DEFAULT_HIMAWARI_URL.to_string(),
            schedule: ScheduleConfig::default(),
            alerts: AlertConfig::default(),
            quality: QualityThresholds::default(),
            comfort: ComfortConfig::default(),
            trend: TrendConfig::default(),
        }
    }
}

/// Refresh cadence and retry policy.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    /// Weather polling interval in normal mode.
    pub base_interval: Duration,
    /// Weather polling interval while a HIGH alert is active.
    pub fast_interval: Duration,
    /// Delay before retrying a feed whose last fetch failed.
    pub retry_delay: Duration,
    /// Consecutive failures retried at `retry_delay` before falling back
    /// to the normal cadence.
    pub max_fast_retries: u32,
    /// Hard timeout for a single fetch.
    pub request_timeout: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(600),
            fast_interval: Duration::from_secs(300),
            retry_delay: Duration::from_secs(60),
            max_fast_retries: 3,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Per-kind alert thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertThresholds {
    /// °C, alert when strictly above.
    pub temperature_high: f64,
    /// °C, alert when strictly below.
    pub temperature_low: f64,
    /// km/h.
    pub wind_speed: f64,
    /// km/h.
    pub gust_speed: f64,
    /// %.
    pub rain_probability: f64,
    pub uv_index: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            temperature_high: 35.0,
            temperature_low: -10.0,
            wind_speed: 50.0,
            gust_speed: 70.0,
            rain_probability: 80.0,
            uv_index: 8.0,
        }
    }
}

/// Optional tiering of severity by distance past the threshold.
///
/// A value less than `medium_margin` past its threshold is LOW, less than
/// `high_margin` is MEDIUM, anything further is HIGH.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeverityTiers {
    pub medium_margin: f64,
    pub high_margin: f64,
}

impl SeverityTiers {
    pub fn severity_for(&self, excess: f64) -> Severity {
        if excess < self.medium_margin {
            Severity::Low
        } else if excess < self.high_margin {
            Severity::Medium
        } else {
            Severity::High
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertConfig {
    pub thresholds: AlertThresholds,
    /// When unset each kind carries its fixed default severity.
    pub tiers: Option<SeverityTiers>,
    /// Consecutive clear cycles required before an alert is removed.
    /// `1` clears on the first reading back inside the threshold.
    pub clear_after_cycles: u32,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            thresholds: AlertThresholds::default(),
            tiers: None,
            clear_after_cycles: 1,
        }
    }
}

/// Satellite quality thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityThresholds {
    /// %, above this optical products are unreliable.
    pub cloud_coverage_limit: f64,
    /// Degrees, below this visible imagery is unreliable.
    pub sun_elevation_min: f64,
    /// Records older than this are STALE.
    pub data_age_limit: Duration,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            cloud_coverage_limit: 90.0,
            sun_elevation_min: 10.0,
            data_age_limit: Duration::from_secs(3600),
        }
    }
}

/// Inclusive comfortable band for one quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub low: f64,
    pub high: f64,
}

impl Band {
    /// Distance outside the band, zero inside it.
    pub fn deviation(&self, value: f64) -> f64 {
        if value < self.low {
            self.low - value
        } else if value > self.high {
            value - self.high
        } else {
            0.0
        }
    }
}

/// Comfort score weights and label breakpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct ComfortConfig {
    pub temperature_band: Band,
    pub humidity_band: Band,
    pub wind_band: Band,
    /// Penalty per °C outside the temperature band.
    pub temperature_weight: f64,
    /// Penalty per % outside the humidity band.
    pub humidity_weight: f64,
    /// Penalty per km/h outside the wind band.
    pub wind_weight: f64,
    /// Flat penalty when any precipitation is falling.
    pub precipitation_penalty: f64,
    pub excellent_min: f64,
    pub good_min: f64,
    pub fair_min: f64,
    pub poor_min: f64,
}

impl Default for ComfortConfig {
    fn default() -> Self {
        Self {
            temperature_band: Band { low: 20.0, high: 25.0 },
            humidity_band: Band { low: 40.0, high: 60.0 },
            wind_band: Band { low: 5.0, high: 15.0 },
            temperature_weight: 5.0,
            humidity_weight: 1.0,
            wind_weight: 1.0,
            precipitation_penalty: 20.0,
            excellent_min: 85.0,
            good_min: 65.0,
            fair_min: 45.0,
            poor_min: 25.0,
        }
    }
}

/// Trend detection over the rolling window.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendConfig {
    /// Compare the latest value with the one this many cycles earlier.
    pub lookback_cycles: usize,
    /// Snapshots retained in the rolling window.
    pub history_capacity: usize,
    /// °C below which temperature is steady.
    pub temperature_delta: f64,
    /// hPa below which pressure is steady.
    pub pressure_delta: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            lookback_cycles: 6,
            history_capacity: 7,
            temperature_delta: 0.5,
            pressure_delta: 1.0,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// A `.env` file in the working directory is honoured if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let env = Env { lookup: &lookup };

        let location = Coordinates {
            latitude: env.parse("SKYWARD_LATITUDE", defaults.location.latitude)?,
            longitude: env.parse("SKYWARD_LONGITUDE", defaults.location.longitude)?,
        };

        let schedule = ScheduleConfig {
            base_interval: env.secs("SKYWARD_UPDATE_INTERVAL_SECS", defaults.schedule.base_interval)?,
            fast_interval: env.secs("SKYWARD_FAST_INTERVAL_SECS", defaults.schedule.fast_interval)?,
            retry_delay: env.secs("SKYWARD_RETRY_DELAY_SECS", defaults.schedule.retry_delay)?,
            max_fast_retries: env.parse("SKYWARD_MAX_FAST_RETRIES", defaults.schedule.max_fast_retries)?,
            request_timeout: env.secs(
                "SKYWARD_REQUEST_TIMEOUT_SECS",
                defaults.schedule.request_timeout,
            )?,
        };

        let t = &defaults.alerts.thresholds;
        let thresholds = AlertThresholds {
            temperature_high: env.parse("SKYWARD_ALERT_TEMPERATURE_HIGH", t.temperature_high)?,
            temperature_low: env.parse("SKYWARD_ALERT_TEMPERATURE_LOW", t.temperature_low)?,
            wind_speed: env.parse("SKYWARD_ALERT_WIND_SPEED", t.wind_speed)?,
            gust_speed: env.parse("SKYWARD_ALERT_GUST_SPEED", t.gust_speed)?,
            rain_probability: env.parse("SKYWARD_ALERT_RAIN_PROBABILITY", t.rain_probability)?,
            uv_index: env.parse("SKYWARD_ALERT_UV_INDEX", t.uv_index)?,
        };

        let tiers = match (
            env.optional::<f64>("SKYWARD_ALERT_TIER_MEDIUM_MARGIN")?,
            env.optional::<f64>("SKYWARD_ALERT_TIER_HIGH_MARGIN")?,
        ) {
            (Some(medium_margin), Some(high_margin)) => Some(SeverityTiers {
                medium_margin,
                high_margin,
            }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::OutOfRange {
                    key: "SKYWARD_ALERT_TIER_MEDIUM_MARGIN".to_string(),
                    reason: "both tier margins must be set together".to_string(),
                });
            }
        };

        let alerts = AlertConfig {
            thresholds,
            tiers,
            clear_after_cycles: env.parse(
                "SKYWARD_ALERT_CLEAR_AFTER",
                defaults.alerts.clear_after_cycles,
            )?,
        };

        let quality = QualityThresholds {
            cloud_coverage_limit: env.parse(
                "SKYWARD_CLOUD_COVERAGE_LIMIT",
                defaults.quality.cloud_coverage_limit,
            )?,
            sun_elevation_min: env.parse(
                "SKYWARD_SUN_ELEVATION_MIN",
                defaults.quality.sun_elevation_min,
            )?,
            data_age_limit: env.secs("SKYWARD_DATA_AGE_LIMIT_SECS", defaults.quality.data_age_limit)?,
        };

        let trend = TrendConfig {
            lookback_cycles: env.parse("SKYWARD_TREND_LOOKBACK", defaults.trend.lookback_cycles)?,
            history_capacity: env.parse(
                "SKYWARD_HISTORY_CAPACITY",
                defaults.trend.history_capacity,
            )?,
            ..defaults.trend
        };

        let config = Config {
            location,
            locus: env
                .raw("SKYWARD_LOCUS")
                .map(Locus)
                .unwrap_or(defaults.locus),
            port: env.parse("SKYWARD_PORT", defaults.port)?,
            open_meteo_url: env
                .raw("SKYWARD_OPEN_METEO_URL")
                .unwrap_or(defaults.open_meteo_url),
            himawari_url: env
                .raw("SKYWARD_HIMAWARI_URL")
                .unwrap_or(defaults.himawari_url),
            schedule,
            alerts,
            quality,
            comfort: defaults.comfort,
            trend,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values no runtime path could work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let out_of_range = |key: &str, reason: &str| ConfigError::OutOfRange {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        if !(-90.0..=90.0).contains(&self.location.latitude) {
            return Err(out_of_range("SKYWARD_LATITUDE", "must be within [-90, 90]"));
        }
        if !(-180.0..=180.0).contains(&self.location.longitude) {
            return Err(out_of_range("SKYWARD_LONGITUDE", "must be within [-180, 180]"));
        }
        if self.schedule.base_interval.is_zero() || self.schedule.fast_interval.is_zero() {
            return Err(out_of_range("SKYWARD_UPDATE_INTERVAL_SECS", "must be positive"));
        }
        if self.schedule.request_timeout.is_zero() {
            return Err(out_of_range("SKYWARD_REQUEST_TIMEOUT_SECS", "must be positive"));
        }
        if self.alerts.clear_after_cycles == 0 {
            return Err(out_of_range("SKYWARD_ALERT_CLEAR_AFTER", "must be at least 1"));
        }
        if let Some(tiers) = self.alerts.tiers {
            if tiers.medium_margin > tiers.high_margin {
                return Err(out_of_range(
                    "SKYWARD_ALERT_TIER_MEDIUM_MARGIN",
                    "must not exceed the high margin",
                ));
            }
        }
        if self.trend.lookback_cycles == 0 {
            return Err(out_of_range("SKYWARD_TREND_LOOKBACK", "must be at least 1"));
        }
        // The window holds the latest snapshot plus `lookback_cycles` before it.
        if self.trend.history_capacity <= self.trend.lookback_cycles {
            return Err(out_of_range(
                "SKYWARD_HISTORY_CAPACITY",
                "must exceed SKYWARD_TREND_LOOKBACK",
            ));
        }
        Ok(())
    }
}

struct Env<'a, F> {
    lookup: &'a F,
}

impl<F> Env<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn optional<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.raw(key) {
            Some(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::Unparsable {
                    key: key.to_string(),
                    value,
                }),
            None => Ok(None),
        }
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        Ok(self.optional(key)?.unwrap_or(default))
    }

    fn secs(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        Ok(self
            .optional::<u64>(key)?
            .map(Duration::from_secs)
            .unwrap_or(default))
    }
}

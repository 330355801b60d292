//! Open-Meteo client for the JMA numeric weather model.
//!
//! One request returns the current-weather block plus hourly and daily
//! series. The current block supplies temperature and wind; humidity,
//! pressure, gusts and the rest are read from the hourly slot that covers
//! the current observation time.
//!
//! # API Reference
//!
//! See: <https://open-meteo.com/en/docs/jma-api>
//!
//! # License
//!
//! Data is available under CC BY 4.0.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Feed, SourceClient, check_status};
use crate::config::DEFAULT_OPEN_METEO_URL;
use crate::error::FetchError;
use crate::model::{
    Coordinates, DailyForecast, Forecast, HourlyForecast, Record, WeatherCondition,
    WeatherSnapshot,
};

/// Hourly forecast entries kept from the current hour onward.
pub const HOURLY_FORECAST_LEN: usize = 24;

/// Daily forecast entries kept.
pub const DAILY_FORECAST_LEN: usize = 7;

const HOURLY_FIELDS: &str = "temperature_2m,relative_humidity_2m,pressure_msl,wind_gusts_10m,\
visibility,cloud_cover,precipitation,precipitation_probability,uv_index,weather_code";

const DAILY_FIELDS: &str = "weather_code,temperature_2m_max,temperature_2m_min,precipitation_sum,\
precipitation_probability_max,uv_index_max,sunrise,sunset";

/// Client for Open-Meteo's JMA endpoint.
#[derive(Clone)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
    base_url: String,
}

impl Default for OpenMeteoClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenMeteoClient {
    /// Create a new Open-Meteo client with default settings.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_OPEN_METEO_URL.to_string(),
        }
    }

    /// Create a new Open-Meteo client with a custom base URL (for testing).
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create a client around a preconfigured HTTP client.
    pub fn with_client(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the raw forecast payload for a point.
    pub async fn get_forecast(&self, coordinates: Coordinates) -> Result<OpenMeteoResponse, FetchError> {
        let url = format!(
            "{}/v1/jma?latitude={}&longitude={}&hourly={}&daily={}&current_weather=true&timeformat=unixtime&timezone=UTC",
            self.base_url, coordinates.latitude, coordinates.longitude, HOURLY_FIELDS, DAILY_FIELDS
        );

        let response = check_status(self.client.get(&url).send().await?).await?;
        let data = response.json::<OpenMeteoResponse>().await?;
        Ok(data)
    }
}

#[async_trait]
impl SourceClient for OpenMeteoClient {
    async fn fetch(
        &self,
        feed: Feed,
        coordinates: Coordinates,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Record>, FetchError> {
        if feed != Feed::Weather {
            return Err(FetchError::BadResponse(format!(
                "open-meteo does not serve {feed}"
            )));
        }

        let data = self.get_forecast(coordinates).await?;
        let (snapshot, forecast) = data.into_records(coordinates)?;

        if since.is_some_and(|since| snapshot.observed_at <= since) {
            return Ok(Vec::new());
        }
        Ok(vec![Record::Weather(snapshot), Record::Forecast(forecast)])
    }
}

// ============================================================================
// Response types
// ============================================================================

/// Response from the `/v1/jma` endpoint with `timeformat=unixtime`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenMeteoResponse {
    pub current_weather: Option<CurrentWeather>,

    #[serde(default)]
    pub hourly: HourlySeries,

    #[serde(default)]
    pub daily: DailySeries,
}

/// The `current_weather` block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentWeather {
    /// Unix timestamp of the observation.
    pub time: i64,
    pub temperature: f64,
    pub windspeed: f64,
    pub winddirection: f64,
    pub weathercode: i32,
}

/// Parallel hourly arrays. Any series may be absent or contain nulls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HourlySeries {
    #[serde(default)]
    pub time: Vec<i64>,
    #[serde(default)]
    pub temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    pub relative_humidity_2m: Vec<Option<f64>>,
    #[serde(default)]
    pub pressure_msl: Vec<Option<f64>>,
    #[serde(default)]
    pub wind_gusts_10m: Vec<Option<f64>>,
    #[serde(default)]
    pub visibility: Vec<Option<f64>>,
    #[serde(default)]
    pub cloud_cover: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation_probability: Vec<Option<f64>>,
    #[serde(default)]
    pub uv_index: Vec<Option<f64>>,
    #[serde(default)]
    pub weather_code: Vec<Option<i32>>,
}

/// Parallel daily arrays.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailySeries {
    #[serde(default)]
    pub time: Vec<i64>,
    #[serde(default)]
    pub weather_code: Vec<Option<i32>>,
    #[serde(default)]
    pub temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    pub temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation_probability_max: Vec<Option<f64>>,
    #[serde(default)]
    pub uv_index_max: Vec<Option<f64>>,
    #[serde(default)]
    pub sunrise: Vec<Option<i64>>,
    #[serde(default)]
    pub sunset: Vec<Option<i64>>,
}

fn at<T: Copy>(series: &[Option<T>], index: usize) -> Option<T> {
    series.get(index).copied().flatten()
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, FetchError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| FetchError::BadResponse(format!("timestamp out of range: {secs}")))
}

impl HourlySeries {
    /// Index of the latest hourly slot not after `time`, or 0 when every
    /// slot is later (or the series is empty).
    pub fn index_at(&self, time: i64) -> usize {
        self.time
            .iter()
            .enumerate()
            .filter(|(_, t)| **t <= time)
            .max_by_key(|(_, t)| **t)
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

impl OpenMeteoResponse {
    /// Convert the payload into a snapshot and a forecast.
    pub fn into_records(
        self,
        coordinates: Coordinates,
    ) -> Result<(WeatherSnapshot, Forecast), FetchError> {
        let current = self
            .current_weather
            .ok_or_else(|| FetchError::BadResponse("missing current_weather block".to_string()))?;
        let observed_at = timestamp(current.time)?;
        let hourly = &self.hourly;
        let idx = hourly.index_at(current.time);

        let snapshot = WeatherSnapshot {
            observed_at,
            coordinates,
            temperature: current.temperature,
            humidity: at(&hourly.relative_humidity_2m, idx),
            pressure: at(&hourly.pressure_msl, idx),
            wind_speed: current.windspeed,
            wind_direction: current.winddirection,
            wind_gust: at(&hourly.wind_gusts_10m, idx),
            visibility: at(&hourly.visibility, idx),
            cloud_cover: at(&hourly.cloud_cover, idx),
            precipitation: at(&hourly.precipitation, idx),
            precipitation_probability: at(&hourly.precipitation_probability, idx),
            uv_index: at(&hourly.uv_index, idx),
            weather_code: current.weathercode,
        };

        let hourly_forecast = hourly
            .time
            .iter()
            .enumerate()
            .skip(idx)
            .take(HOURLY_FORECAST_LEN)
            .map(|(i, t)| {
                Ok(HourlyForecast {
                    time: timestamp(*t)?,
                    temperature: at(&hourly.temperature_2m, i),
                    condition: at(&hourly.weather_code, i)
                        .map(WeatherCondition::from_wmo_code)
                        .unwrap_or(WeatherCondition::Unknown),
                    precipitation: at(&hourly.precipitation, i),
                    precipitation_probability: at(&hourly.precipitation_probability, i),
                })
            })
            .collect::<Result<Vec<_>, FetchError>>()?;

        let daily = &self.daily;
        let daily_forecast = daily
            .time
            .iter()
            .enumerate()
            .take(DAILY_FORECAST_LEN)
            .map(|(i, t)| {
                Ok(DailyForecast {
                    date: timestamp(*t)?,
                    temperature_max: at(&daily.temperature_2m_max, i),
                    temperature_min: at(&daily.temperature_2m_min, i),
                    condition: at(&daily.weather_code, i)
                        .map(WeatherCondition::from_wmo_code)
                        .unwrap_or(WeatherCondition::Unknown),
                    precipitation_sum: at(&daily.precipitation_sum, i),
                    precipitation_probability: at(&daily.precipitation_probability_max, i),
                    uv_index_max: at(&daily.uv_index_max, i),
                    sunrise: at(&daily.sunrise, i).and_then(|s| DateTime::from_timestamp(s, 0)),
                    sunset: at(&daily.sunset, i).and_then(|s| DateTime::from_timestamp(s, 0)),
                })
            })
            .collect::<Result<Vec<_>, FetchError>>()?;

        let forecast = Forecast {
            issued_at: observed_at,
            hourly: hourly_forecast,
            daily: daily_forecast,
        };

        Ok((snapshot, forecast))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // 2024-08-01T03:00:00Z
    const NOW: i64 = 1722481200;

    fn payload() -> serde_json::Value {
        json!({
            "current_weather": {
                "time": NOW + 900,
                "temperature": 36.0,
                "windspeed": 20.0,
                "winddirection": 135.0,
                "weathercode": 1
            },
            "hourly": {
                "time": [NOW - 3600, NOW, NOW + 3600],
                "temperature_2m": [34.5, 36.0, 36.4],
                "relative_humidity_2m": [72.0, 70.0, 68.0],
                "pressure_msl": [1006.0, 1005.5, null],
                "wind_gusts_10m": [30.0, 35.0, 38.0],
                "precipitation_probability": [5.0, 10.0, 20.0],
                "uv_index": [7.0, 9.5, 9.8],
                "weather_code": [0, 1, 2]
            },
            "daily": {
                "time": [NOW - 10800, NOW + 75600],
                "weather_code": [1, 61],
                "temperature_2m_max": [37.0, 33.0],
                "temperature_2m_min": [27.0, 25.5],
                "sunrise": [NOW - 30000, null]
            }
        })
    }

    fn parse(value: serde_json::Value) -> (WeatherSnapshot, Forecast) {
        let response: OpenMeteoResponse = serde_json::from_value(value).unwrap();
        response.into_records(Coordinates::TOKYO).unwrap()
    }

    #[test]
    fn test_snapshot_reads_current_hour() {
        let (snapshot, _) = parse(payload());

        assert_eq!(snapshot.temperature, 36.0);
        assert_eq!(snapshot.wind_speed, 20.0);
        assert_eq!(snapshot.humidity, Some(70.0));
        assert_eq!(snapshot.pressure, Some(1005.5));
        assert_eq!(snapshot.wind_gust, Some(35.0));
        assert_eq!(snapshot.precipitation_probability, Some(10.0));
        assert_eq!(snapshot.uv_index, Some(9.5));
        assert_eq!(snapshot.visibility, None);
        assert_eq!(snapshot.observed_at.timestamp(), NOW + 900);
        assert_eq!(snapshot.coordinates, Coordinates::TOKYO);
    }

    #[test]
    fn test_forecast_starts_at_current_hour() {
        let (_, forecast) = parse(payload());

        assert_eq!(forecast.hourly.len(), 2);
        assert_eq!(forecast.hourly[0].time.timestamp(), NOW);
        assert_eq!(forecast.hourly[1].condition, WeatherCondition::PartlyCloudy);

        assert_eq!(forecast.daily.len(), 2);
        assert_eq!(forecast.daily[1].condition, WeatherCondition::Rain);
        assert!(forecast.daily[0].sunrise.is_some());
        assert!(forecast.daily[1].sunrise.is_none());
        assert_eq!(forecast.daily[0].precipitation_sum, None);
    }

    #[test]
    fn test_index_falls_back_to_first_slot() {
        let series = HourlySeries {
            time: vec![NOW + 3600, NOW + 7200],
            ..HourlySeries::default()
        };
        assert_eq!(series.index_at(NOW), 0);
        assert_eq!(HourlySeries::default().index_at(NOW), 0);
    }

    #[test]
    fn test_missing_current_block_is_bad_response() {
        let response: OpenMeteoResponse = serde_json::from_value(json!({"hourly": {}})).unwrap();
        let err = response.into_records(Coordinates::TOKYO).unwrap_err();
        assert!(matches!(err, FetchError::BadResponse(_)));
    }

    #[test]
    fn test_hourly_forecast_is_capped() {
        let mut value = payload();
        let times: Vec<i64> = (0..48).map(|h| NOW + h * 3600).collect();
        value["hourly"] = json!({ "time": times });

        let (_, forecast) = parse(value);
        assert_eq!(forecast.hourly.len(), HOURLY_FORECAST_LEN);
        assert_eq!(forecast.hourly[0].temperature, None);
    }
}

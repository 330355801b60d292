//! Derived weather metrics.
//!
//! Every function here is pure: the same snapshot, history and
//! configuration always give the same result. [`derive`] bundles them into
//! a [`DerivedMetrics`] value for the latest snapshot.
//!
//! # Formulas
//!
//! - Heat index: Rothfusz regression (NWS), evaluated in °F and converted
//!   back, only at 27 °C and above. The result never drops below the air
//!   temperature.
//! - Wind chill: Environment Canada / NWS formula in °C and km/h, used when
//!   the temperature is at most 10 °C and the wind at least 5 km/h.

use chrono::{DateTime, Utc};

use crate::config::{ComfortConfig, TrendConfig};
use crate::model::{
    ComfortLabel, DerivedMetrics, OutdoorSuitability, Trend, TrendDirection, UvRisk,
    WeatherSnapshot,
};

/// Temperature at or above which the heat index applies, °C.
pub const HEAT_INDEX_MIN_TEMPERATURE: f64 = 27.0;

/// Temperature at or below which wind chill applies, °C.
pub const WIND_CHILL_MAX_TEMPERATURE: f64 = 10.0;

/// Wind speed at or above which wind chill applies, km/h.
pub const WIND_CHILL_MIN_WIND: f64 = 5.0;

const CARDINALS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// Heat index in °C.
///
/// # Arguments
///
/// * `temperature` - Air temperature, °C
/// * `humidity` - Relative humidity, %
pub fn heat_index(temperature: f64, humidity: f64) -> f64 {
    if temperature < HEAT_INDEX_MIN_TEMPERATURE {
        return temperature;
    }

    let t = temperature * 9.0 / 5.0 + 32.0;
    let rh = humidity.clamp(0.0, 100.0);

    let hi = -42.379 + 2.049_015_23 * t + 10.143_331_27 * rh
        - 0.224_755_41 * t * rh
        - 6.837_83e-3 * t * t
        - 5.481_717e-2 * rh * rh
        + 1.228_74e-3 * t * t * rh
        + 8.528_2e-4 * t * rh * rh
        - 1.99e-6 * t * t * rh * rh;

    let hi_c = (hi - 32.0) * 5.0 / 9.0;
    hi_c.max(temperature)
}

/// Wind chill in °C for a temperature in °C and a wind speed in km/h.
pub fn wind_chill(temperature: f64, wind_speed: f64) -> f64 {
    let v = wind_speed.powf(0.16);
    13.12 + 0.6215 * temperature - 11.37 * v + 0.3965 * temperature * v
}

/// Apparent temperature.
///
/// Cold and hot branches never overlap; between 10 and 27 °C the air
/// temperature is returned unchanged. A missing humidity reading disables
/// the heat-index branch.
pub fn feels_like(temperature: f64, humidity: Option<f64>, wind_speed: f64) -> f64 {
    if temperature <= WIND_CHILL_MAX_TEMPERATURE && wind_speed >= WIND_CHILL_MIN_WIND {
        wind_chill(temperature, wind_speed)
    } else if temperature >= HEAT_INDEX_MIN_TEMPERATURE {
        humidity.map_or(temperature, |rh| heat_index(temperature, rh))
    } else {
        temperature
    }
}

/// Comfort score in `[0, 100]`.
///
/// Missing humidity or precipitation contributes no penalty.
pub fn comfort_score(
    temperature: f64,
    humidity: Option<f64>,
    wind_speed: f64,
    precipitation: Option<f64>,
    config: &ComfortConfig,
) -> f64 {
    let mut penalty = config.temperature_weight * config.temperature_band.deviation(temperature)
        + config.wind_weight * config.wind_band.deviation(wind_speed);

    if let Some(rh) = humidity {
        penalty += config.humidity_weight * config.humidity_band.deviation(rh);
    }
    if precipitation.is_some_and(|p| p > 0.0) {
        penalty += config.precipitation_penalty;
    }

    (100.0 - penalty).clamp(0.0, 100.0)
}

pub fn comfort_label(score: f64, config: &ComfortConfig) -> ComfortLabel {
    if score >= config.excellent_min {
        ComfortLabel::Excellent
    } else if score >= config.good_min {
        ComfortLabel::Good
    } else if score >= config.fair_min {
        ComfortLabel::Fair
    } else if score >= config.poor_min {
        ComfortLabel::Poor
    } else {
        ComfortLabel::Harsh
    }
}

/// Compare the last cycle's value with the one `lookback` cycles earlier.
///
/// `values` holds one entry per refresh cycle, `None` where that cycle had
/// no reading. With fewer cycles than `lookback + 1` the oldest cycle is
/// used. No trend is reported with fewer than two cycles, or when either
/// end of the comparison lacks a reading.
pub fn trend(values: &[Option<f64>], lookback: usize, delta: f64) -> Option<Trend> {
    if values.len() < 2 || lookback == 0 {
        return None;
    }

    let latest = values.len() - 1;
    let cycles_back = lookback.min(latest);
    let change = values[latest]? - values[latest - cycles_back]?;

    let direction = if change > delta {
        TrendDirection::Rising
    } else if change < -delta {
        TrendDirection::Falling
    } else {
        TrendDirection::Steady
    };

    Some(Trend {
        direction,
        change,
        cycles_back,
    })
}

/// 16-point compass name for a bearing in degrees.
pub fn wind_cardinal(degrees: f64) -> &'static str {
    let normalized = degrees.rem_euclid(360.0);
    let index = ((normalized / 22.5) + 0.5).floor() as usize % CARDINALS.len();
    CARDINALS[index]
}

pub fn outdoor_suitability(snapshot: &WeatherSnapshot) -> OutdoorSuitability {
    let precipitation = snapshot.precipitation.unwrap_or(0.0);
    let uv = snapshot.uv_index.unwrap_or(0.0);

    if precipitation > 5.0 || snapshot.wind_speed > 40.0 {
        OutdoorSuitability::NotSuitable
    } else if snapshot.temperature < -5.0 || snapshot.temperature > 40.0 {
        OutdoorSuitability::CautionRequired
    } else if precipitation > 0.0 || snapshot.wind_speed > 25.0 || uv > 9.0 {
        OutdoorSuitability::Moderate
    } else {
        OutdoorSuitability::Suitable
    }
}

/// Derive every metric for `snapshot`.
///
/// `history` is the rolling window, oldest first, and is expected to end
/// with `snapshot` itself.
pub fn derive(
    snapshot: &WeatherSnapshot,
    history: &[WeatherSnapshot],
    comfort: &ComfortConfig,
    trend_config: &TrendConfig,
    now: DateTime<Utc>,
) -> DerivedMetrics {
    let temperatures: Vec<Option<f64>> = history.iter().map(|s| Some(s.temperature)).collect();
    let pressures: Vec<Option<f64>> = history.iter().map(|s| s.pressure).collect();

    let score = comfort_score(
        snapshot.temperature,
        snapshot.humidity,
        snapshot.wind_speed,
        snapshot.precipitation,
        comfort,
    );

    DerivedMetrics {
        computed_at: now,
        observed_at: snapshot.observed_at,
        heat_index: snapshot
            .humidity
            .map_or(snapshot.temperature, |rh| heat_index(snapshot.temperature, rh)),
        feels_like: feels_like(snapshot.temperature, snapshot.humidity, snapshot.wind_speed),
        comfort_score: score,
        comfort_label: comfort_label(score, comfort),
        temperature_trend: trend(
            &temperatures,
            trend_config.lookback_cycles,
            trend_config.temperature_delta,
        ),
        pressure_trend: trend(
            &pressures,
            trend_config.lookback_cycles,
            trend_config.pressure_delta,
        ),
        condition: snapshot.condition(),
        wind_cardinal: wind_cardinal(snapshot.wind_direction).to_string(),
        uv_risk: snapshot.uv_index.map(UvRisk::from_index),
        outdoor_suitability: outdoor_suitability(snapshot),
    }
}

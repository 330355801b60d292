//! Data models for Skyward.
//!
//! Records produced by the source clients are immutable: a newer fetch
//! supersedes a record, it never edits one. Everything here is plain data
//! with serde derives so the query surface can hand it straight to JSON.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Nominal refresh cadence of the numeric weather endpoint.
pub const WEATHER_NOMINAL_INTERVAL: Duration = Duration::from_secs(600);

/// A fixed geographic point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Tokyo, the default deployment point.
    pub const TOKYO: Coordinates = Coordinates {
        latitude: 35.6762,
        longitude: 139.6503,
    };
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}", self.latitude, self.longitude)
    }
}

/// Upstream provider that produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    /// Open-Meteo's JMA model endpoint (numeric weather and forecast).
    OpenMeteoJma,
    /// Himawari-8/9 derived regional products.
    Himawari,
    /// One entry of the imagery catalog.
    Imagery(ImagerySource),
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::OpenMeteoJma => f.write_str("open_meteo_jma"),
            SourceId::Himawari => f.write_str("himawari"),
            SourceId::Imagery(source) => f.write_str(source.slug()),
        }
    }
}

/// Spectral channel a satellite record was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Spectrum {
    Visible,
    TrueColor,
    MultiSpectral,
    Infrared,
    WaterVapor,
    PrecipitationRadar,
}

impl Spectrum {
    /// Whether the channel needs daylight and a clear view of the surface.
    ///
    /// Infrared, water vapour and radar see through darkness, so the cloud
    /// and sun-elevation quality rules do not apply to them.
    pub fn is_optical(&self) -> bool {
        matches!(
            self,
            Spectrum::Visible | Spectrum::TrueColor | Spectrum::MultiSpectral
        )
    }
}

/// Imagery catalog. Each entry is scheduled and cached on its own.
///
/// # Catalog
///
/// | Source | Region | Spectrum | Interval |
/// |--------|--------|----------|----------|
/// | `himawari-japan` | Japan | visible | 30 min |
/// | `himawari-full-disk` | Full Disk | infrared | 60 min |
/// | `himawari-southeast-asia` | Southeast Asia | visible | 30 min |
/// | `jaxa-himawari` | Asia-Pacific | multi-spectral | 10 min |
/// | `jma-radar-nationwide` | Japan | precipitation radar | 5 min |
/// | `himawari-true-color` | Japan | true colour | 30 min |
/// | `himawari-infrared` | Japan | infrared | 30 min |
/// | `himawari-water-vapor` | Japan | water vapour | 30 min |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImagerySource {
    HimawariJapan,
    HimawariFullDisk,
    HimawariSoutheastAsia,
    JaxaHimawari,
    JmaRadarNationwide,
    HimawariTrueColor,
    HimawariInfrared,
    HimawariWaterVapor,
}

impl ImagerySource {
    pub const ALL: [ImagerySource; 8] = [
        ImagerySource::HimawariJapan,
        ImagerySource::HimawariFullDisk,
        ImagerySource::HimawariSoutheastAsia,
        ImagerySource::JaxaHimawari,
        ImagerySource::JmaRadarNationwide,
        ImagerySource::HimawariTrueColor,
        ImagerySource::HimawariInfrared,
        ImagerySource::HimawariWaterVapor,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            ImagerySource::HimawariJapan => "himawari-japan",
            ImagerySource::HimawariFullDisk => "himawari-full-disk",
            ImagerySource::HimawariSoutheastAsia => "himawari-southeast-asia",
            ImagerySource::JaxaHimawari => "jaxa-himawari",
            ImagerySource::JmaRadarNationwide => "jma-radar-nationwide",
            ImagerySource::HimawariTrueColor => "himawari-true-color",
            ImagerySource::HimawariInfrared => "himawari-infrared",
            ImagerySource::HimawariWaterVapor => "himawari-water-vapor",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.slug() == slug)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ImagerySource::HimawariJapan => "Himawari Japan",
            ImagerySource::HimawariFullDisk => "Himawari Full Disk",
            ImagerySource::HimawariSoutheastAsia => "Himawari Southeast Asia",
            ImagerySource::JaxaHimawari => "JAXA Himawari Monitor",
            ImagerySource::JmaRadarNationwide => "JMA Weather Radar - Nationwide",
            ImagerySource::HimawariTrueColor => "Himawari True Color",
            ImagerySource::HimawariInfrared => "Himawari Infrared",
            ImagerySource::HimawariWaterVapor => "Himawari Water Vapor",
        }
    }

    pub fn region(&self) -> &'static str {
        match self {
            ImagerySource::HimawariFullDisk => "full-disk",
            ImagerySource::HimawariSoutheastAsia => "southeast-asia",
            ImagerySource::JaxaHimawari => "asia-pacific",
            ImagerySource::HimawariJapan
            | ImagerySource::JmaRadarNationwide
            | ImagerySource::HimawariTrueColor
            | ImagerySource::HimawariInfrared
            | ImagerySource::HimawariWaterVapor => "japan",
        }
    }

    pub fn spectrum(&self) -> Spectrum {
        match self {
            ImagerySource::HimawariJapan | ImagerySource::HimawariSoutheastAsia => {
                Spectrum::Visible
            }
            ImagerySource::HimawariFullDisk | ImagerySource::HimawariInfrared => {
                Spectrum::Infrared
            }
            ImagerySource::JaxaHimawari => Spectrum::MultiSpectral,
            ImagerySource::JmaRadarNationwide => Spectrum::PrecipitationRadar,
            ImagerySource::HimawariTrueColor => Spectrum::TrueColor,
            ImagerySource::HimawariWaterVapor => Spectrum::WaterVapor,
        }
    }

    /// Band identifier reported when the gateway omits one.
    pub fn band(&self) -> &'static str {
        match self {
            ImagerySource::HimawariJapan | ImagerySource::HimawariSoutheastAsia => "b03",
            ImagerySource::HimawariFullDisk | ImagerySource::HimawariInfrared => "b13",
            ImagerySource::JaxaHimawari => "multi",
            ImagerySource::JmaRadarNationwide => "radar",
            ImagerySource::HimawariTrueColor => "tcr",
            ImagerySource::HimawariWaterVapor => "b08",
        }
    }

    /// Public image location, used when an observation carries no reference.
    pub fn latest_image_url(&self) -> &'static str {
        match self {
            ImagerySource::HimawariJapan => {
                "https://www.data.jma.go.jp/mscweb/data/himawari/img/japan/b03/latest.jpg"
            }
            ImagerySource::HimawariFullDisk => {
                "https://www.data.jma.go.jp/mscweb/data/himawari/img/fd/b13/latest.jpg"
            }
            ImagerySource::HimawariSoutheastAsia => {
                "https://www.data.jma.go.jp/mscweb/data/himawari/sat_img.php?area=se1"
            }
            ImagerySource::JaxaHimawari => "https://www.eorc.jaxa.jp/ptree/",
            ImagerySource::JmaRadarNationwide => "https://www.jma.go.jp/bosai/forecast/img/radar/",
            ImagerySource::HimawariTrueColor => {
                "https://www.data.jma.go.jp/mscweb/data/himawari/img/japan/tcr/latest.jpg"
            }
            ImagerySource::HimawariInfrared => {
                "https://www.data.jma.go.jp/mscweb/data/himawari/img/japan/b13/latest.jpg"
            }
            ImagerySource::HimawariWaterVapor => {
                "https://www.data.jma.go.jp/mscweb/data/himawari/img/japan/b08/latest.jpg"
            }
        }
    }

    pub fn nominal_interval(&self) -> Duration {
        let minutes = match self {
            ImagerySource::JmaRadarNationwide => 5,
            ImagerySource::JaxaHimawari => 10,
            ImagerySource::HimawariFullDisk => 60,
            ImagerySource::HimawariJapan
            | ImagerySource::HimawariSoutheastAsia
            | ImagerySource::HimawariTrueColor
            | ImagerySource::HimawariInfrared
            | ImagerySource::HimawariWaterVapor => 30,
        };
        Duration::from_secs(minutes * 60)
    }
}

impl fmt::Display for ImagerySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Satellite-derived products tracked by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductId {
    SeaSurfaceTemperature,
    CloudTopHeight,
    SolarRadiation,
    AerosolOpticalDepth,
    WildfireCount,
    VegetationIndex,
    ImageryReference,
}

impl ProductId {
    /// Every product, in display order.
    pub const ALL: [ProductId; 7] = [
        ProductId::SeaSurfaceTemperature,
        ProductId::CloudTopHeight,
        ProductId::SolarRadiation,
        ProductId::AerosolOpticalDepth,
        ProductId::WildfireCount,
        ProductId::VegetationIndex,
        ProductId::ImageryReference,
    ];

    /// Products carrying a numeric value. Imagery is fetched per
    /// [`ImagerySource`] instead.
    pub const NUMERIC: [ProductId; 6] = [
        ProductId::SeaSurfaceTemperature,
        ProductId::CloudTopHeight,
        ProductId::SolarRadiation,
        ProductId::AerosolOpticalDepth,
        ProductId::WildfireCount,
        ProductId::VegetationIndex,
    ];

    pub fn is_numeric(&self) -> bool {
        !matches!(self, ProductId::ImageryReference)
    }

    /// Kebab-case identifier used in URLs and logs.
    pub fn slug(&self) -> &'static str {
        match self {
            ProductId::SeaSurfaceTemperature => "sea-surface-temperature",
            ProductId::CloudTopHeight => "cloud-top-height",
            ProductId::SolarRadiation => "solar-radiation",
            ProductId::AerosolOpticalDepth => "aerosol-optical-depth",
            ProductId::WildfireCount => "wildfire-count",
            ProductId::VegetationIndex => "vegetation-index",
            ProductId::ImageryReference => "imagery-reference",
        }
    }

    /// Parse a kebab-case identifier.
    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.slug() == slug)
    }

    /// Get a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            ProductId::SeaSurfaceTemperature => "Sea Surface Temperature",
            ProductId::CloudTopHeight => "Cloud Top Height",
            ProductId::SolarRadiation => "Solar Radiation",
            ProductId::AerosolOpticalDepth => "Aerosol Optical Depth",
            ProductId::WildfireCount => "Wildfire Detection",
            ProductId::VegetationIndex => "Vegetation Index",
            ProductId::ImageryReference => "Satellite Imagery",
        }
    }

    /// Unit of the numeric value, if the product has one.
    pub fn unit(&self) -> Option<&'static str> {
        match self {
            ProductId::SeaSurfaceTemperature => Some("°C"),
            ProductId::CloudTopHeight => Some("km"),
            ProductId::SolarRadiation => Some("W/m²"),
            ProductId::AerosolOpticalDepth => Some("AOD"),
            ProductId::WildfireCount => Some("detections"),
            ProductId::VegetationIndex => Some("NDVI"),
            ProductId::ImageryReference => None,
        }
    }

    /// Numeric retrievals need a clear daytime view of the scene.
    pub fn spectrum(&self) -> Spectrum {
        Spectrum::Visible
    }

    /// Provider-declared refresh cadence.
    ///
    /// Drives both the scheduler and the HIGH quality half-life rule.
    /// Imagery uses the cadence of its [`ImagerySource`].
    pub fn nominal_interval(&self) -> Duration {
        let minutes = match self {
            ProductId::SeaSurfaceTemperature => 60,
            ProductId::CloudTopHeight => 10,
            ProductId::SolarRadiation => 10,
            ProductId::AerosolOpticalDepth => 30,
            ProductId::WildfireCount => 10,
            ProductId::VegetationIndex => 60,
            ProductId::ImageryReference => 30,
        };
        Duration::from_secs(minutes * 60)
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Weather condition categories mapped from WMO codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    Pouring,
    Snow,
    Thunderstorm,
    Unknown,
}

impl WeatherCondition {
    /// Convert a WMO weather code.
    /// See: https://open-meteo.com/en/docs#weathervariables
    pub fn from_wmo_code(code: i32) -> Self {
        match code {
            0 | 1 => Self::Clear,
            2 => Self::PartlyCloudy,
            3 => Self::Cloudy,
            45 | 48 => Self::Fog,
            51 | 53 | 55 | 56 | 57 => Self::Drizzle,
            61 | 63 | 65 | 66 | 67 | 80 | 81 => Self::Rain,
            82 => Self::Pouring,
            71 | 73 | 75 | 77 | 85 | 86 => Self::Snow,
            95 | 96 | 99 => Self::Thunderstorm,
            _ => Self::Unknown,
        }
    }

    /// Get a human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly cloudy",
            Self::Cloudy => "Overcast",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::Pouring => "Violent rain showers",
            Self::Snow => "Snow",
            Self::Thunderstorm => "Thunderstorm",
            Self::Unknown => "Unknown",
        }
    }
}

/// Current conditions at the monitored point.
///
/// Temperature and wind come from the provider's current-weather block and
/// are always present. The remaining fields come from the hourly series and
/// may be missing when the provider has a gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Observation time reported by the provider.
    pub observed_at: DateTime<Utc>,
    pub coordinates: Coordinates,
    /// Air temperature, °C.
    pub temperature: f64,
    /// Relative humidity, %.
    pub humidity: Option<f64>,
    /// Mean sea level pressure, hPa.
    pub pressure: Option<f64>,
    /// Wind speed, km/h.
    pub wind_speed: f64,
    /// Wind direction, degrees.
    pub wind_direction: f64,
    /// Wind gusts, km/h.
    pub wind_gust: Option<f64>,
    /// Visibility, metres.
    pub visibility: Option<f64>,
    /// Cloud cover, %.
    pub cloud_cover: Option<f64>,
    /// Precipitation in the current hour, mm.
    pub precipitation: Option<f64>,
    /// Precipitation probability, %.
    pub precipitation_probability: Option<f64>,
    pub uv_index: Option<f64>,
    /// WMO weather code.
    pub weather_code: i32,
}

impl WeatherSnapshot {
    pub fn condition(&self) -> WeatherCondition {
        WeatherCondition::from_wmo_code(self.weather_code)
    }
}

/// One hourly forecast entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    pub time: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub condition: WeatherCondition,
    pub precipitation: Option<f64>,
    pub precipitation_probability: Option<f64>,
}

/// One daily forecast entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: DateTime<Utc>,
    pub temperature_max: Option<f64>,
    pub temperature_min: Option<f64>,
    pub condition: WeatherCondition,
    pub precipitation_sum: Option<f64>,
    pub precipitation_probability: Option<f64>,
    pub uv_index_max: Option<f64>,
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
}

/// Hourly and daily outlook delivered with the numeric weather fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    /// Observation time of the fetch this forecast came with.
    pub issued_at: DateTime<Utc>,
    pub hourly: Vec<HourlyForecast>,
    pub daily: Vec<DailyForecast>,
}

/// Opaque pointer to a satellite image. Pixels are never decoded here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageryRef {
    pub url: String,
    pub region: String,
    pub band: String,
}

/// Value carried by a satellite product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductValue {
    Numeric(f64),
    Reference(ImageryRef),
}

/// A single satellite product observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatelliteProduct {
    pub product: ProductId,
    pub source: SourceId,
    /// Satellite that captured the scene (e.g. "himawari-9").
    pub platform: String,
    pub value: ProductValue,
    pub spectrum: Spectrum,
    pub captured_at: DateTime<Utc>,
    /// Provider-declared cloud cover over the scene, %.
    pub cloud_cover: f64,
    /// Provider-declared sun elevation at capture, degrees.
    pub sun_elevation: f64,
}

impl SatelliteProduct {
    pub fn nominal_interval(&self) -> Duration {
        match self.source {
            SourceId::Imagery(source) => source.nominal_interval(),
            _ => self.product.nominal_interval(),
        }
    }
}

/// Any typed record a source client can return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Record {
    Weather(WeatherSnapshot),
    Forecast(Forecast),
    Satellite(SatelliteProduct),
}

impl Record {
    /// The time the underlying data describes, used for ageing.
    pub fn captured_at(&self) -> DateTime<Utc> {
        match self {
            Record::Weather(w) => w.observed_at,
            Record::Forecast(f) => f.issued_at,
            Record::Satellite(s) => s.captured_at,
        }
    }

    pub fn source(&self) -> SourceId {
        match self {
            Record::Weather(_) | Record::Forecast(_) => SourceId::OpenMeteoJma,
            Record::Satellite(s) => s.source,
        }
    }

    /// Optical satellite records are subject to the cloud and
    /// sun-elevation checks. Numeric weather and non-optical channels are not.
    pub fn is_optical(&self) -> bool {
        match self {
            Record::Satellite(s) => s.spectrum.is_optical(),
            Record::Weather(_) | Record::Forecast(_) => false,
        }
    }

    pub fn nominal_interval(&self) -> Duration {
        match self {
            Record::Weather(_) | Record::Forecast(_) => WEATHER_NOMINAL_INTERVAL,
            Record::Satellite(s) => s.nominal_interval(),
        }
    }
}

/// Confidence label attached to a cached record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityVerdict {
    High,
    Medium,
    Low,
    Stale,
}

/// Alert severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Which way a threshold is crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    Above,
    Below,
}

/// The closed set of alert conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HeatWarning,
    ColdWarning,
    WindWarning,
    GustWarning,
    RainAlert,
    UvWarning,
}

impl AlertKind {
    pub const ALL: [AlertKind; 6] = [
        AlertKind::HeatWarning,
        AlertKind::ColdWarning,
        AlertKind::WindWarning,
        AlertKind::GustWarning,
        AlertKind::RainAlert,
        AlertKind::UvWarning,
    ];

    /// Severity used when no tiers are configured.
    pub fn default_severity(&self) -> Severity {
        match self {
            AlertKind::HeatWarning | AlertKind::ColdWarning | AlertKind::WindWarning => {
                Severity::High
            }
            AlertKind::GustWarning | AlertKind::RainAlert | AlertKind::UvWarning => {
                Severity::Medium
            }
        }
    }

    /// Cold triggers below its threshold, everything else above.
    pub fn crossing(&self) -> Crossing {
        match self {
            AlertKind::ColdWarning => Crossing::Below,
            _ => Crossing::Above,
        }
    }

    /// The snapshot field this kind watches, if the provider reported it.
    pub fn metric(&self, snapshot: &WeatherSnapshot) -> Option<f64> {
        match self {
            AlertKind::HeatWarning | AlertKind::ColdWarning => Some(snapshot.temperature),
            AlertKind::WindWarning => Some(snapshot.wind_speed),
            AlertKind::GustWarning => snapshot.wind_gust,
            AlertKind::RainAlert => snapshot.precipitation_probability,
            AlertKind::UvWarning => snapshot.uv_index,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AlertKind::HeatWarning => "Extreme Heat Warning",
            AlertKind::ColdWarning => "Extreme Cold Warning",
            AlertKind::WindWarning => "High Wind Warning",
            AlertKind::GustWarning => "Wind Gust Alert",
            AlertKind::RainAlert => "High Rain Probability",
            AlertKind::UvWarning => "High UV Index",
        }
    }

    pub fn describe(&self, value: f64) -> String {
        match self {
            AlertKind::HeatWarning => {
                format!("Temperature is {value:.1}°C. Take precautions against heatstroke.")
            }
            AlertKind::ColdWarning => {
                format!("Temperature is {value:.1}°C. Risk of frostbite and hypothermia.")
            }
            AlertKind::WindWarning => {
                format!("Wind speed is {value:.1} km/h. Avoid outdoor activities.")
            }
            AlertKind::GustWarning => format!("Wind gusts up to {value:.1} km/h."),
            AlertKind::RainAlert => format!("{value:.0}% chance of precipitation."),
            AlertKind::UvWarning => format!("UV index is {value:.1}. Use sun protection."),
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertKind::HeatWarning => "heat_warning",
            AlertKind::ColdWarning => "cold_warning",
            AlertKind::WindWarning => "wind_warning",
            AlertKind::GustWarning => "gust_warning",
            AlertKind::RainAlert => "rain_alert",
            AlertKind::UvWarning => "uv_warning",
        };
        f.write_str(s)
    }
}

/// The geographic point an alert applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locus(pub String);

impl Default for Locus {
    fn default() -> Self {
        Locus("default-location".to_string())
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An active threshold alert. Identity is `(kind, locus)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub locus: Locus,
    pub severity: Severity,
    /// Most recent value that crossed the threshold.
    pub value: f64,
    pub threshold: f64,
    pub first_observed: DateTime<Utc>,
    pub last_observed: DateTime<Utc>,
    pub title: String,
    pub description: String,
}

/// Qualitative comfort label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComfortLabel {
    Excellent,
    Good,
    Fair,
    Poor,
    Harsh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Rising,
    Falling,
    Steady,
}

/// Direction of change of one quantity over the rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub direction: TrendDirection,
    /// Latest value minus the value `cycles_back` cycles earlier.
    pub change: f64,
    pub cycles_back: usize,
}

/// UV exposure risk bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UvRisk {
    Low,
    Moderate,
    High,
    VeryHigh,
    Extreme,
}

impl UvRisk {
    pub fn from_index(uv_index: f64) -> Self {
        if uv_index <= 2.0 {
            UvRisk::Low
        } else if uv_index <= 5.0 {
            UvRisk::Moderate
        } else if uv_index <= 7.0 {
            UvRisk::High
        } else if uv_index <= 10.0 {
            UvRisk::VeryHigh
        } else {
            UvRisk::Extreme
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutdoorSuitability {
    Suitable,
    Moderate,
    CautionRequired,
    NotSuitable,
}

/// Values derived from the latest snapshot and the rolling window.
///
/// Recomputed on every weather cycle; only the latest copy is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub computed_at: DateTime<Utc>,
    /// Observation time of the snapshot these were derived from.
    pub observed_at: DateTime<Utc>,
    pub heat_index: f64,
    pub feels_like: f64,
    pub comfort_score: f64,
    pub comfort_label: ComfortLabel,
    pub temperature_trend: Option<Trend>,
    pub pressure_trend: Option<Trend>,
    pub condition: WeatherCondition,
    pub wind_cardinal: String,
    pub uv_risk: Option<UvRisk>,
    pub outdoor_suitability: OutdoorSuitability,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_slug_round_trip() {
        for product in ProductId::ALL {
            assert_eq!(ProductId::from_slug(product.slug()), Some(product));
        }
        assert_eq!(ProductId::from_slug("rainbow-index"), None);
    }

    #[test]
    fn test_product_intervals_within_declared_range() {
        for product in ProductId::ALL {
            let minutes = product.nominal_interval().as_secs() / 60;
            assert!((5..=60).contains(&minutes), "{product}: {minutes} min");
        }
    }

    #[test]
    fn test_imagery_catalog() {
        let mut minutes: Vec<u64> = ImagerySource::ALL
            .iter()
            .map(|s| s.nominal_interval().as_secs() / 60)
            .collect();
        minutes.sort_unstable();
        assert_eq!(minutes.first(), Some(&5));
        assert_eq!(minutes.last(), Some(&60));

        for source in ImagerySource::ALL {
            assert_eq!(ImagerySource::from_slug(source.slug()), Some(source));
            assert!(ProductId::from_slug(source.slug()).is_none());
        }
        assert_eq!(ImagerySource::HimawariInfrared.band(), "b13");
        assert_eq!(ImagerySource::HimawariFullDisk.region(), "full-disk");
    }

    #[test]
    fn test_optical_channels() {
        assert!(Spectrum::Visible.is_optical());
        assert!(Spectrum::TrueColor.is_optical());
        assert!(!Spectrum::Infrared.is_optical());
        assert!(!Spectrum::WaterVapor.is_optical());
        assert!(!Spectrum::PrecipitationRadar.is_optical());
        for product in ProductId::NUMERIC {
            assert!(product.spectrum().is_optical());
        }
    }

    #[test]
    fn test_imagery_source_id_display() {
        let source = SourceId::Imagery(ImagerySource::JmaRadarNationwide);
        assert_eq!(source.to_string(), "jma-radar-nationwide");
        assert_eq!(
            serde_json::to_value(source).unwrap(),
            serde_json::json!({ "imagery": "jma-radar-nationwide" })
        );
    }

    #[test]
    fn test_product_serializes_kebab_case() {
        let json = serde_json::to_value(ProductId::SeaSurfaceTemperature).unwrap();
        assert_eq!(json, "sea-surface-temperature");
    }

    #[test]
    fn test_wmo_code_mapping() {
        assert_eq!(WeatherCondition::from_wmo_code(0), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_wmo_code(2), WeatherCondition::PartlyCloudy);
        assert_eq!(WeatherCondition::from_wmo_code(48), WeatherCondition::Fog);
        assert_eq!(WeatherCondition::from_wmo_code(63), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_wmo_code(82), WeatherCondition::Pouring);
        assert_eq!(WeatherCondition::from_wmo_code(75), WeatherCondition::Snow);
        assert_eq!(WeatherCondition::from_wmo_code(99), WeatherCondition::Thunderstorm);
        assert_eq!(WeatherCondition::from_wmo_code(42), WeatherCondition::Unknown);
    }

    #[test]
    fn test_uv_risk_bands() {
        assert_eq!(UvRisk::from_index(0.0), UvRisk::Low);
        assert_eq!(UvRisk::from_index(2.0), UvRisk::Low);
        assert_eq!(UvRisk::from_index(4.5), UvRisk::Moderate);
        assert_eq!(UvRisk::from_index(7.0), UvRisk::High);
        assert_eq!(UvRisk::from_index(9.0), UvRisk::VeryHigh);
        assert_eq!(UvRisk::from_index(11.0), UvRisk::Extreme);
    }

    #[test]
    fn test_alert_kind_defaults() {
        assert_eq!(AlertKind::HeatWarning.default_severity(), Severity::High);
        assert_eq!(AlertKind::RainAlert.default_severity(), Severity::Medium);
        assert_eq!(AlertKind::ColdWarning.crossing(), Crossing::Below);
        assert_eq!(AlertKind::UvWarning.crossing(), Crossing::Above);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }
}

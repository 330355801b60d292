//! Upstream data sources.
//!
//! Each client turns one provider's payloads into typed [`Record`]s or a
//! [`FetchError`]. Clients do no caching and no retrying; both live in the
//! scheduler.
//!
//! # Data Sources
//!
//! - [`open_meteo`]: Open-Meteo's JMA endpoint, numeric weather and forecast
//! - [`himawari`]: Himawari-derived regional satellite products and the
//!   imagery catalog

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::cache::CacheKey;
use crate::error::FetchError;
use crate::model::{Coordinates, ImagerySource, ProductId, Record, SourceId};

pub mod himawari;
pub mod open_meteo;

pub use himawari::HimawariClient;
pub use open_meteo::OpenMeteoClient;

/// One independently scheduled fetch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    /// Current conditions plus forecast from the numeric weather endpoint.
    Weather,
    /// One numeric satellite product.
    Satellite(ProductId),
    /// One entry of the imagery catalog.
    Imagery(ImagerySource),
}

impl Feed {
    /// The weather feed, every numeric product, then every imagery source.
    pub fn all() -> Vec<Feed> {
        std::iter::once(Feed::Weather)
            .chain(ProductId::NUMERIC.into_iter().map(Feed::Satellite))
            .chain(ImagerySource::ALL.into_iter().map(Feed::Imagery))
            .collect()
    }

    pub fn source(&self) -> SourceId {
        match self {
            Feed::Weather => SourceId::OpenMeteoJma,
            Feed::Satellite(_) => SourceId::Himawari,
            Feed::Imagery(source) => SourceId::Imagery(*source),
        }
    }

    /// Cache key whose record age is used as the `since` hint.
    pub fn primary_key(&self) -> CacheKey {
        match self {
            Feed::Weather => CacheKey::current_weather(),
            Feed::Satellite(product) => CacheKey::satellite(*product),
            Feed::Imagery(source) => CacheKey::imagery(*source),
        }
    }

    /// Every cache key this feed writes.
    pub fn keys(&self) -> Vec<CacheKey> {
        match self {
            Feed::Weather => vec![CacheKey::current_weather(), CacheKey::forecast()],
            Feed::Satellite(_) | Feed::Imagery(_) => vec![self.primary_key()],
        }
    }

    /// Normal polling cadence, before fast mode or retries.
    pub fn nominal_interval(&self, weather_interval: Duration) -> Duration {
        match self {
            Feed::Weather => weather_interval,
            Feed::Satellite(product) => product.nominal_interval(),
            Feed::Imagery(source) => source.nominal_interval(),
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feed::Weather => f.write_str("weather"),
            Feed::Satellite(product) => write!(f, "satellite/{product}"),
            Feed::Imagery(source) => write!(f, "imagery/{source}"),
        }
    }
}

/// A provider that can be asked for the latest records of a feed.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Fetch records for `feed` at `coordinates`.
    ///
    /// `since` is the capture time of the newest record already held; a
    /// provider with nothing newer answers with an empty list, which is a
    /// success and not a failure.
    async fn fetch(
        &self,
        feed: Feed,
        coordinates: Coordinates,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Record>, FetchError>;
}

/// Routes each feed to the client for its source.
#[derive(Clone)]
pub struct Sources {
    pub weather: Arc<dyn SourceClient>,
    pub satellite: Arc<dyn SourceClient>,
}

impl Sources {
    pub fn new(weather: Arc<dyn SourceClient>, satellite: Arc<dyn SourceClient>) -> Self {
        Self { weather, satellite }
    }

    pub fn client_for(&self, feed: Feed) -> Arc<dyn SourceClient> {
        match feed.source() {
            SourceId::OpenMeteoJma => Arc::clone(&self.weather),
            SourceId::Himawari | SourceId::Imagery(_) => Arc::clone(&self.satellite),
        }
    }
}

/// Turn a non-success response into a [`FetchError`], keeping a short
/// excerpt of the body for the failure reason.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let excerpt: String = body.chars().take(200).collect();
    Err(FetchError::from_status(status.as_u16(), excerpt.trim()))
}

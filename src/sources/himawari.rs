//! Himawari satellite product client.
//!
//! Talks to a regional product gateway that serves Himawari-8/9 derived
//! products as JSON observations. Numeric products and imagery catalog
//! entries each have their own endpoint:
//!
//! ```text
//! GET {base}/v1/products/{product-slug}?latitude=..&longitude=..[&since=RFC3339]
//! GET {base}/v1/imagery/{source-slug}?latitude=..&longitude=..[&since=RFC3339]
//! ```
//!
//! Each observation carries the provider-declared cloud cover and sun
//! elevation used by the quality rules. Numeric products carry a `value`;
//! imagery carries a `reference` to an image instead, falling back to the
//! source's public latest-image URL when the gateway omits it.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::{Feed, SourceClient, check_status};
use crate::config::DEFAULT_HIMAWARI_URL;
use crate::error::FetchError;
use crate::model::{
    Coordinates, ImageryRef, ImagerySource, ProductId, ProductValue, Record, SatelliteProduct,
    SourceId,
};

/// Platform reported when the gateway omits it.
const DEFAULT_PLATFORM: &str = "himawari-9";

/// Client for the Himawari product gateway.
#[derive(Clone)]
pub struct HimawariClient {
    client: reqwest::Client,
    base_url: String,
}

impl Default for HimawariClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HimawariClient {
    /// Create a new Himawari client with default settings.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_HIMAWARI_URL.to_string(),
        }
    }

    /// Create a new Himawari client with a custom base URL (for testing).
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

    /// Fetch observations of one numeric product near a point.
    ///
    /// # Arguments
    ///
    /// * `product` - Product to query
    /// * `coordinates` - Point of interest
    /// * `since` - Only observations captured after this instant
    pub async fn get_observations(
        &self,
        product: ProductId,
        coordinates: Coordinates,
        since: Option<DateTime<Utc>>,
    ) -> Result<ProductResponse, FetchError> {
        self.request(&format!("products/{}", product.slug()), coordinates, since)
            .await
    }

    /// Fetch the latest frames of one imagery catalog entry.
    pub async fn get_imagery(
        &self,
        source: ImagerySource,
        coordinates: Coordinates,
        since: Option<DateTime<Utc>>,
    ) -> Result<ProductResponse, FetchError> {
        self.request(&format!("imagery/{}", source.slug()), coordinates, since)
            .await
    }

    async fn request(
        &self,
        endpoint: &str,
        coordinates: Coordinates,
        since: Option<DateTime<Utc>>,
    ) -> Result<ProductResponse, FetchError> {
        let mut url = format!(
            "{}/v1/{}?latitude={}&longitude={}",
            self.base_url, endpoint, coordinates.latitude, coordinates.longitude
        );
        if let Some(since) = since {
            url.push_str(&format!(
                "&since={}",
                urlencoding::encode(&since.to_rfc3339_opts(SecondsFormat::Secs, true))
            ));
        }

        let response = check_status(self.client.get(&url).send().await?).await?;
        let data = response.json::<ProductResponse>().await?;
        Ok(data)
    }
}

#[async_trait]
impl SourceClient for HimawariClient {
    async fn fetch(
        &self,
        feed: Feed,
        coordinates: Coordinates,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Record>, FetchError> {
        match feed {
            Feed::Satellite(product) if product.is_numeric() => {
                let data = self.get_observations(product, coordinates, since).await?;
                data.observations
                    .into_iter()
                    .map(|obs| obs.into_product(product).map(Record::Satellite))
                    .collect()
            }
            Feed::Imagery(source) => {
                let data = self.get_imagery(source, coordinates, since).await?;
                Ok(data
                    .observations
                    .into_iter()
                    .map(|obs| Record::Satellite(obs.into_imagery(source)))
                    .collect())
            }
            _ => Err(FetchError::BadResponse(format!("himawari does not serve {feed}"))),
        }
    }
}

// ============================================================================
// Response types
// ============================================================================

/// Response from a product endpoint. An empty list means nothing new.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductResponse {
    #[serde(default)]
    pub observations: Vec<Observation>,
}

/// A single product observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub captured_at: DateTime<Utc>,

    /// Numeric value, absent for the imagery product.
    #[serde(default)]
    pub value: Option<f64>,

    /// Image location, present only for imagery.
    #[serde(default)]
    pub reference: Option<String>,

    /// Declared cloud cover over the scene, %.
    pub cloud_cover: f64,

    /// Declared sun elevation at capture, degrees.
    pub sun_elevation: f64,

    #[serde(default)]
    pub satellite: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub band: Option<String>,
}

impl Observation {
    /// Convert into a numeric product record.
    pub fn into_product(self, product: ProductId) -> Result<SatelliteProduct, FetchError> {
        let value = match self.value {
            Some(value) if value.is_finite() => value,
            _ => {
                return Err(FetchError::BadResponse(format!(
                    "{product} observation without a numeric value"
                )));
            }
        };

        Ok(SatelliteProduct {
            product,
            source: SourceId::Himawari,
            platform: self.satellite.unwrap_or_else(|| DEFAULT_PLATFORM.to_string()),
            value: ProductValue::Numeric(value),
            spectrum: product.spectrum(),
            captured_at: self.captured_at,
            cloud_cover: self.cloud_cover,
            sun_elevation: self.sun_elevation,
        })
    }

    /// Convert into an imagery record for one catalog entry.
    pub fn into_imagery(self, source: ImagerySource) -> SatelliteProduct {
        let reference = ImageryRef {
            url: self
                .reference
                .unwrap_or_else(|| source.latest_image_url().to_string()),
            region: self.region.unwrap_or_else(|| source.region().to_string()),
            band: self.band.unwrap_or_else(|| source.band().to_string()),
        };

        SatelliteProduct {
            product: ProductId::ImageryReference,
            source: SourceId::Imagery(source),
            platform: self.satellite.unwrap_or_else(|| DEFAULT_PLATFORM.to_string()),
            value: ProductValue::Reference(reference),
            spectrum: source.spectrum(),
            captured_at: self.captured_at,
            cloud_cover: self.cloud_cover,
            sun_elevation: self.sun_elevation,
        }
    }
}

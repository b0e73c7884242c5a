use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use redona_types::models::Coordinates;

use crate::address::{AddressQuery, query_variants};

/// Resolves a postal address to coordinates. Implementations never fail the
/// caller: any upstream problem is logged and reported as `None`.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &AddressQuery) -> Option<Coordinates>;
}

/// Used when geocoding is switched off.
pub struct NoopGeocoder;

#[async_trait]
impl Geocoder for NoopGeocoder {
    async fn geocode(&self, _query: &AddressQuery) -> Option<Coordinates> {
        None
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider answered with status {0}")]
    Status(u16),
    #[error("invalid coordinate '{0}'")]
    BadCoordinate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Nominatim,
    Photon,
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Nominatim => "nominatim",
            Provider::Photon => "photon",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    pub nominatim_url: String,
    pub photon_url: String,
    /// Appended to every query variant, e.g. "Spain".
    pub country: Option<String>,
    pub max_attempts: usize,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            nominatim_url: "https://nominatim.openstreetmap.org".into(),
            photon_url: "https://photon.komoot.io".into(),
            country: Some("Spain".into()),
            max_attempts: 6,
            timeout: Duration::from_secs(5),
            user_agent: concat!("redona/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

/// Every variant is tried against the first provider before falling back to
/// the next one. The sequence is lazy and capped at `max_attempts`.
pub fn attempt_plan<'a>(
    providers: &'a [Provider],
    variants: &'a [String],
    max_attempts: usize,
) -> impl Iterator<Item = (Provider, &'a str)> + 'a {
    providers
        .iter()
        .flat_map(move |p| variants.iter().map(move |v| (*p, v.as_str())))
        .take(max_attempts)
}

const PROVIDERS: [Provider; 2] = [Provider::Nominatim, Provider::Photon];

/// Geocoder backed by the public Nominatim and Photon HTTP APIs.
pub struct HttpGeocoder {
    client: reqwest::Client,
    config: GeocoderConfig,
}

impl HttpGeocoder {
    pub fn new(config: GeocoderConfig) -> Result<Self, GeoError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    async fn lookup(&self, provider: Provider, query: &str) -> Result<Option<Coordinates>, GeoError> {
        match provider {
            Provider::Nominatim => self.lookup_nominatim(query).await,
            Provider::Photon => self.lookup_photon(query).await,
        }
    }

    async fn lookup_nominatim(&self, query: &str) -> Result<Option<Coordinates>, GeoError> {
        let url = format!("{}/search", self.config.nominatim_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(GeoError::Status(response.status().as_u16()));
        }

        let places: Vec<NominatimPlace> = response.json().await?;
        match places.into_iter().next() {
            Some(place) => Ok(Some(Coordinates::new(
                parse_degrees(&place.lat)?,
                parse_degrees(&place.lon)?,
            ))),
            None => Ok(None),
        }
    }

    async fn lookup_photon(&self, query: &str) -> Result<Option<Coordinates>, GeoError> {
        let url = format!("{}/api/", self.config.photon_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("limit", "1")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(GeoError::Status(response.status().as_u16()));
        }

        let collection: PhotonCollection = response.json().await?;
        Ok(collection
            .features
            .into_iter()
            .next()
            .and_then(|f| match f.geometry.coordinates.as_slice() {
                // GeoJSON order is [lon, lat]
                [lon, lat, ..] => Some(Coordinates::new(*lat, *lon)),
                _ => None,
            }))
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn geocode(&self, query: &AddressQuery) -> Option<Coordinates> {
        if query.is_empty() {
            return None;
        }

        let variants = query_variants(query, self.config.country.as_deref());
        for (provider, variant) in attempt_plan(&PROVIDERS, &variants, self.config.max_attempts) {
            match self.lookup(provider, variant).await {
                Ok(Some(coords)) => {
                    debug!("Geocoded '{}' via {}", variant, provider.name());
                    return Some(coords);
                }
                Ok(None) => debug!("No {} result for '{}'", provider.name(), variant),
                Err(e) => warn!("Geocoding '{}' via {} failed: {}", variant, provider.name(), e),
            }
        }

        warn!("Could not geocode address {:?}", query);
        None
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

#[derive(Debug, Deserialize)]
struct PhotonCollection {
    #[serde(default)]
    features: Vec<PhotonFeature>,
}

#[derive(Debug, Deserialize)]
struct PhotonFeature {
    geometry: PhotonGeometry,
}

#[derive(Debug, Deserialize)]
struct PhotonGeometry {
    coordinates: Vec<f64>,
}

fn parse_degrees(raw: &str) -> Result<f64, GeoError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| GeoError::BadCoordinate(raw.to_string()))
}

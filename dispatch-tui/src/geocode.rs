//! Address geocoding.
//!
//! Providers sit behind the [`Geocoder`] trait: OpenStreetMap Nominatim (no
//! key, rate limited) and the Google Geocoding API. [`CachingGeocoder`] keeps
//! every answer, including misses, for the life of the process.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::GeocodeError;
use crate::markers::LatLng;
use crate::models::Job;

pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
pub const GOOGLE_URL: &str = "https://maps.googleapis.com";

/// Nominatim's usage policy allows one request per second
const NOMINATIM_MIN_INTERVAL: Duration = Duration::from_millis(1100);

/// Resolves a free-text address to coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` means the provider found nothing for this address.
    async fn geocode(&self, address: &str) -> Result<Option<LatLng>, GeocodeError>;

    /// Short provider name for logs
    fn name(&self) -> &'static str;
}

// ============================================
// Nominatim
// ============================================

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

/// OpenStreetMap search API client
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str, user_agent: &str) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            min_interval: NOMINATIM_MIN_INTERVAL,
            last_request: Mutex::new(None),
        })
    }

    /// Wait until the provider's minimum request spacing has passed
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<LatLng>, GeocodeError> {
        self.throttle().await;

        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GeocodeError::Http {
                status: response.status().as_u16(),
            });
        }

        let places: Vec<NominatimPlace> = response.json().await?;
        parse_nominatim(&places)
    }

    fn name(&self) -> &'static str {
        "nominatim"
    }
}

fn parse_nominatim(places: &[NominatimPlace]) -> Result<Option<LatLng>, GeocodeError> {
    let Some(place) = places.first() else {
        return Ok(None);
    };

    let lat: f64 = place
        .lat
        .parse()
        .map_err(|_| GeocodeError::BadCoordinates(place.lat.clone()))?;
    let lng: f64 = place
        .lon
        .parse()
        .map_err(|_| GeocodeError::BadCoordinates(place.lon.clone()))?;

    let point = LatLng::new(lat, lng);
    if !point.is_valid() {
        return Err(GeocodeError::BadCoordinates(format!("{}, {}", lat, lng)));
    }
    Ok(Some(point))
}

// ============================================
// Google
// ============================================

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    status: String,
    #[serde(default)]
    results: Vec<GoogleResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    geometry: GoogleGeometry,
}

#[derive(Debug, Deserialize)]
struct GoogleGeometry {
    location: GoogleLocation,
}

#[derive(Debug, Deserialize)]
struct GoogleLocation {
    lat: f64,
    lng: f64,
}

/// Google Geocoding API client
pub struct GoogleGeocoder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<LatLng>, GeocodeError> {
        let url = format!("{}/maps/api/geocode/json", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GeocodeError::Http {
                status: response.status().as_u16(),
            });
        }

        let body: GoogleResponse = response.json().await?;
        parse_google(body)
    }

    fn name(&self) -> &'static str {
        "google"
    }
}

fn parse_google(body: GoogleResponse) -> Result<Option<LatLng>, GeocodeError> {
    match body.status.as_str() {
        "OK" => Ok(body
            .results
            .first()
            .map(|r| LatLng::new(r.geometry.location.lat, r.geometry.location.lng))
            .filter(LatLng::is_valid)),
        "ZERO_RESULTS" => Ok(None),
        other => Err(GeocodeError::Rejected(
            body.error_message.unwrap_or_else(|| other.to_string()),
        )),
    }
}

// ============================================
// Cache
// ============================================

/// Memoising wrapper around any provider
pub struct CachingGeocoder<G> {
    inner: G,
    cache: Mutex<HashMap<String, Option<LatLng>>>,
}

impl<G: Geocoder> CachingGeocoder<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Previously resolved answer, if this address was seen before
    pub async fn cached(&self, address: &str) -> Option<Option<LatLng>> {
        self.cache.lock().await.get(&cache_key(address)).copied()
    }

    pub async fn len(&self) -> usize {
        self.cache.lock().await.len()
    }
}

fn cache_key(address: &str) -> String {
    address.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[async_trait]
impl<G: Geocoder> Geocoder for CachingGeocoder<G> {
    async fn geocode(&self, address: &str) -> Result<Option<LatLng>, GeocodeError> {
        let key = cache_key(address);
        if let Some(hit) = self.cache.lock().await.get(&key) {
            return Ok(*hit);
        }

        // Errors are not cached so a later refresh can try again
        let result = self.inner.geocode(address).await?;
        self.cache.lock().await.insert(key, result);
        Ok(result)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

#[async_trait]
impl<G: Geocoder + ?Sized> Geocoder for Arc<G> {
    async fn geocode(&self, address: &str) -> Result<Option<LatLng>, GeocodeError> {
        (**self).geocode(address).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

// ============================================
// Batch helpers
// ============================================

/// Distinct geocodable addresses of the given jobs, in stable order
pub fn job_addresses(jobs: &[Job]) -> Vec<String> {
    jobs.iter()
        .filter_map(Job::address)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Resolve each address once. Misses and failures are left out of the map;
/// failures are logged.
pub async fn geocode_addresses(
    addresses: &[String],
    geocoder: &dyn Geocoder,
) -> HashMap<String, LatLng> {
    let mut resolved = HashMap::new();

    for address in addresses {
        match geocoder.geocode(address).await {
            Ok(Some(point)) => {
                resolved.insert(address.clone(), point);
            }
            Ok(None) => {
                tracing::debug!(address = %address, provider = geocoder.name(), "No geocoding match");
            }
            Err(e) => {
                tracing::warn!(address = %address, provider = geocoder.name(), error = %e, "Geocoding failed");
            }
        }
    }

    resolved
}

/// Resolve every distinct job address
pub async fn geocode_jobs(jobs: &[Job], geocoder: &dyn Geocoder) -> HashMap<String, LatLng> {
    geocode_addresses(&job_addresses(jobs), geocoder).await
}

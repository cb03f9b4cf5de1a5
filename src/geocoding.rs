use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::Geometry;

/// Mapbox forward geocoding endpoint.
pub const MAPBOX_PLACES_URL: &str = "https://api.mapbox.com/geocoding/v5/mapbox.places";

/// Geocoder
///
/// Resolves free-text locations to a single best-match point. `Ok(None)` means
/// the provider answered but found nothing; `Err` means the provider could not
/// be reached or answered with an error.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn forward(&self, query: &str) -> Result<Option<Geometry>, String>;
}

/// GeocoderState
///
/// The concrete type used to share the geocoder across the application state.
pub type GeocoderState = Arc<dyn Geocoder>;

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    geometry: Geometry,
}

/// MapboxGeocoder
///
/// Calls the Mapbox places API with `limit=1`.
#[derive(Clone)]
pub struct MapboxGeocoder {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl MapboxGeocoder {
    pub fn new(token: &str) -> Self {
        Self::with_base_url(MAPBOX_PLACES_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// Builds `{base}/{query}.json?access_token=..&limit=1`, percent-encoding the query.
    pub fn request_url(&self, query: &str) -> Result<Url, String> {
        let mut url = Url::parse(&self.base_url).map_err(|e| e.to_string())?;
        url.path_segments_mut()
            .map_err(|_| format!("geocoding base url cannot take a path: {}", self.base_url))?
            .push(&format!("{}.json", query));
        url.query_pairs_mut()
            .append_pair("access_token", &self.token)
            .append_pair("limit", "1");
        Ok(url)
    }
}

#[async_trait]
impl Geocoder for MapboxGeocoder {
    async fn forward(&self, query: &str) -> Result<Option<Geometry>, String> {
        if self.token.is_empty() {
            tracing::warn!("MAPBOX_TOKEN not configured; skipping geocoding for {:?}", query);
            return Ok(None);
        }

        let url = self.request_url(query)?;
        let collection = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?
            .json::<FeatureCollection>()
            .await
            .map_err(|e| e.to_string())?;

        Ok(collection
            .features
            .into_iter()
            .next()
            .map(|feature| feature.geometry))
    }
}

/// MockGeocoder
///
/// Answers every query with the same point, with nothing, or with a failure.
#[derive(Clone)]
pub struct MockGeocoder {
    pub result: Option<Geometry>,
    pub should_fail: bool,
}

impl MockGeocoder {
    /// Resolves everything to Lynchburg, VA.
    pub fn new() -> Self {
        Self {
            result: Some(Geometry::point(-79.1422, 37.4138)),
            should_fail: false,
        }
    }

    pub fn no_match() -> Self {
        Self {
            result: None,
            should_fail: false,
        }
    }

    pub fn new_failing() -> Self {
        Self {
            result: None,
            should_fail: true,
        }
    }
}

impl Default for MockGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn forward(&self, _query: &str) -> Result<Option<Geometry>, String> {
        if self.should_fail {
            return Err("Mock Geocoder Error: Simulation requested".to_string());
        }
        Ok(self.result.clone())
    }
}

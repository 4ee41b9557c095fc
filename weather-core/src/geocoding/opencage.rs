use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    Location, ServiceError,
    provider::{build_url, get_text, map_status},
};

use super::GeocodingClient;

const BASE_URL: &str = "https://api.opencagedata.com";
const RESULT_LIMIT: u32 = 10;

#[derive(Debug, Clone)]
pub struct OpenCageClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenCageClient {
    pub fn new(api_key: String) -> Self {
        Self::with_http(api_key, Client::new())
    }

    pub fn with_http(api_key: String, http: Client) -> Self {
        Self { api_key, base_url: BASE_URL.to_string(), http }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request_url(&self, query: &str) -> Result<Url, ServiceError> {
        build_url(
            &format!("{}/geocode/v1/json", self.base_url.trim_end_matches('/')),
            &[
                ("q", query.to_string()),
                ("key", self.api_key.clone()),
                ("limit", RESULT_LIMIT.to_string()),
            ],
        )
        .map_err(|_| ServiceError::InvalidQuery)
    }
}

#[async_trait]
impl GeocodingClient for OpenCageClient {
    async fn search(&self, query: &str) -> Result<Vec<Location>, ServiceError> {
        if self.api_key.trim().is_empty() {
            return Err(ServiceError::ApiKeyMissing);
        }
        if query.trim().is_empty() {
            return Err(ServiceError::InvalidQuery);
        }

        let url = self.request_url(query)?;
        let (status, body) = get_text(&self.http, url, &self.api_key).await?;

        if status != 200 {
            warn!(status, query, "geocoding request failed");
            return Err(map_status(status, ServiceError::InvalidQuery));
        }

        let locations = parse_results(&body)?;
        debug!(query, count = locations.len(), "geocoding results parsed");
        Ok(locations)
    }
}

#[derive(Debug, Deserialize)]
struct OcResponse {
    results: Vec<OcResult>,
}

#[derive(Debug, Deserialize)]
struct OcResult {
    #[serde(default)]
    components: OcComponents,
    geometry: OcGeometry,
}

#[derive(Debug, Default, Deserialize)]
struct OcComponents {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    county: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OcGeometry {
    lat: Option<f64>,
    lng: Option<f64>,
}

/// Results lacking either coordinate are skipped; order is preserved.
fn parse_results(body: &str) -> Result<Vec<Location>, ServiceError> {
    let parsed: OcResponse = serde_json::from_str(body)?;

    Ok(parsed
        .results
        .into_iter()
        .filter_map(|result| {
            let (Some(latitude), Some(longitude)) = (result.geometry.lat, result.geometry.lng)
            else {
                return None;
            };

            let OcComponents { city, town, village, county, country } = result.components;
            let name = city
                .or(town)
                .or(village)
                .or(county)
                .unwrap_or_else(|| "Unknown".to_string());

            Some(Location { name, latitude, longitude, country })
        })
        .collect())
}

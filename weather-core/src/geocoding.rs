use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

use crate::{
    Config, Location, ServiceError, geocoding::opencage::OpenCageClient, provider::http_client,
};

pub mod opencage;

/// Config key under `[providers]` holding the geocoder's API key.
pub const GEOCODER_ID: &str = "opencage";

/// Resolves free-text queries into candidate locations.
///
/// Results keep the service's ranking order and may repeat names.
#[async_trait]
pub trait GeocodingClient: Send + Sync + Debug {
    async fn search(&self, query: &str) -> Result<Vec<Location>, ServiceError>;
}

pub fn geocoder_from_config(config: &Config) -> anyhow::Result<Arc<dyn GeocodingClient>> {
    let http = http_client(config.request_timeout())?;
    let api_key = config.api_key(GEOCODER_ID).unwrap_or_default();

    Ok(Arc::new(OpenCageClient::with_http(api_key.to_owned(), http)))
}

use crate::{
    Config, Location, ServiceError, WeatherReading,
    provider::{openmeteo::OpenMeteoClient, openweathermap::OpenWeatherMapClient},
};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, sync::Arc, time::Duration};
use tracing::debug;

pub mod openmeteo;
pub mod openweathermap;

const USER_AGENT: &str = concat!("weather-core/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Provider {
    #[default]
    OpenWeatherMap,
    OpenMeteo,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenWeatherMap => "openweathermap",
            Provider::OpenMeteo => "openmeteo",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::OpenWeatherMap => "OpenWeatherMap",
            Provider::OpenMeteo => "OpenMeteo",
        }
    }

    /// Accent tag a front end may use to theme the provider.
    pub fn accent(&self) -> &'static str {
        match self {
            Provider::OpenWeatherMap => "blue",
            Provider::OpenMeteo => "green",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, Provider::OpenWeatherMap)
    }

    pub const fn all() -> &'static [Provider] {
        &[Provider::OpenWeatherMap, Provider::OpenMeteo]
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Provider {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openweathermap" | "openweather" | "owm" => Ok(Provider::OpenWeatherMap),
            "openmeteo" | "open-meteo" => Ok(Provider::OpenMeteo),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openweathermap, openmeteo."
            )),
        }
    }
}

/// A weather source that turns a location into a normalized reading.
#[async_trait]
pub trait WeatherClient: Send + Sync + Debug {
    async fn fetch(&self, location: &Location) -> Result<WeatherReading, ServiceError>;
}

/// Routing table from [`Provider`] to the client that serves it.
#[derive(Debug, Clone)]
pub struct ProviderClients {
    open_weather_map: Arc<dyn WeatherClient>,
    open_meteo: Arc<dyn WeatherClient>,
}

impl ProviderClients {
    pub fn new(
        open_weather_map: Arc<dyn WeatherClient>,
        open_meteo: Arc<dyn WeatherClient>,
    ) -> Self {
        Self { open_weather_map, open_meteo }
    }

    pub fn client(&self, provider: Provider) -> Arc<dyn WeatherClient> {
        match provider {
            Provider::OpenWeatherMap => Arc::clone(&self.open_weather_map),
            Provider::OpenMeteo => Arc::clone(&self.open_meteo),
        }
    }
}

/// Build every provider client from config.
///
/// A missing API key is not an error here: the client reports
/// [`ServiceError::ApiKeyMissing`] when asked to fetch.
pub fn clients_from_config(config: &Config) -> anyhow::Result<ProviderClients> {
    let http = http_client(config.request_timeout())?;
    let api_key = config.provider_api_key(Provider::OpenWeatherMap).unwrap_or_default();

    Ok(ProviderClients::new(
        Arc::new(OpenWeatherMapClient::with_http(api_key.to_owned(), http.clone())),
        Arc::new(OpenMeteoClient::with_http(http)),
    ))
}

/// Shared HTTP client carrying the transport timeout.
pub fn http_client(timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))
}

/// Build `base` with query `params`, rejecting malformed bases as an invalid location.
pub(crate) fn build_url(base: &str, params: &[(&str, String)]) -> Result<Url, ServiceError> {
    Url::parse_with_params(base, params).map_err(|_| ServiceError::InvalidLocation)
}

/// GET `url` and return the status code with the raw body.
pub(crate) async fn get_text(
    http: &Client,
    url: Url,
    secret: &str,
) -> Result<(u16, String), ServiceError> {
    debug!(url = %masked_url(&url, secret), "GET");

    let res = http.get(url).send().await?;
    let status = res.status().as_u16();
    let body = res.text().await?;

    debug!(status, bytes = body.len(), "response received");
    Ok((status, body))
}

/// Map a non-200 status code to the error taxonomy.
///
/// `not_found` is the error used for 400/404, which differs between weather
/// lookups and geocoding queries.
pub fn map_status(status: u16, not_found: ServiceError) -> ServiceError {
    match status {
        401 | 403 => ServiceError::ApiKeyMissing,
        429 => ServiceError::RateLimitExceeded,
        400 | 404 => not_found,
        other => ServiceError::Network(format!("HTTP {other}")),
    }
}

/// Replace every occurrence of `secret` in `text` with `***`.
pub fn mask_secret(text: &str, secret: &str) -> String {
    if secret.is_empty() { text.to_string() } else { text.replace(secret, "***") }
}

/// Render `url` for logs with every query value equal to `secret` replaced by `***`.
///
/// Query values are compared decoded, so keys that percent-encode differently
/// from their raw form are still hidden.
pub fn masked_url(url: &Url, secret: &str) -> String {
    if secret.is_empty() {
        return url.to_string();
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(name, value)| {
            let value = if value == secret { "***".to_string() } else { value.into_owned() };
            (name.into_owned(), value)
        })
        .collect();

    let mut masked = url.clone();
    if !pairs.is_empty() {
        masked.query_pairs_mut().clear().extend_pairs(&pairs);
    }
    mask_secret(masked.as_str(), secret)
}

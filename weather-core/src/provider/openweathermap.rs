use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    Location, ServiceError, WeatherReading,
    model::humidity_pct,
    provider::{Provider, build_url, get_text, map_status},
};

use super::WeatherClient;

const BASE_URL: &str = "https://api.openweathermap.org";

#[derive(Debug, Clone)]
pub struct OpenWeatherMapClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherMapClient {
    pub fn new(api_key: String) -> Self {
        Self::with_http(api_key, Client::new())
    }

    pub fn with_http(api_key: String, http: Client) -> Self {
        Self { api_key, base_url: BASE_URL.to_string(), http }
    }

    /// Point the client at another host, e.g. a local mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request_url(&self, location: &Location) -> Result<Url, ServiceError> {
        build_url(
            &format!("{}/data/2.5/weather", self.base_url.trim_end_matches('/')),
            &[
                ("lat", location.latitude.to_string()),
                ("lon", location.longitude.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
            ],
        )
    }
}

#[async_trait]
impl WeatherClient for OpenWeatherMapClient {
    async fn fetch(&self, location: &Location) -> Result<WeatherReading, ServiceError> {
        if self.api_key.trim().is_empty() {
            return Err(ServiceError::ApiKeyMissing);
        }

        let url = self.request_url(location)?;
        let (status, body) = get_text(&self.http, url, &self.api_key).await?;

        if status != 200 {
            warn!(status, location = %location.name, "OpenWeatherMap request failed");
            return Err(map_status(status, ServiceError::InvalidLocation));
        }

        let reading = parse_current(&body, Utc::now())?;
        debug!(
            location = %location.name,
            temperature = reading.temperature,
            "OpenWeatherMap reading parsed"
        );
        Ok(reading)
    }
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    humidity: i64,
    pressure: i32,
}

#[derive(Debug, Deserialize)]
struct OwmWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwmCurrentResponse {
    #[serde(default)]
    dt: Option<i64>,
    main: OwmMain,
    #[serde(default)]
    weather: Vec<OwmWeather>,
    wind: OwmWind,
}

/// Normalize a `/data/2.5/weather` body. `now` stands in for a missing `dt`.
fn parse_current(body: &str, now: DateTime<Utc>) -> Result<WeatherReading, ServiceError> {
    let parsed: OwmCurrentResponse = serde_json::from_str(body)?;

    let description = parsed
        .weather
        .first()
        .map(|w| w.description.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    let observed_at = parsed.dt.and_then(|ts| DateTime::from_timestamp(ts, 0)).unwrap_or(now);

    Ok(WeatherReading {
        temperature: parsed.main.temp,
        description,
        humidity_pct: humidity_pct(parsed.main.humidity),
        wind_speed: parsed.wind.speed,
        pressure: parsed.main.pressure,
        observed_at,
        provider: Provider::OpenWeatherMap,
    })
}

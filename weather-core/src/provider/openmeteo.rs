use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    Location, ServiceError, WeatherReading,
    model::humidity_pct,
    provider::{Provider, build_url, get_text, map_status},
};

use super::WeatherClient;

const BASE_URL: &str = "https://api.open-meteo.com";

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,apparent_temperature,precipitation,weather_code,wind_speed_10m,surface_pressure";

/// Open-Meteo reports local time without an offset, e.g. `2025-06-01T14:00`.
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Keyless client for the Open-Meteo forecast API.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    base_url: String,
    http: Client,
}

impl Default for OpenMeteoClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenMeteoClient {
    pub fn new() -> Self {
        Self::with_http(Client::new())
    }

    pub fn with_http(http: Client) -> Self {
        Self { base_url: BASE_URL.to_string(), http }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request_url(&self, location: &Location) -> Result<Url, ServiceError> {
        build_url(
            &format!("{}/v1/forecast", self.base_url.trim_end_matches('/')),
            &[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
                ("timezone", "auto".to_string()),
            ],
        )
    }
}

#[async_trait]
impl WeatherClient for OpenMeteoClient {
    async fn fetch(&self, location: &Location) -> Result<WeatherReading, ServiceError> {
        let url = self.request_url(location)?;
        let (status, body) = get_text(&self.http, url, "").await?;

        if status != 200 {
            warn!(status, location = %location.name, "OpenMeteo request failed");
            return Err(map_status(status, ServiceError::InvalidLocation));
        }

        let reading = parse_current(&body).inspect_err(|_| {
            debug!(location = %location.name, "OpenMeteo body did not match the expected shape");
        })?;
        debug!(
            location = %location.name,
            description = %reading.description,
            "OpenMeteo reading parsed"
        );
        Ok(reading)
    }
}

#[derive(Debug, Deserialize)]
struct OmCurrent {
    time: String,
    temperature_2m: f64,
    relative_humidity_2m: f64,
    weather_code: i32,
    wind_speed_10m: f64,
    surface_pressure: f64,
}

#[derive(Debug, Deserialize)]
struct OmResponse {
    #[serde(default)]
    utc_offset_seconds: i32,
    current: OmCurrent,
}

fn parse_current(body: &str) -> Result<WeatherReading, ServiceError> {
    let parsed: OmResponse = serde_json::from_str(body)?;
    let current = parsed.current;

    Ok(WeatherReading {
        temperature: current.temperature_2m,
        description: describe_weather_code(current.weather_code).to_string(),
        humidity_pct: humidity_pct(current.relative_humidity_2m.round() as i64),
        wind_speed: current.wind_speed_10m,
        // Truncated to whole hPa.
        pressure: current.surface_pressure.trunc() as i32,
        observed_at: parse_local_time(&current.time, parsed.utc_offset_seconds)?,
        provider: Provider::OpenMeteo,
    })
}

fn parse_local_time(time: &str, utc_offset_seconds: i32) -> Result<DateTime<Utc>, ServiceError> {
    let naive = NaiveDateTime::parse_from_str(time, TIME_FORMAT)
        .map_err(|_| ServiceError::InvalidResponse)?;
    let offset = FixedOffset::east_opt(utc_offset_seconds).ok_or(ServiceError::InvalidResponse)?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or(ServiceError::InvalidResponse)
}

/// WMO weather interpretation code to a short description.
pub fn describe_weather_code(code: i32) -> &'static str {
    match code {
        0 => "Clear sky",
        1..=3 => "Partly cloudy",
        45 | 48 => "Foggy",
        51 | 53 | 55 => "Drizzle",
        56 | 57 => "Freezing drizzle",
        61 | 63 | 65 => "Rain",
        66 | 67 => "Freezing rain",
        71 | 73 | 75 => "Snow",
        77 => "Snow grains",
        80..=82 => "Rain showers",
        85 | 86 => "Snow showers",
        95 => "Thunderstorm",
        96 | 99 => "Thunderstorm with hail",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "latitude": 52.52,
        "longitude": 13.419998,
        "utc_offset_seconds": 7200,
        "timezone": "Europe/Berlin",
        "current_units": {"time": "iso8601", "temperature_2m": "°C"},
        "current": {
            "time": "2025-06-01T14:00",
            "interval": 900,
            "temperature_2m": 18.4,
            "relative_humidity_2m": 71,
            "apparent_temperature": 17.9,
            "precipitation": 0.0,
            "weather_code": 61,
            "wind_speed_10m": 9.7,
            "surface_pressure": 1008.9
        }
    }"#;

    #[test]
    fn parses_current_block() {
        let reading = parse_current(BODY).unwrap();

        assert_eq!(reading.temperature, 18.4);
        assert_eq!(reading.description, "Rain");
        assert_eq!(reading.humidity_pct, 71);
        assert_eq!(reading.wind_speed, 9.7);
        assert_eq!(reading.pressure, 1008);
        assert_eq!(reading.provider, Provider::OpenMeteo);
        assert_eq!(reading.observed_at, Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn missing_offset_is_treated_as_utc() {
        assert_eq!(
            parse_local_time("2025-01-31T23:45", 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 31, 23, 45, 0).unwrap()
        );
    }

    #[test]
    fn malformed_time_is_invalid_response() {
        assert_eq!(parse_local_time("31/01/2025 23:45", 0), Err(ServiceError::InvalidResponse));
        let body = BODY.replace("2025-06-01T14:00", "yesterday");
        assert_eq!(parse_current(&body), Err(ServiceError::InvalidResponse));
    }

    #[test]
    fn missing_current_block_is_invalid_response() {
        assert_eq!(parse_current(r#"{"latitude": 1.0}"#), Err(ServiceError::InvalidResponse));
    }

    #[test]
    fn weather_code_table() {
        assert_eq!(describe_weather_code(0), "Clear sky");
        assert_eq!(describe_weather_code(2), "Partly cloudy");
        assert_eq!(describe_weather_code(48), "Foggy");
        assert_eq!(describe_weather_code(57), "Freezing drizzle");
        assert_eq!(describe_weather_code(77), "Snow grains");
        assert_eq!(describe_weather_code(81), "Rain showers");
        assert_eq!(describe_weather_code(99), "Thunderstorm with hail");
        assert_eq!(describe_weather_code(4), "Unknown");
        assert_eq!(describe_weather_code(-1), "Unknown");
    }

    #[test]
    fn request_url_is_deterministic() {
        let url =
            OpenMeteoClient::new().request_url(&Location::new("Berlin", 52.52, 13.41)).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.open-meteo.com/v1/forecast?latitude=52.52&longitude=13.41\
             &current=temperature_2m%2Crelative_humidity_2m%2Capparent_temperature%2Cprecipitation%2Cweather_code%2Cwind_speed_10m%2Csurface_pressure\
             &timezone=auto"
        );
    }
}

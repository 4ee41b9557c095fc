use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::Provider;

/// A named point on the map, as returned by geocoding or entered by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Location {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self { name: name.into(), latitude, longitude, country: None }
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    /// "Name, Country" when the country is known.
    pub fn label(&self) -> String {
        match &self.country {
            Some(country) => format!("{}, {}", self.name, country),
            None => self.name.clone(),
        }
    }
}

/// Current conditions normalized from one provider response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    /// Degrees Celsius.
    pub temperature: f64,
    pub description: String,
    /// Relative humidity, 0..=100.
    pub humidity_pct: u8,
    pub wind_speed: f64,
    /// hPa.
    pub pressure: i32,
    pub observed_at: DateTime<Utc>,
    /// The provider whose client produced this reading.
    pub provider: Provider,
}

/// Clamp a provider-reported humidity into the 0..=100 range.
pub(crate) fn humidity_pct(raw: i64) -> u8 {
    raw.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn san_francisco() -> Location {
        Location::new("San Francisco", 37.7749, -122.4194).with_country("United States")
    }

    #[test]
    fn location_json_roundtrip() {
        let loc = san_francisco();
        let json = serde_json::to_string(&loc).unwrap();
        let back: Location = serde_json::from_str(&json).unwrap();
        assert_eq!(loc, back);

        let bare = Location::new("Nowhere", 0.0, 0.0);
        let json = serde_json::to_string(&bare).unwrap();
        assert!(!json.contains("country"));
        assert_eq!(bare, serde_json::from_str::<Location>(&json).unwrap());
    }

    #[test]
    fn reading_json_roundtrip() {
        let reading = WeatherReading {
            temperature: 22.5,
            description: "Partly cloudy".into(),
            humidity_pct: 65,
            wind_speed: 12.3,
            pressure: 1013,
            observed_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 0).unwrap(),
            provider: Provider::OpenMeteo,
        };
        let json = serde_json::to_string(&reading).unwrap();
        let back: WeatherReading = serde_json::from_str(&json).unwrap();
        assert_eq!(reading, back);
    }

    #[test]
    fn label_includes_country_when_known() {
        assert_eq!(san_francisco().label(), "San Francisco, United States");
        assert_eq!(Location::new("Atlantis", 1.0, 2.0).label(), "Atlantis");
    }

    #[test]
    fn humidity_is_clamped() {
        assert_eq!(humidity_pct(-3), 0);
        assert_eq!(humidity_pct(65), 65);
        assert_eq!(humidity_pct(140), 100);
    }
}

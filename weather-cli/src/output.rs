use chrono::{DateTime, Local, TimeZone};
use weather_core::{Location, Provider, WeatherReading};

pub fn location_line(location: &Location) -> String {
    format!("{} ({:.4}, {:.4})", location.label(), location.latitude, location.longitude)
}

pub fn provider_line(provider: Provider, configured: bool, selected: bool) -> String {
    let marker = if selected { "*" } else { " " };
    let status = if !provider.requires_api_key() {
        "no key needed"
    } else if configured {
        "configured"
    } else {
        "missing API key"
    };

    format!(
        "{marker} {:<16} {:<16} [{}] {status}",
        provider.as_str(),
        provider.display_name(),
        provider.accent()
    )
}

pub fn reading_block<Tz: TimeZone>(location: &Location, reading: &WeatherReading, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let updated: DateTime<Tz> = reading.observed_at.with_timezone(tz);

    format!(
        "{}\n  {:.1}°C, {}\n  Humidity: {}%\n  Wind:     {:.1}\n  Pressure: {} hPa\n  Updated:  {} via {}",
        location.label(),
        reading.temperature,
        reading.description,
        reading.humidity_pct,
        reading.wind_speed,
        reading.pressure,
        updated.format("%H:%M"),
        reading.provider.display_name(),
    )
}

pub fn local_reading(location: &Location, reading: &WeatherReading) -> String {
    reading_block(location, reading, &Local)
}

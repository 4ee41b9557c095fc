//! Core library for the `weather` app.
//!
//! This crate defines:
//! - Shared domain models (locations, readings) and the error taxonomy
//! - Weather provider clients (OpenWeatherMap, Open-Meteo) and the geocoder
//! - The search, weather and root state machines plus the [`Store`] that runs their effects
//! - Configuration & credentials handling
//!
//! It is used by `weather-cli`, but any front end can drive a [`Store`] with
//! [`AppAction`]s and render from [`AppState`] snapshots.

pub mod config;
pub mod error;
pub mod feature;
pub mod geocoding;
pub mod model;
pub mod provider;
pub mod store;

pub use config::{Config, ProviderConfig};
pub use error::ServiceError;
pub use feature::{
    RequestId,
    app::{AppAction, AppEffect, AppState},
    search::{SearchAction, SearchPhase, SearchState},
    weather::{WeatherAction, WeatherPhase, WeatherState},
};
pub use geocoding::GeocodingClient;
pub use model::{Location, WeatherReading};
pub use provider::{Provider, ProviderClients, WeatherClient};
pub use store::{Store, StoreConfig};

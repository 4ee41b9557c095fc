//! Weather display: loading, stale-data-plus-error and retry for one location.

use tracing::debug;

use crate::{Location, ServiceError, WeatherReading, feature::RequestId, provider::Provider};

#[derive(Debug, Clone, PartialEq)]
pub enum WeatherAction {
    FetchWeather { location: Location, provider: Provider },
    Response { request: RequestId, result: Result<WeatherReading, ServiceError> },
    RetryFetch,
}

/// Async work requested by the weather feature.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherEffect {
    /// Ask the client bound to `provider` for `location`; answer with
    /// [`WeatherAction::Response`] carrying `request`.
    Fetch { request: RequestId, location: Location, provider: Provider },
}

/// Coarse view of [`WeatherState`] for rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeatherPhase<'a> {
    Idle,
    Loading,
    Loaded(&'a WeatherReading),
    Failed(&'a ServiceError),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherState {
    /// Sticky: survives failures, replaced only by a new fetch.
    pub current_location: Option<Location>,
    /// Replaced only on success, kept on failure.
    pub last_reading: Option<WeatherReading>,
    pub is_loading: bool,
    pub error: Option<ServiceError>,
    in_flight: Option<RequestId>,
    requests: RequestId,
}

impl WeatherState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> WeatherPhase<'_> {
        if self.is_loading {
            WeatherPhase::Loading
        } else if let Some(error) = &self.error {
            WeatherPhase::Failed(error)
        } else if let Some(reading) = &self.last_reading {
            WeatherPhase::Loaded(reading)
        } else {
            WeatherPhase::Idle
        }
    }

    pub fn reduce(&mut self, action: WeatherAction) -> Vec<WeatherEffect> {
        match action {
            WeatherAction::FetchWeather { location, provider } => {
                vec![self.fetch(location, provider)]
            }

            WeatherAction::Response { request, result } => {
                if self.in_flight != Some(request) {
                    debug!(
                        %request,
                        latest = ?self.in_flight,
                        "dropping superseded weather response"
                    );
                    return Vec::new();
                }
                self.in_flight = None;
                self.is_loading = false;

                match result {
                    Ok(reading) => {
                        debug!(provider = %reading.provider, "weather loaded");
                        self.last_reading = Some(reading);
                        self.error = None;
                    }
                    Err(error) => {
                        debug!(%error, "weather fetch failed");
                        self.error = Some(error);
                    }
                }
                Vec::new()
            }

            WeatherAction::RetryFetch => {
                let Some(location) = self.current_location.clone() else {
                    debug!("retry ignored: no current location");
                    return Vec::new();
                };
                let provider = self
                    .last_reading
                    .as_ref()
                    .map(|reading| reading.provider)
                    .unwrap_or_default();

                vec![self.fetch(location, provider)]
            }
        }
    }

    fn fetch(&mut self, location: Location, provider: Provider) -> WeatherEffect {
        let request = self.requests.advance();

        debug!(%request, location = %location.name, %provider, "fetching weather");
        self.current_location = Some(location.clone());
        self.is_loading = true;
        self.error = None;
        self.in_flight = Some(request);

        WeatherEffect::Fetch { request, location, provider }
    }
}

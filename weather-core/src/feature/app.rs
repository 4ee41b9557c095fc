//! Root composition: provider selection plus the search and weather features.

use tracing::{debug, info};

use crate::{
    feature::{
        search::{SearchAction, SearchEffect, SearchState},
        weather::{WeatherAction, WeatherEffect, WeatherState},
    },
    provider::Provider,
};

#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    Search(SearchAction),
    Weather(WeatherAction),
    ProviderSelected(Provider),
}

/// Effects left for the runner once cross-feature events are routed.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEffect {
    Weather(WeatherEffect),
    Search(SearchEffect),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub selected_provider: Provider,
    pub search: SearchState,
    pub weather: WeatherState,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(provider: Provider) -> Self {
        Self { selected_provider: provider, ..Self::default() }
    }

    pub fn reduce(&mut self, action: AppAction) -> Vec<AppEffect> {
        match action {
            AppAction::Search(action) => {
                let mut effects = Vec::new();
                for effect in self.search.reduce(action) {
                    match effect {
                        SearchEffect::LocationSelected(location) => {
                            info!(
                                location = %location.name,
                                provider = %self.selected_provider,
                                "location selected"
                            );
                            effects.extend(self.fetch_weather(WeatherAction::FetchWeather {
                                location,
                                provider: self.selected_provider,
                            }));
                        }
                        other => effects.push(AppEffect::Search(other)),
                    }
                }
                effects
            }

            AppAction::Weather(action) => self.fetch_weather(action),

            AppAction::ProviderSelected(provider) => {
                self.selected_provider = provider;

                let Some(location) = self.weather.current_location.clone() else {
                    debug!(%provider, "provider changed with no location to refresh");
                    return Vec::new();
                };
                info!(%provider, location = %location.name, "provider changed, refreshing");
                self.fetch_weather(WeatherAction::FetchWeather { location, provider })
            }
        }
    }

    fn fetch_weather(&mut self, action: WeatherAction) -> Vec<AppEffect> {
        self.weather.reduce(action).into_iter().map(AppEffect::Weather).collect()
    }
}

//! Effect runner for [`AppState`].
//!
//! The store is the single owner of the app state. Actions are applied
//! synchronously; the effects they return are spawned as tokio tasks that
//! report back through a channel. Each logical request has one task slot
//! (weather, search), and starting new work in a slot aborts its previous
//! task. Aborting is best effort: a completion that already made it into the
//! channel is still rejected by the features' request-id and text guards.

use std::{sync::Arc, time::Duration};

use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, trace, warn};

use crate::{
    Config, ServiceError,
    config::DEFAULT_DEBOUNCE_MS,
    feature::{
        app::{AppAction, AppEffect, AppState},
        search::{SearchAction, SearchEffect},
        weather::{WeatherAction, WeatherEffect},
    },
    geocoding::{GeocodingClient, geocoder_from_config},
    provider::{ProviderClients, clients_from_config},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Quiet period between the last keystroke and the geocoding call.
    pub debounce: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS) }
    }
}

#[derive(Debug)]
pub struct Store {
    state: AppState,
    clients: ProviderClients,
    geocoder: Arc<dyn GeocodingClient>,
    config: StoreConfig,
    tx: mpsc::UnboundedSender<AppAction>,
    rx: mpsc::UnboundedReceiver<AppAction>,
    weather_task: Option<JoinHandle<()>>,
    search_task: Option<JoinHandle<()>>,
}

impl Store {
    pub fn new(
        state: AppState,
        clients: ProviderClients,
        geocoder: Arc<dyn GeocodingClient>,
        config: StoreConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { state, clients, geocoder, config, tx, rx, weather_task: None, search_task: None }
    }

    /// Build clients and settings from the on-disk config.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(
            AppState::with_provider(config.default_provider()?),
            clients_from_config(config)?,
            geocoder_from_config(config)?,
            config.store_config(),
        ))
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Apply `action` and start whatever async work it asks for.
    ///
    /// Must be called from within a tokio runtime.
    pub fn send(&mut self, action: AppAction) {
        trace!(?action, "reduce");
        for effect in self.state.reduce(action) {
            self.run(effect);
        }
    }

    /// True when nothing is loading and no debounce timer is armed.
    pub fn is_settled(&self) -> bool {
        !self.state.weather.is_loading
            && !self.state.search.is_loading
            && !self.state.search.is_debouncing()
    }

    /// Wait for the next completion and apply it.
    ///
    /// Returns `false` without waiting when the store is already settled.
    pub async fn next(&mut self) -> bool {
        if self.is_settled() {
            return false;
        }
        match self.rx.recv().await {
            Some(action) => {
                self.send(action);
                true
            }
            None => false,
        }
    }

    /// Process completions until the store is settled.
    pub async fn settle(&mut self) {
        while self.next().await {}
    }

    fn run(&mut self, effect: AppEffect) {
        match effect {
            AppEffect::Weather(WeatherEffect::Fetch { request, location, provider }) => {
                debug!(%request, %provider, location = %location.name, "dispatching weather fetch");
                let client = self.clients.client(provider);
                let tx = self.tx.clone();

                let handle = tokio::spawn(async move {
                    let guard = PanicGuard::new(
                        &tx,
                        AppAction::Weather(WeatherAction::Response {
                            request,
                            result: Err(crashed("weather client")),
                        }),
                    );
                    let result = client.fetch(&location).await;
                    guard.disarm();
                    let tagged = result.as_ref().ok().map(|reading| reading.provider);
                    if let Some(got) = tagged.filter(|got| *got != provider) {
                        warn!(
                            expected = %provider,
                            %got,
                            "client tagged reading with another provider"
                        );
                    }
                    deliver(&tx, AppAction::Weather(WeatherAction::Response { request, result }));
                });
                replace_slot(&mut self.weather_task, handle);
            }

            AppEffect::Search(SearchEffect::ArmDebounce { text }) => {
                let delay = self.config.debounce;
                let tx = self.tx.clone();

                let handle = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    deliver(&tx, AppAction::Search(SearchAction::DebounceElapsed(text)));
                });
                replace_slot(&mut self.search_task, handle);
            }

            AppEffect::Search(SearchEffect::Cancel) => {
                if let Some(task) = self.search_task.take() {
                    debug!("cancelling pending search work");
                    task.abort();
                }
            }

            AppEffect::Search(SearchEffect::Search { request, query }) => {
                debug!(%request, %query, "dispatching location search");
                let geocoder = Arc::clone(&self.geocoder);
                let tx = self.tx.clone();

                let handle = tokio::spawn(async move {
                    let guard = PanicGuard::new(
                        &tx,
                        AppAction::Search(SearchAction::Response {
                            request,
                            query: query.clone(),
                            result: Err(crashed("geocoder")),
                        }),
                    );
                    let result = geocoder.search(&query).await;
                    guard.disarm();
                    let response = SearchAction::Response { request, query, result };
                    deliver(&tx, AppAction::Search(response));
                });
                replace_slot(&mut self.search_task, handle);
            }

            AppEffect::Search(SearchEffect::LocationSelected(location)) => {
                // Routed by AppState; reaching the runner means nobody consumed it.
                debug!(location = %location.name, "unrouted location selection");
            }
        }
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        for task in [self.weather_task.take(), self.search_task.take()].into_iter().flatten() {
            task.abort();
        }
    }
}

fn replace_slot(slot: &mut Option<JoinHandle<()>>, handle: JoinHandle<()>) {
    if let Some(previous) = slot.replace(handle) {
        previous.abort();
    }
}

fn crashed(component: &str) -> ServiceError {
    ServiceError::Unknown(format!("{component} panicked"))
}

/// Delivers a failed completion if the task unwinds before answering, so a
/// panicking client cannot leave its request loading forever.
///
/// Dropping it without a panic (abort, or after [`PanicGuard::disarm`]) sends nothing.
struct PanicGuard {
    tx: mpsc::UnboundedSender<AppAction>,
    fallback: Option<AppAction>,
}

impl PanicGuard {
    fn new(tx: &mpsc::UnboundedSender<AppAction>, fallback: AppAction) -> Self {
        Self { tx: tx.clone(), fallback: Some(fallback) }
    }

    fn disarm(mut self) {
        self.fallback = None;
    }
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            return;
        }
        if let Some(action) = self.fallback.take() {
            warn!("client task panicked; reporting failure");
            deliver(&self.tx, action);
        }
    }
}

fn deliver(tx: &mpsc::UnboundedSender<AppAction>, action: AppAction) {
    if tx.send(action).is_err() {
        debug!("store dropped before completion was delivered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Location, ServiceError, WeatherReading, provider::{Provider, WeatherClient}};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct StubWeather {
        provider: Provider,
        delay: Duration,
        result: Result<f64, ServiceError>,
        calls: Mutex<Vec<Location>>,
    }

    impl StubWeather {
        fn ok(provider: Provider, temperature: f64) -> Arc<Self> {
            Self::with(provider, Duration::from_millis(100), Ok(temperature))
        }

        fn with(
            provider: Provider,
            delay: Duration,
            result: Result<f64, ServiceError>,
        ) -> Arc<Self> {
            Arc::new(Self { provider, delay, result, calls: Mutex::new(Vec::new()) })
        }

        fn calls(&self) -> Vec<Location> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WeatherClient for StubWeather {
        async fn fetch(&self, location: &Location) -> Result<WeatherReading, ServiceError> {
            self.calls.lock().unwrap().push(location.clone());
            tokio::time::sleep(self.delay).await;
            let temperature = self.result.clone()?;
            Ok(WeatherReading {
                temperature,
                description: "Partly cloudy".into(),
                humidity_pct: 65,
                wind_speed: 12.3,
                pressure: 1013,
                observed_at: Utc::now(),
                provider: self.provider,
            })
        }
    }

    #[derive(Debug, Default)]
    struct StubGeocoder {
        results: Vec<Location>,
        queries: Mutex<Vec<String>>,
    }

    impl StubGeocoder {
        fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GeocodingClient for StubGeocoder {
        async fn search(&self, query: &str) -> Result<Vec<Location>, ServiceError> {
            self.queries.lock().unwrap().push(query.to_string());
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(self.results.clone())
        }
    }

    struct Harness {
        store: Store,
        owm: Arc<StubWeather>,
        meteo: Arc<StubWeather>,
        geocoder: Arc<StubGeocoder>,
    }

    fn harness(owm: Arc<StubWeather>, meteo: Arc<StubWeather>) -> Harness {
        let geocoder =
            Arc::new(StubGeocoder { results: vec![san_francisco()], ..Default::default() });
        let store = Store::new(
            AppState::new(),
            ProviderClients::new(owm.clone(), meteo.clone()),
            geocoder.clone(),
            StoreConfig::default(),
        );
        Harness { store, owm, meteo, geocoder }
    }

    fn san_francisco() -> Location {
        Location::new("San Francisco", 37.7749, -122.4194).with_country("United States")
    }

    fn fetch(location: Location, provider: Provider) -> AppAction {
        AppAction::Weather(WeatherAction::FetchWeather { location, provider })
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_success_scenario() {
        let mut h = harness(
            StubWeather::ok(Provider::OpenWeatherMap, 22.5),
            StubWeather::ok(Provider::OpenMeteo, 0.0),
        );

        h.store.send(fetch(san_francisco(), Provider::OpenWeatherMap));
        assert!(h.store.state().weather.is_loading);
        h.store.settle().await;

        let weather = &h.store.state().weather;
        assert!(!weather.is_loading);
        assert_eq!(weather.error, None);
        let reading = weather.last_reading.as_ref().unwrap();
        assert_eq!(reading.temperature, 22.5);
        assert_eq!(reading.provider, Provider::OpenWeatherMap);
        assert_eq!(h.owm.calls(), vec![san_francisco()]);
        assert!(h.meteo.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_failure_scenario() {
        let mut h = harness(
            StubWeather::with(
                Provider::OpenWeatherMap,
                Duration::ZERO,
                Err(ServiceError::ApiKeyMissing),
            ),
            StubWeather::ok(Provider::OpenMeteo, 0.0),
        );
        let invalid = Location::new("Invalid Location", 999.0, 999.0).with_country("Unknown");

        h.store.send(fetch(invalid, Provider::OpenWeatherMap));
        h.store.settle().await;

        let weather = &h.store.state().weather;
        assert!(!weather.is_loading);
        assert_eq!(weather.error, Some(ServiceError::ApiKeyMissing));
        assert_eq!(weather.last_reading, None);
    }

    #[tokio::test(start_paused = true)]
    async fn latest_fetch_wins_over_slow_earlier_fetch() {
        let mut h = harness(
            StubWeather::with(Provider::OpenWeatherMap, Duration::from_secs(5), Ok(30.0)),
            StubWeather::ok(Provider::OpenMeteo, 15.0),
        );
        let berlin = Location::new("Berlin", 52.52, 13.41);

        h.store.send(fetch(san_francisco(), Provider::OpenWeatherMap));
        h.store.send(fetch(berlin.clone(), Provider::OpenMeteo));
        h.store.settle().await;
        // Give the slow call every chance to land.
        tokio::time::sleep(Duration::from_secs(10)).await;
        while let Ok(action) = h.store.rx.try_recv() {
            h.store.send(action);
        }

        let weather = &h.store.state().weather;
        assert_eq!(weather.current_location, Some(berlin));
        let reading = weather.last_reading.as_ref().unwrap();
        assert_eq!(reading.temperature, 15.0);
        assert_eq!(reading.provider, Provider::OpenMeteo);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_without_location_dispatches_nothing() {
        let mut h = harness(
            StubWeather::ok(Provider::OpenWeatherMap, 1.0),
            StubWeather::ok(Provider::OpenMeteo, 2.0),
        );
        let before = h.store.state().clone();

        h.store.send(AppAction::Weather(WeatherAction::RetryFetch));

        assert!(h.store.is_settled());
        assert_eq!(h.store.state(), &before);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(h.owm.calls().is_empty());
        assert!(h.meteo.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_typing_sends_one_search_for_latest_text() {
        let mut h = harness(
            StubWeather::ok(Provider::OpenWeatherMap, 1.0),
            StubWeather::ok(Provider::OpenMeteo, 2.0),
        );

        h.store.send(AppAction::Search(SearchAction::QueryChanged("San".into())));
        tokio::time::advance(Duration::from_millis(500)).await;
        h.store.send(AppAction::Search(SearchAction::QueryChanged("San Fran".into())));
        h.store.settle().await;

        assert_eq!(h.geocoder.queries(), vec!["San Fran".to_string()]);
        assert_eq!(h.store.state().search.results, vec![san_francisco()]);
        assert!(!h.store.state().search.is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn short_query_never_reaches_geocoder() {
        let mut h = harness(
            StubWeather::ok(Provider::OpenWeatherMap, 1.0),
            StubWeather::ok(Provider::OpenMeteo, 2.0),
        );

        h.store.send(AppAction::Search(SearchAction::QueryChanged("Sa".into())));
        h.store.send(AppAction::Search(SearchAction::QueryChanged("S".into())));
        assert!(h.store.is_settled());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(h.geocoder.queries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn search_then_select_fetches_with_selected_provider() {
        let mut h = harness(
            StubWeather::ok(Provider::OpenWeatherMap, 1.0),
            StubWeather::ok(Provider::OpenMeteo, 18.0),
        );

        h.store.send(AppAction::ProviderSelected(Provider::OpenMeteo));
        h.store.send(AppAction::Search(SearchAction::ExecuteSearch("San Francisco".into())));
        h.store.settle().await;

        let picked = h.store.state().search.results[0].clone();
        h.store.send(AppAction::Search(SearchAction::SelectLocation(picked)));
        h.store.settle().await;

        let state = h.store.state();
        assert!(state.search.query_text.is_empty());
        assert_eq!(state.weather.last_reading.as_ref().unwrap().provider, Provider::OpenMeteo);
        assert_eq!(h.meteo.calls(), vec![san_francisco()]);
        assert!(h.owm.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn clearing_cancels_armed_debounce() {
        let mut h = harness(
            StubWeather::ok(Provider::OpenWeatherMap, 1.0),
            StubWeather::ok(Provider::OpenMeteo, 2.0),
        );

        h.store.send(AppAction::Search(SearchAction::QueryChanged("Paris".into())));
        h.store.send(AppAction::Search(SearchAction::Clear));
        assert!(h.store.is_settled());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(h.geocoder.queries().is_empty());
    }

    #[derive(Debug)]
    struct PanickingClient;

    #[async_trait]
    impl WeatherClient for PanickingClient {
        async fn fetch(&self, _: &Location) -> Result<WeatherReading, ServiceError> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            panic!("weather client bug");
        }
    }

    #[async_trait]
    impl GeocodingClient for PanickingClient {
        async fn search(&self, _: &str) -> Result<Vec<Location>, ServiceError> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            panic!("geocoder bug");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_clients_fail_their_request_instead_of_hanging() {
        let mut store = Store::new(
            AppState::new(),
            ProviderClients::new(
                Arc::new(PanickingClient),
                StubWeather::ok(Provider::OpenMeteo, 0.0),
            ),
            Arc::new(PanickingClient),
            StoreConfig::default(),
        );

        store.send(fetch(san_francisco(), Provider::OpenWeatherMap));
        store.settle().await;

        let weather = &store.state().weather;
        assert!(!weather.is_loading);
        assert_eq!(weather.error, Some(ServiceError::Unknown("weather client panicked".into())));

        store.send(AppAction::Search(SearchAction::ExecuteSearch("Paris".into())));
        store.settle().await;

        let search = &store.state().search;
        assert!(!search.is_loading);
        assert_eq!(search.error, Some(ServiceError::Unknown("geocoder panicked".into())));
        assert!(search.results.is_empty());
    }
}

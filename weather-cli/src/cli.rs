use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use inquire::{Confirm, Password, PasswordDisplayMode, Select};
use tracing::debug;
use weather_core::{
    AppAction, Config, Location, Provider, SearchAction, Store, WeatherAction,
    geocoding::GEOCODER_ID,
};

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Print debug logs to stderr (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the API key for a provider or for the "opencage" geocoder.
    Configure {
        /// "openweathermap" or "opencage".
        service: String,
    },

    /// List weather providers and whether they are ready to use.
    Providers,

    /// Search for locations matching a query.
    Search {
        query: String,
    },

    /// Show current weather for a place name or for explicit coordinates.
    Show {
        /// Place name to geocode.
        #[arg(required_unless_present = "lat")]
        query: Option<String>,

        /// Provider to use instead of the configured default.
        #[arg(long, short)]
        provider: Option<String>,

        /// Latitude for manual entry (skips geocoding).
        #[arg(long, requires = "lon", conflicts_with = "query", allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Longitude for manual entry.
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,

        /// Display name for a manually entered location.
        #[arg(long, requires = "lat")]
        name: Option<String>,

        /// Pick among several matches and offer to retry failed fetches.
        #[arg(long, short)]
        interactive: bool,
    },
}

/// Wrapper so `inquire::Select` can list locations.
struct Choice(Location);

impl std::fmt::Display for Choice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&output::location_line(&self.0))
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { service } => configure(&service),
            Command::Providers => list_providers(),
            Command::Search { query } => search(query).await,
            Command::Show { query, provider, lat, lon, name, interactive } => {
                let manual = match (lat, lon) {
                    (Some(latitude), Some(longitude)) => Some(Location::new(
                        name.unwrap_or_else(|| format!("{latitude:.4}, {longitude:.4}")),
                        latitude,
                        longitude,
                    )),
                    _ => None,
                };
                show(query, manual, provider, interactive).await
            }
        }
    }
}

fn configure(service: &str) -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let (key_id, provider) = if service.eq_ignore_ascii_case(GEOCODER_ID) {
        (GEOCODER_ID.to_string(), None)
    } else {
        let provider = Provider::try_from(service)?;
        if !provider.requires_api_key() {
            println!("{} does not need an API key.", provider.display_name());
            if Confirm::new(&format!("Use {} as default provider?", provider.display_name()))
                .with_default(false)
                .prompt()?
            {
                config.set_default_provider(provider);
                config.save()?;
            }
            return Ok(());
        }
        (provider.as_str().to_string(), Some(provider))
    };

    let api_key = Password::new(&format!("API key for {key_id}:"))
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    let api_key = api_key.trim().to_string();
    if api_key.is_empty() {
        bail!("API key must not be empty");
    }
    config.upsert_api_key(&key_id, api_key);

    if let Some(provider) = provider {
        if Confirm::new(&format!("Use {} as default provider?", provider.display_name()))
            .with_default(true)
            .prompt()?
        {
            config.set_default_provider(provider);
        }
    }

    config.save()?;
    println!("Saved credentials for {key_id} to {}", Config::config_file_path()?.display());
    Ok(())
}

fn list_providers() -> anyhow::Result<()> {
    let config = Config::load()?;
    let selected = config.default_provider()?;

    for provider in Provider::all() {
        println!(
            "{}",
            output::provider_line(
                *provider,
                config.is_provider_configured(*provider),
                *provider == selected,
            )
        );
    }
    let geocoder =
        if config.api_key(GEOCODER_ID).is_some() { "configured" } else { "missing API key" };
    println!("  geocoder ({GEOCODER_ID}): {geocoder}");
    Ok(())
}

/// Run an immediate search and return the ranked results.
async fn resolve(store: &mut Store, query: String) -> anyhow::Result<Vec<Location>> {
    store.send(AppAction::Search(SearchAction::ExecuteSearch(query)));
    store.settle().await;

    let search = &store.state().search;
    match &search.error {
        Some(error) => Err(anyhow!("Location search failed: {error}")),
        None => Ok(search.results.clone()),
    }
}

async fn search(query: String) -> anyhow::Result<()> {
    let mut store = Store::from_config(&Config::load()?)?;
    let results = resolve(&mut store, query.clone()).await?;

    if results.is_empty() {
        println!("No locations found for '{query}'.");
    }
    for (idx, location) in results.iter().enumerate() {
        println!("{:>2}. {}", idx + 1, output::location_line(location));
    }
    Ok(())
}

async fn show(
    query: Option<String>,
    manual: Option<Location>,
    provider: Option<String>,
    interactive: bool,
) -> anyhow::Result<()> {
    let mut store = Store::from_config(&Config::load()?)?;

    if let Some(provider) = provider {
        store.send(AppAction::ProviderSelected(Provider::try_from(provider.as_str())?));
    }

    let location = match (manual, query) {
        (Some(location), _) => location,
        (None, Some(query)) => {
            let mut results = resolve(&mut store, query.clone()).await?;
            if results.is_empty() {
                bail!("No locations found for '{query}'.");
            }
            if interactive && results.len() > 1 {
                let choices = results.into_iter().map(Choice).collect();
                Select::new("Choose a location:", choices).prompt()?.0
            } else {
                results.swap_remove(0)
            }
        }
        (None, None) => bail!("Provide a place name or --lat/--lon"),
    };

    debug!(location = %location.name, "selecting location");
    store.send(AppAction::Search(SearchAction::SelectLocation(location)));
    store.settle().await;

    loop {
        let weather = &store.state().weather;
        let location = weather
            .current_location
            .as_ref()
            .ok_or_else(|| anyhow!("No location was selected"))?;

        if let Some(reading) = &weather.last_reading {
            println!("{}", output::local_reading(location, reading));
        }

        let Some(error) = weather.error.clone() else {
            return Ok(());
        };

        eprintln!("Error: {error}");
        if !(interactive && Confirm::new("Retry?").with_default(true).prompt()?) {
            bail!("Weather fetch failed: {error}");
        }

        store.send(AppAction::Weather(WeatherAction::RetryFetch));
        store.settle().await;
    }
}

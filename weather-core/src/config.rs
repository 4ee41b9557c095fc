use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use crate::{provider::Provider, store::StoreConfig};

pub const DEFAULT_DEBOUNCE_MS: u64 = 2_000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Credentials for one service (weather provider or geocoder).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Quiet period before a typed query is sent to the geocoder.
    pub debounce_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { debounce_ms: DEFAULT_DEBOUNCE_MS }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: DEFAULT_TIMEOUT_SECS }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Optional default provider id, e.g. "openweathermap" or "openmeteo".
    pub default_provider: Option<String>,

    /// Example TOML:
    /// [providers.openweathermap]
    /// api_key = "..."
    ///
    /// [providers.opencage]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    /// The configured default provider, or [`Provider::default`] when unset.
    pub fn default_provider(&self) -> Result<Provider> {
        match self.default_provider.as_deref() {
            Some(id) => Provider::try_from(id).context("Invalid `default_provider` in config file"),
            None => Ok(Provider::default()),
        }
    }

    pub fn set_default_provider(&mut self, provider: Provider) {
        self.default_provider = Some(provider.as_str().to_string());
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-task", "weather-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set or replace the API key stored under `id` (a provider id or the geocoder id).
    pub fn upsert_api_key(&mut self, id: &str, api_key: String) {
        self.providers.insert(id.to_string(), ProviderConfig { api_key });
    }

    /// Returns the non-empty API key stored under `id`, if any.
    pub fn api_key(&self, id: &str) -> Option<&str> {
        self.providers
            .get(id)
            .map(|cfg| cfg.api_key.as_str())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn provider_api_key(&self, provider: Provider) -> Option<&str> {
        self.api_key(provider.as_str())
    }

    /// Keyless providers are always configured.
    pub fn is_provider_configured(&self, provider: Provider) -> bool {
        !provider.requires_api_key() || self.provider_api_key(provider).is_some()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs.max(1))
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig { debounce: Duration::from_millis(self.search.debounce_ms) }
    }
}

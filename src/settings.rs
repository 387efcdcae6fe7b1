//! Runtime configuration for the binary: an optional `routeflow.toml`
//! next to the executable, overridable through `ROUTEFLOW__`-prefixed
//! environment variables, with working defaults for everything.

use serde::Deserialize;

use crate::error::{Result, StoreError};
use crate::persist::PersistenceMode;

#[derive(Clone, Debug, Deserialize)]
pub struct StorageSettings {
    /// "file", "memory" or "disabled".
    pub mode: String,
    pub path: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TflSettings {
    pub route_endpoint: String,
    pub arrivals_endpoint: String,
    pub app_key: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProfileSettings {
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    pub storage: StorageSettings,
    pub tfl: TflSettings,
    #[serde(default)]
    pub profile: ProfileSettings,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("storage.mode", "file")?
            .set_default("storage.path", "routeflow.db")?
            .set_default(
                "tfl.route_endpoint",
                "https://api.tfl.gov.uk/Line/Mode/bus/Route",
            )?
            .set_default("tfl.arrivals_endpoint", "https://api.tfl.gov.uk/Line")?
            .set_default("tfl.app_key", "")?
            .add_source(config::File::with_name("routeflow").required(false))
            .add_source(
                config::Environment::with_prefix("ROUTEFLOW")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn persistence_mode(&self) -> PersistenceMode {
        match self.storage.mode.as_str() {
            "memory" => PersistenceMode::InMemory,
            "disabled" => PersistenceMode::Disabled,
            _ => PersistenceMode::File(self.storage.path.clone()),
        }
    }
}

impl From<config::ConfigError> for StoreError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

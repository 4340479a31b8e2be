//! Agent settings.
//!
//! Settings come from an optional JSON file named by `FLEETCONF_SETTINGS`,
//! then individual environment variables override single fields. Invalid
//! override values are ignored with a warning; the final settings are
//! validated as a whole.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fleetconf_core::{MergeOptions, RemoteSources, StorageKeys};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Environment variable naming the settings file.
pub const SETTINGS_FILE_ENV: &str = "FLEETCONF_SETTINGS";

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid JSON for this schema.
    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A setting holds an unusable value.
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Settings for the reconciliation agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentSettings {
    /// Base URL holding `global.json` and `<location>.json`.
    pub config_url: String,

    /// Location name of this device; selects the instance document.
    pub location_name: String,

    /// Directory holding the stored documents.
    pub data_dir: PathBuf,

    /// Admin HTTP listen address.
    pub http_addr: SocketAddr,

    /// Per-request timeout for remote fetches.
    pub fetch_timeout_secs: u64,

    /// Period between scheduled runs.
    pub reconcile_interval_secs: u64,

    /// Run once immediately at startup.
    pub run_on_startup: bool,

    /// Merge rules applied at both stages.
    pub merge: MergeOptions,

    /// Names of the stored documents.
    pub storage_keys: StorageKeys,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            config_url: String::new(),
            location_name: String::new(),
            data_dir: PathBuf::from("./data"),
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            fetch_timeout_secs: 10,
            reconcile_interval_secs: 300,
            run_on_startup: true,
            merge: MergeOptions::default(),
            storage_keys: StorageKeys::default(),
        }
    }
}

impl AgentSettings {
    /// Load settings from the file named by `FLEETCONF_SETTINGS` (if any)
    /// and the process environment.
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = match std::env::var(SETTINGS_FILE_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        settings.apply_overrides(|name| std::env::var(name).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from a JSON file. Missing fields take defaults.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `FLEETCONF_*` overrides looked up through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(url) = get("FLEETCONF_CONFIG_URL") {
            self.config_url = url;
        }
        if let Some(location) = get("FLEETCONF_LOCATION") {
            self.location_name = location;
        }
        if let Some(dir) = get("FLEETCONF_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = get("FLEETCONF_HTTP_ADDR") {
            match raw.parse::<SocketAddr>() {
                Ok(addr) => self.http_addr = addr,
                Err(err) => warn!("invalid FLEETCONF_HTTP_ADDR, ignoring: {err}"),
            }
        }
        if let Some(raw) = get("FLEETCONF_INTERVAL_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => self.reconcile_interval_secs = secs,
                Ok(_) => warn!("FLEETCONF_INTERVAL_SECS must be positive, ignoring"),
                Err(err) => warn!("invalid FLEETCONF_INTERVAL_SECS, ignoring: {err}"),
            }
        }
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.remote_sources()?;
        if self.fetch_timeout_secs == 0 {
            return Err(SettingsError::Invalid {
                field: "fetchTimeoutSecs",
                reason: "must be positive".to_string(),
            });
        }
        if self.reconcile_interval_secs == 0 {
            return Err(SettingsError::Invalid {
                field: "reconcileIntervalSecs",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Remote tier description for the engine.
    pub fn remote_sources(&self) -> Result<RemoteSources, SettingsError> {
        RemoteSources::new(&self.config_url, &self.location_name).map_err(|e| {
            SettingsError::Invalid {
                field: "locationName",
                reason: e.to_string(),
            }
        })
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }
}

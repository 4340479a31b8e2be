//! Configuration tiers, storage keys and remote source description.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Logical role of a configuration document.
///
/// Precedence, lowest first: bootstrap < global < instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Local seed: factory defaults plus device overrides.
    Bootstrap,
    /// Fleet-wide remote document.
    Global,
    /// Per-location remote document.
    Instance,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Bootstrap => "bootstrap",
            Tier::Global => "global",
            Tier::Instance => "instance",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names of the three documents held by the snapshot store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageKeys {
    /// Last persisted merge of global and instance.
    pub remote_snapshot: String,
    /// Local bootstrap seed.
    pub bootstrap: String,
    /// Canonical effective configuration.
    pub effective: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            remote_snapshot: "config-remote.json".to_string(),
            bootstrap: "config-bootstrap.json".to_string(),
            effective: "config.json".to_string(),
        }
    }
}

/// Where the remote tiers live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSources {
    base_url: String,
    location_name: String,
}

fn location_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("valid regex"))
}

impl RemoteSources {
    /// Describe the remote tiers.
    ///
    /// The location name ends up as a URL path segment, so it is restricted
    /// to a conservative character set. An empty name is allowed and skips
    /// the instance tier.
    pub fn new(base_url: &str, location_name: &str) -> Result<Self, ConfigError> {
        if !location_name.is_empty() && !location_pattern().is_match(location_name) {
            return Err(ConfigError::InvalidLocation(location_name.to_string()));
        }
        Ok(Self {
            base_url: base_url.trim().to_string(),
            location_name: location_name.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn location_name(&self) -> &str {
        &self.location_name
    }
}

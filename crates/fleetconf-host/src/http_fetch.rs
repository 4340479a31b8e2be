//! Blocking HTTP fetcher for remote tiers.
//!
//! Build and use this type from a blocking context (a plain thread or
//! `tokio::task::spawn_blocking`); the blocking client refuses to run on an
//! async worker.

use std::time::Duration;

use fleetconf_core::{ConfigError, RemoteFetcher};
use reqwest::blocking::Client;
use tracing::debug;

/// [`RemoteFetcher`] issuing `GET` requests with a fixed timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fleetconf/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::transport("", format!("build http client: {e}")))?;
        Ok(Self { client })
    }
}

impl RemoteFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String, ConfigError> {
        debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| ConfigError::transport(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConfigError::transport(url, format!("HTTP {}", status.as_u16())));
        }

        let body = response
            .text()
            .map_err(|e| ConfigError::transport(url, format!("read body: {e}")))?;
        if body.is_empty() {
            return Err(ConfigError::transport(url, "empty response body"));
        }
        debug!(url, bytes = body.len(), "received");
        Ok(body)
    }
}

//! Host-side components for the fleetconf agent.
//!
//! This crate provides the platform implementations of the engine's
//! collaborators:
//! - Agent settings (JSON file plus environment overrides)
//! - File-backed snapshot store with atomic replace
//! - Blocking HTTP fetcher with a per-call timeout
//! - Restart signal consumed by the agent's main loop
//! - A tracing layer feeding the bounded log queue
//!
//! # Example
//!
//! ```ignore
//! use fleetconf_host::{AgentSettings, FileSnapshotStore, HttpFetcher, RestartSignal};
//!
//! let settings = AgentSettings::load()?;
//! let store = FileSnapshotStore::open(&settings.data_dir)?;
//! let fetcher = HttpFetcher::new(settings.fetch_timeout())?;
//! ```

pub mod file_store;
pub mod http_fetch;
pub mod log_layer;
pub mod restart;
pub mod settings;

pub use file_store::FileSnapshotStore;
pub use http_fetch::HttpFetcher;
pub use log_layer::SinkLayer;
pub use restart::{RestartSignal, RESTART_EXIT_CODE};
pub use settings::{AgentSettings, SettingsError};

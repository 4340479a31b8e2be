//! # fleetconf-core
//!
//! Configuration reconciliation engine for field devices.
//!
//! This crate provides:
//! - Document parsing and deterministic serialization
//! - Deep merge of configuration documents (object and array-by-id rules)
//! - Serialization-based change detection
//! - Collaborator traits (remote fetcher, snapshot store, restart requester, clock)
//! - The reconciliation orchestrator that ties the tiers together
//! - A bounded, drop-newest log queue
//!
//! This crate is intentionally runtime-agnostic and contains no async code,
//! making it usable on both Linux hosts and embedded targets.

pub mod device;
pub mod document;
pub mod error;
pub mod fetch;
pub mod log_sink;
pub mod merge;
pub mod model;
pub mod reconcile;
pub mod store;

pub use device::{Clock, RestartRequester, SystemClock};
pub use document::{
    documents_equal, empty_document, parse, parse_object, serialize, serialize_pretty, Document,
};
pub use error::ConfigError;
pub use fetch::{global_url, instance_url, RemoteFetcher};
pub use log_sink::{BoundedLogQueue, LogSink};
pub use merge::{merge, MergeOptions};
pub use model::*;
pub use reconcile::{PersistStatus, Reconciler, ReconcileReport, RunOutcome, RunState, TierStatus};
pub use store::{MemorySnapshotStore, SnapshotStore};

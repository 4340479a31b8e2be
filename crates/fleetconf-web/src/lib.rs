//! # fleetconf-web
//!
//! Admin REST API for the fleetconf agent.
//!
//! This crate provides:
//! - Read, replace and delete endpoints for the stored documents
//! - On-demand reconciliation trigger
//! - Device restart and status endpoints
//! - Reconciliation statistics collection
//!
//! ## Architecture
//!
//! The web layer is built on Axum and provides these route groups:
//!
//! - `/config/` - Stored documents and reconcile trigger
//! - `/device/` - Restart, status and log drain
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fleetconf_web::{create_router, AgentState};
//!
//! let state = Arc::new(AgentState { .. });
//! let app = create_router(state);
//!
//! let listener = TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod routes;
pub mod statistics;

// Re-exports
pub use routes::create_router;
pub use statistics::{ReconcileStatistics, StatisticsSnapshot};

use std::fmt;
use std::sync::Arc;

use fleetconf_core::{BoundedLogQueue, RestartRequester, SnapshotStore, StorageKeys};
use serde::Serialize;
use tokio::sync::mpsc;

/// Why a reconciliation run was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    Startup,
    Schedule,
    Admin,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::Startup => "startup",
            TriggerSource::Schedule => "schedule",
            TriggerSource::Admin => "admin",
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared agent state for all route handlers.
pub struct AgentState {
    /// Where the tier documents live.
    pub store: Arc<dyn SnapshotStore>,

    /// Names of the stored documents.
    pub keys: StorageKeys,

    /// Queue feeding the reconciliation scheduler.
    pub trigger: mpsc::Sender<TriggerSource>,

    pub restart: Arc<dyn RestartRequester>,

    pub stats: Arc<ReconcileStatistics>,

    /// Recent log lines, drained by `/device/logs`.
    pub logs: Arc<BoundedLogQueue>,
}

/// Type alias for shared state in Axum handlers.
pub type AppState = Arc<AgentState>;

//! Device control routes.
//!
//! # Endpoints
//!
//! ### `PUT /device/restart`
//! Asks the agent to restart. The response is sent before the restart
//! happens.
//!
//! ### `GET /device/status`
//! Reconciliation statistics since the agent started.
//!
//! ### `GET /device/logs`
//! Removes and returns up to [`LOG_DRAIN_BATCH`] queued log lines.

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, put},
    Router,
};
use serde::Serialize;
use tracing::info;

use crate::statistics::StatisticsSnapshot;
use crate::AppState;

/// Most log lines returned per `/device/logs` call.
pub const LOG_DRAIN_BATCH: usize = 64;

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub entries: Vec<String>,
    pub dropped: u64,
}

/// Create device routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/restart", put(restart_device))
        .route("/status", get(get_status))
        .route("/logs", get(drain_logs))
}

/// PUT /device/restart
async fn restart_device(State(state): State<AppState>) -> StatusCode {
    info!("restart requested over admin API");
    state.restart.request();
    StatusCode::ACCEPTED
}

/// GET /device/status
async fn get_status(State(state): State<AppState>) -> Json<StatisticsSnapshot> {
    let mut snapshot = state.stats.snapshot();
    snapshot.dropped_log_entries = state.logs.dropped();
    Json(snapshot)
}

/// GET /device/logs
async fn drain_logs(State(state): State<AppState>) -> Json<LogsResponse> {
    Json(LogsResponse {
        entries: state.logs.drain(LOG_DRAIN_BATCH),
        dropped: state.logs.dropped(),
    })
}

//! HTTP route handlers for the admin API.

pub mod config;
pub mod device;

use crate::AppState;
use axum::Router;

/// Create the main Axum router with all routes.
///
/// Routes are organized as:
/// - `/config/` - Stored documents and the reconcile trigger
/// - `/device/` - Restart, status and logs
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/config", config::routes())
        .nest("/device", device::routes())
        .with_state(state)
}

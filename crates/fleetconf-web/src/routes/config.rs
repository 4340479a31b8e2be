//! Stored document routes.
//!
//! # Endpoints
//!
//! ### `GET /config/{effective,remote,bootstrap}`
//! Returns the stored document. `?pretty=true` re-indents it.
//! `404` when the document has never been written.
//!
//! ### `PUT /config/bootstrap`
//! Replaces the bootstrap document. The body must be a JSON object of at
//! most [`MAX_BOOTSTRAP_BYTES`]; it is stored in canonical form.
//!
//! ### `DELETE /config/{effective,remote,bootstrap}`
//! Deletes the stored document. Deleting an absent document succeeds.
//!
//! ### `POST /config/reconcile`
//! Queues an on-demand reconciliation run.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use fleetconf_core::{parse, parse_object, serialize, serialize_pretty, ConfigError, SnapshotStore};
use serde::Deserialize;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};

use crate::{AppState, TriggerSource};

/// Largest accepted bootstrap upload.
pub const MAX_BOOTSTRAP_BYTES: usize = 4096;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ShowParams {
    pub pretty: bool,
}

/// Create configuration routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reconcile", post(trigger_reconcile))
        .route(
            "/:document",
            get(show_document)
                .put(replace_document)
                .delete(delete_document),
        )
}

type ApiResult = Result<Response, (StatusCode, String)>;

/// Map a route name to the storage key it stands for.
fn key_for(state: &AppState, document: &str) -> Result<String, (StatusCode, String)> {
    let keys = &state.keys;
    match document {
        "effective" => Ok(keys.effective.clone()),
        "remote" => Ok(keys.remote_snapshot.clone()),
        "bootstrap" => Ok(keys.bootstrap.clone()),
        other => Err((StatusCode::NOT_FOUND, format!("unknown document: {other}"))),
    }
}

/// Run a store operation off the async workers.
async fn with_store<T, F>(state: &AppState, op: F) -> Result<T, ConfigError>
where
    F: FnOnce(&dyn SnapshotStore) -> Result<T, ConfigError> + Send + 'static,
    T: Send + 'static,
{
    let store = state.store.clone();
    tokio::task::spawn_blocking(move || op(store.as_ref()))
        .await
        .map_err(|e| ConfigError::local_store("", format!("store task failed: {e}")))?
}

fn internal(err: ConfigError) -> (StatusCode, String) {
    warn!("store operation failed: {err}");
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

/// GET /config/:document
async fn show_document(
    State(state): State<AppState>,
    Path(document): Path<String>,
    Query(params): Query<ShowParams>,
) -> ApiResult {
    let key = key_for(&state, &document)?;
    let text = with_store(&state, move |store| store.read(&key))
        .await
        .map_err(internal)?
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("{document} not stored")))?;

    let body = match (params.pretty, parse(&text)) {
        (true, Ok(doc)) => serialize_pretty(&doc),
        _ => text,
    };
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// PUT /config/:document
async fn replace_document(
    State(state): State<AppState>,
    Path(document): Path<String>,
    body: Bytes,
) -> ApiResult {
    if document != "bootstrap" {
        return Err((
            StatusCode::METHOD_NOT_ALLOWED,
            "only the bootstrap document can be replaced".to_string(),
        ));
    }
    if body.len() > MAX_BOOTSTRAP_BYTES {
        return Err((StatusCode::PAYLOAD_TOO_LARGE, "Too large".to_string()));
    }

    let text = std::str::from_utf8(&body)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("body is not UTF-8: {e}")))?;
    let doc = parse_object(text).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let canonical = serialize(&doc);

    let key = state.keys.bootstrap.clone();
    let bytes = canonical.len();
    with_store(&state, move |store| store.write(&key, &canonical))
        .await
        .map_err(internal)?;

    info!(bytes, "bootstrap document replaced");
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// DELETE /config/:document
async fn delete_document(State(state): State<AppState>, Path(document): Path<String>) -> ApiResult {
    let key = key_for(&state, &document)?;
    with_store(&state, move |store| store.delete(&key))
        .await
        .map_err(internal)?;

    info!(document = %document, "stored document deleted");
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// POST /config/reconcile
///
/// A full queue means a run is already pending, which will see the same
/// remote state, so the request is still accepted.
async fn trigger_reconcile(State(state): State<AppState>) -> StatusCode {
    match state.trigger.try_send(TriggerSource::Admin) {
        Ok(()) => StatusCode::ACCEPTED,
        Err(TrySendError::Full(_)) => StatusCode::ACCEPTED,
        Err(TrySendError::Closed(_)) => {
            warn!("reconcile requested but the scheduler is not running");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

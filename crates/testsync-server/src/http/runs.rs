//! `POST /runs/{id}` and `GET /runs/{id}`.

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use testsync_core::{SessionId, SyncError};
use tracing::{debug, info, instrument};

use crate::error::ApiError;
use crate::server::AppState;

/// Store the initial payload for a session. Echoes the stored body.
#[instrument(skip_all, fields(session_id = %raw_id))]
pub async fn create_run(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    body: Body,
) -> Result<Bytes, ApiError> {
    let id = SessionId::parse_path(&raw_id)?;
    if state.registry.get(id).is_ok() {
        return Err(SyncError::Conflict(id).into());
    }

    let payload = axum::body::to_bytes(body, state.config.max_body_bytes)
        .await
        .map_err(|e| {
            debug!(error = %e, "could not read body");
            ApiError::new(StatusCode::BAD_REQUEST, "Request data too large")
        })?;
    if payload.is_empty() {
        debug!("received request with no body");
        return Err(SyncError::BadRequest("Request requires body data".into()).into());
    }

    let _ = state.registry.create(id, payload.clone())?;
    Ok(payload)
}

/// Return the current payload of a session.
#[instrument(skip_all, fields(session_id = %raw_id))]
pub async fn read_run(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Bytes, ApiError> {
    let id = SessionId::parse_path(&raw_id)?;
    let session = state.registry.get(id).inspect_err(|_| {
        debug!("data not found for session");
    })?;
    info!("reading data for session");
    Ok(session.payload())
}

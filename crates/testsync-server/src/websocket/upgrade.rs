use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::Response;
use testsync_core::SessionId;
use tokio::sync::mpsc;
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::server::AppState;
use crate::websocket::connection::run_connection;

/// `GET /register/{id}`.
///
/// The session is resolved and the connection handle appended before the
/// handshake response goes out, so a client whose handshake has completed is
/// already counted.
#[instrument(skip_all, fields(session_id = %raw_id))]
pub async fn register(
    Path(raw_id): Path<String>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let id = SessionId::parse_path(&raw_id)?;
    let session = state.registry.resolve(id, state.config.attach_policy)?;

    let (tx, rx) = mpsc::channel(state.config.send_queue_capacity);
    let handle = session.attach(tx);
    info!(connection = %handle.index(), "connection attached");

    let dispatcher = state.dispatcher.clone();
    let shutdown = state.shutdown.clone();
    Ok(ws
        .max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| {
            run_connection(socket, session, handle, rx, dispatcher, shutdown)
        }))
}

//! Per-connection read loop and writer task.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use testsync_core::wire::Frame;
use testsync_engine::{ConnectionHandle, Dispatcher, Session};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Drive one bound connection until the peer leaves or the server stops.
///
/// The handle stays in the session afterwards. Once this returns its queue
/// receiver is gone, so later sends to the index fail with `Closed`.
#[instrument(skip_all, fields(session_id = %session.id(), connection = %handle.index()))]
pub async fn run_connection(
    socket: WebSocket,
    session: Arc<Session>,
    handle: Arc<ConnectionHandle>,
    mut outbound: mpsc::Receiver<Frame>,
    dispatcher: Dispatcher,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let done = CancellationToken::new();

    let writer_done = done.clone();
    let writer = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                () = writer_done.cancelled() => break,
                frame = outbound.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };
            let message = match frame {
                Frame::Text(text) => Message::Text(text.into()),
                Frame::Binary(data) => Message::Binary(data),
            };
            if let Err(e) = ws_tx.send(message).await {
                debug!(error = %e, "write failed, stopping writer");
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let index = handle.index();
    loop {
        let next = tokio::select! {
            () = shutdown.cancelled() => {
                debug!("server shutting down, closing connection");
                break;
            }
            next = ws_rx.next() => next,
        };

        let result = match next {
            Some(Ok(Message::Text(text))) => {
                dispatcher.dispatch(&session, index, text.as_str().as_bytes())
            }
            Some(Ok(Message::Binary(data))) => dispatcher.dispatch(&session, index, &data),
            Some(Ok(Message::Close(_))) | None => {
                info!("connection closed");
                break;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                error!(error = %e, "error reading from connection");
                break;
            }
        };

        if let Err(e) = result {
            warn!(error = %e, kind = e.error_kind(), "could not process message");
        }
    }

    done.cancel();
    let _ = writer.await;
    debug!(
        dropped_frames = handle.drop_count(),
        lifetime_ms = handle.age().as_millis() as u64,
        "connection finished"
    );
}

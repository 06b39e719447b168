//! Outbound side of one attached WebSocket connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use testsync_core::wire::Frame;
use testsync_core::{ConnectionIndex, SendError};
use tokio::sync::mpsc;

/// Handle stored in a session's connection list.
///
/// Frames are pushed onto a bounded queue that the connection's writer task
/// drains into the socket. Once the writer goes away the queue is closed and
/// every later send fails with [`SendError::Closed`].
pub struct ConnectionHandle {
    index: ConnectionIndex,
    tx: mpsc::Sender<Frame>,
    connected_at: Instant,
    dropped_frames: AtomicU64,
}

impl ConnectionHandle {
    pub fn new(index: ConnectionIndex, tx: mpsc::Sender<Frame>) -> Self {
        Self {
            index,
            tx,
            connected_at: Instant::now(),
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Permanent position of this connection in its session.
    pub fn index(&self) -> ConnectionIndex {
        self.index
    }

    /// Queue a frame without waiting.
    pub fn send(&self, frame: Frame) -> Result<(), SendError> {
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                let _ = self.dropped_frames.fetch_add(1, Ordering::Relaxed);
                Err(SendError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                let _ = self.dropped_frames.fetch_add(1, Ordering::Relaxed);
                Err(SendError::Closed)
            }
        }
    }

    /// Frames that could not be queued.
    pub fn drop_count(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

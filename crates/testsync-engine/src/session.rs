use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use testsync_core::wire::Frame;
use testsync_core::{ConnectionIndex, SendError, SessionId};
use tokio::sync::mpsc;

use crate::checkpoint::Checkpoint;
use crate::connection::ConnectionHandle;

/// One test run: its shared payload, attached connections and checkpoints.
pub struct Session {
    id: SessionId,
    created_at: DateTime<Utc>,
    payload: RwLock<Bytes>,
    connections: RwLock<Vec<Arc<ConnectionHandle>>>,
    checkpoints: DashMap<String, Arc<Checkpoint>>,
}

impl Session {
    pub fn new(id: SessionId, payload: Bytes) -> Self {
        Self::with_created_at(id, payload, Utc::now())
    }

    /// Session with no payload, created when a connection registers first.
    pub fn placeholder(id: SessionId) -> Self {
        Self::new(id, Bytes::new())
    }

    pub fn with_created_at(id: SessionId, payload: Bytes, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at,
            payload: RwLock::new(payload),
            connections: RwLock::new(Vec::new()),
            checkpoints: DashMap::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn payload(&self) -> Bytes {
        self.payload.read().clone()
    }

    /// Replace the payload wholesale. Last writer wins.
    pub fn set_payload(&self, payload: Bytes) {
        *self.payload.write() = payload;
    }

    /// Append a connection and return its handle. The index is the length of
    /// the list before the append and is never reused.
    pub fn attach(&self, tx: mpsc::Sender<Frame>) -> Arc<ConnectionHandle> {
        let mut connections = self.connections.write();
        let handle = Arc::new(ConnectionHandle::new(ConnectionIndex::new(connections.len()), tx));
        connections.push(Arc::clone(&handle));
        handle
    }

    pub fn connection(&self, index: ConnectionIndex) -> Option<Arc<ConnectionHandle>> {
        self.connections.read().get(index.get()).cloned()
    }

    /// Number of connections ever attached, including disconnected ones.
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    pub fn send_to(&self, index: ConnectionIndex, frame: Frame) -> Result<(), SendError> {
        self.connection(index)
            .ok_or(SendError::UnknownConnection(index.get()))?
            .send(frame)
    }

    /// Look up `name`, creating it with `target_count` if this is the first
    /// reference. Returns the checkpoint and whether it was created here.
    pub fn checkpoint(&self, name: &str, target_count: u32) -> (Arc<Checkpoint>, bool) {
        if let Some(existing) = self.checkpoints.get(name) {
            return (Arc::clone(existing.value()), false);
        }
        let mut created = false;
        let entry = self
            .checkpoints
            .entry(name.to_string())
            .or_insert_with(|| {
                created = true;
                Arc::new(Checkpoint::new(name, target_count))
            });
        (Arc::clone(entry.value()), created)
    }

    pub fn find_checkpoint(&self, name: &str) -> Option<Arc<Checkpoint>> {
        self.checkpoints.get(name).map(|cp| Arc::clone(cp.value()))
    }

    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints.len()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("connections", &self.connection_count())
            .field("checkpoints", &self.checkpoint_count())
            .finish_non_exhaustive()
    }
}

//! Process-wide session store.
//!
//! Inserts, removals and sweep iteration all go through the one lock around
//! the map. Reading or mutating a session's own fields never touches it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use testsync_core::{AttachPolicy, SessionId, SyncError};
use tracing::{debug, info};

use crate::session::Session;

/// Default age after which a session is evicted.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(12 * 60 * 60);

pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    retention: Duration,
}

impl SessionRegistry {
    pub fn new(retention: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            retention,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Store the initial payload for `id`. Fails if the id already exists,
    /// leaving the stored payload untouched.
    pub fn create(&self, id: SessionId, payload: Bytes) -> Result<Arc<Session>, SyncError> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&id) {
            return Err(SyncError::Conflict(id));
        }
        let session = Arc::new(Session::new(id, payload));
        let _ = sessions.insert(id, Arc::clone(&session));
        info!(session_id = %id, "set data for session");
        Ok(session)
    }

    pub fn get(&self, id: SessionId) -> Result<Arc<Session>, SyncError> {
        self.sessions
            .read()
            .get(&id)
            .cloned()
            .ok_or(SyncError::NotFound(id))
    }

    /// Return the session for `id`, inserting an empty placeholder if absent.
    pub fn get_or_create(&self, id: SessionId) -> Arc<Session> {
        if let Some(existing) = self.sessions.read().get(&id) {
            return Arc::clone(existing);
        }
        let mut sessions = self.sessions.write();
        Arc::clone(sessions.entry(id).or_insert_with(|| {
            debug!(session_id = %id, "received connection on unknown session, creating");
            Arc::new(Session::placeholder(id))
        }))
    }

    /// Resolve the session a new connection should attach to.
    pub fn resolve(&self, id: SessionId, policy: AttachPolicy) -> Result<Arc<Session>, SyncError> {
        match policy {
            AttachPolicy::Create => Ok(self.get_or_create(id)),
            AttachPolicy::Reject => self.get(id),
        }
    }

    /// Remove every session created before `now - retention`.
    ///
    /// A retention reaching past the earliest representable instant evicts
    /// nothing.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(self.retention)
            .ok()
            .and_then(|retention| now.checked_sub_signed(retention))
        else {
            return 0;
        };

        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|id, session| {
            let keep = session.created_at() >= cutoff;
            if !keep {
                debug!(
                    session_id = %id,
                    created_at = %session.created_at(),
                    "evicting session"
                );
            }
            keep
        });
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    #[cfg(test)]
    fn insert_at(&self, id: SessionId, created_at: DateTime<Utc>) {
        let _ = self
            .sessions
            .write()
            .insert(id, Arc::new(Session::with_created_at(id, Bytes::new(), created_at)));
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

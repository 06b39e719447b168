//! Named barrier within a session.
//!
//! All arrivals for one checkpoint pass through a single mutex, so the
//! arrival that satisfies the target is observed by exactly one caller and
//! the release set is fixed at that moment.

use parking_lot::Mutex;
use testsync_core::ConnectionIndex;

/// Outcome of recording one arrival.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Arrival {
    /// Recorded; still waiting for more arrivals.
    Waiting { arrived: usize, target: u32 },
    /// This connection had already arrived; nothing changed.
    Duplicate,
    /// This arrival satisfied the target. Every listed connection (in
    /// arrival order) must be notified.
    Released(Vec<ConnectionIndex>),
    /// The checkpoint finished earlier; the caller must be notified on its own.
    AlreadyFinished,
}

#[derive(Debug, Default)]
struct CheckpointState {
    arrived: Vec<ConnectionIndex>,
    finished: bool,
}

#[derive(Debug)]
pub struct Checkpoint {
    name: String,
    target_count: u32,
    state: Mutex<CheckpointState>,
}

impl Checkpoint {
    pub fn new(name: impl Into<String>, target_count: u32) -> Self {
        Self {
            name: name.into(),
            target_count,
            state: Mutex::new(CheckpointState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arrivals required to release, fixed by whoever created the checkpoint.
    pub fn target_count(&self) -> u32 {
        self.target_count
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    /// Snapshot of arrived connection indices in arrival order.
    pub fn arrived(&self) -> Vec<ConnectionIndex> {
        self.state.lock().arrived.clone()
    }

    /// Record `index` as arrived and evaluate the barrier.
    pub fn arrive(&self, index: ConnectionIndex) -> Arrival {
        let mut state = self.state.lock();

        if state.finished {
            return Arrival::AlreadyFinished;
        }
        if state.arrived.contains(&index) {
            return Arrival::Duplicate;
        }

        state.arrived.push(index);

        if state.arrived.len() >= self.target_count as usize {
            state.finished = true;
            Arrival::Released(state.arrived.clone())
        } else {
            Arrival::Waiting {
                arrived: state.arrived.len(),
                target: self.target_count,
            }
        }
    }
}

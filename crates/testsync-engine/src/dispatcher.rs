//! Interprets inbound WebSocket frames for one session.

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use testsync_core::wire::{
    self, CheckpointArrival, CheckpointStatus, Command, ConnectionCount, Envelope, Frame,
};
use testsync_core::{ConnectionIndex, SyncError};
use tracing::{debug, info, warn};

use crate::checkpoint::{Arrival, Checkpoint};
use crate::session::Session;

/// Default gap between a checkpoint release and the advertised resume time.
pub const DEFAULT_RESUME_DELAY: Duration = Duration::from_secs(1);

#[derive(Clone, Debug)]
pub struct Dispatcher {
    resume_delay: Duration,
}

impl Dispatcher {
    pub fn new(resume_delay: Duration) -> Self {
        Self { resume_delay }
    }

    /// Handle one raw frame from connection `index` of `session`.
    ///
    /// Errors are per-command: the caller logs them and keeps reading.
    /// Failures to deliver a reply are logged here and are not errors.
    pub fn dispatch(
        &self,
        session: &Session,
        index: ConnectionIndex,
        raw: &[u8],
    ) -> Result<(), SyncError> {
        let envelope = Envelope::decode(raw)?;
        let command = Command::parse(&envelope.command)?;
        debug!(
            session_id = %session.id(),
            connection = %index,
            command = command.as_str(),
            "dispatching"
        );

        match command {
            Command::ReadData => {
                reply(session, index, Frame::from_payload(session.payload()));
                Ok(())
            }
            Command::UpdateData => {
                let content = envelope
                    .content_bytes()
                    .ok_or_else(|| SyncError::Decode("update_data requires content".into()))?;
                session.set_payload(Bytes::copy_from_slice(content));
                Ok(())
            }
            Command::GetConnectionCount => {
                let count = ConnectionCount {
                    count: session.connection_count(),
                };
                let text = wire::encode(Command::GetConnectionCount, &count)?;
                reply(session, index, Frame::Text(text));
                Ok(())
            }
            Command::WaitCheckpoint => {
                let arrival: CheckpointArrival = envelope.content_as()?;
                self.wait_checkpoint(session, index, &arrival)
            }
        }
    }

    fn wait_checkpoint(
        &self,
        session: &Session,
        index: ConnectionIndex,
        arrival: &CheckpointArrival,
    ) -> Result<(), SyncError> {
        let (checkpoint, created) = session.checkpoint(&arrival.identifier, arrival.target_count);
        if created {
            info!(
                session_id = %session.id(),
                checkpoint = checkpoint.name(),
                target = checkpoint.target_count(),
                "creating new checkpoint"
            );
        } else if checkpoint.target_count() != arrival.target_count {
            debug!(
                session_id = %session.id(),
                checkpoint = checkpoint.name(),
                kept = checkpoint.target_count(),
                ignored = arrival.target_count,
                "checkpoint target already set, ignoring new value"
            );
        }

        match checkpoint.arrive(index) {
            Arrival::Waiting { arrived, target } => {
                debug!(
                    session_id = %session.id(),
                    checkpoint = checkpoint.name(),
                    connection = %index,
                    arrived,
                    target,
                    "arrived at checkpoint"
                );
                Ok(())
            }
            Arrival::Duplicate => {
                debug!(
                    session_id = %session.id(),
                    checkpoint = checkpoint.name(),
                    connection = %index,
                    "connection already arrived at checkpoint"
                );
                Ok(())
            }
            Arrival::AlreadyFinished => {
                let text = self.status_message(&checkpoint)?;
                reply(session, index, Frame::Text(text));
                Ok(())
            }
            Arrival::Released(released) => {
                info!(
                    session_id = %session.id(),
                    checkpoint = checkpoint.name(),
                    released = released.len(),
                    "checkpoint finished"
                );
                let text = self.status_message(&checkpoint)?;
                for target in released {
                    if let Err(e) = session.send_to(target, Frame::Text(text.clone())) {
                        warn!(
                            session_id = %session.id(),
                            checkpoint = checkpoint.name(),
                            connection = %target,
                            error = %e,
                            "could not broadcast checkpoint status"
                        );
                    }
                }
                Ok(())
            }
        }
    }

    fn status_message(&self, checkpoint: &Checkpoint) -> Result<String, SyncError> {
        let status = CheckpointStatus {
            identifier: checkpoint.name().to_string(),
            finished: true,
            start_at: self.resume_at(Utc::now()).timestamp_millis(),
        };
        wire::encode(Command::WaitCheckpoint, &status)
    }

    /// `now` plus the resume delay, saturating at the latest representable
    /// instant.
    fn resume_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.resume_delay)
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_RESUME_DELAY)
    }
}

fn reply(session: &Session, index: ConnectionIndex, frame: Frame) {
    if let Err(e) = session.send_to(index, frame) {
        warn!(
            session_id = %session.id(),
            connection = %index,
            error = %e,
            "could not send reply"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use testsync_core::SessionId;
    use tokio::sync::mpsc;

    struct Peer {
        index: ConnectionIndex,
        rx: mpsc::Receiver<Frame>,
    }

    impl Peer {
        fn next_json(&mut self) -> Value {
            match self.rx.try_recv().expect("expected a frame") {
                Frame::Text(t) => serde_json::from_str(&t).unwrap(),
                Frame::Binary(_) => panic!("expected text frame"),
            }
        }

        fn next_text(&mut self) -> String {
            match self.rx.try_recv().expect("expected a frame") {
                Frame::Text(t) => t,
                Frame::Binary(_) => panic!("expected text frame"),
            }
        }

        fn is_idle(&mut self) -> bool {
            self.rx.try_recv().is_err()
        }
    }

    fn attach(session: &Session) -> Peer {
        let (tx, rx) = mpsc::channel(16);
        let handle = session.attach(tx);
        Peer {
            index: handle.index(),
            rx,
        }
    }

    fn send(
        dispatcher: &Dispatcher,
        session: &Session,
        peer: &Peer,
        msg: Value,
    ) -> Result<(), SyncError> {
        dispatcher.dispatch(session, peer.index, msg.to_string().as_bytes())
    }

    fn wait(name: &str, target: u32) -> Value {
        json!({
            "command": "wait_checkpoint",
            "content": {"identifier": name, "target_count": target}
        })
    }

    #[test]
    fn read_and_update_data() {
        let session = Session::new(SessionId::new(42), Bytes::from_static(b"\"abc\""));
        let dispatcher = Dispatcher::default();
        let mut peer = attach(&session);

        send(&dispatcher, &session, &peer, json!({"command": "read_data"})).unwrap();
        assert_eq!(peer.next_text(), "\"abc\"");

        let update = json!({"command": "update_data", "content": "xyz"});
        send(&dispatcher, &session, &peer, update).unwrap();
        assert!(peer.is_idle());

        send(&dispatcher, &session, &peer, json!({"command": "read_data"})).unwrap();
        assert_eq!(peer.next_text(), "\"xyz\"");
    }

    #[test]
    fn update_with_null_content_stores_null() {
        let session = Session::new(SessionId::new(3), Bytes::from_static(b"\"old\""));
        let dispatcher = Dispatcher::default();
        let mut peer = attach(&session);

        let update = json!({"command": "update_data", "content": null});
        send(&dispatcher, &session, &peer, update).unwrap();
        assert_eq!(session.payload(), Bytes::from_static(b"null"));

        send(&dispatcher, &session, &peer, json!({"command": "read_data"})).unwrap();
        assert_eq!(peer.next_text(), "null");
    }

    #[test]
    fn repeated_reads_do_not_mutate() {
        let session = Session::new(SessionId::new(1), Bytes::from_static(b"{\"k\":1}"));
        let dispatcher = Dispatcher::default();
        let mut peer = attach(&session);
        for _ in 0..5 {
            send(&dispatcher, &session, &peer, json!({"command": "read_data"})).unwrap();
            assert_eq!(peer.next_text(), "{\"k\":1}");
        }
        assert_eq!(session.payload(), Bytes::from_static(b"{\"k\":1}"));
    }

    #[test]
    fn update_without_content_is_decode_error() {
        let session = Session::new(SessionId::new(1), Bytes::from_static(b"keep"));
        let dispatcher = Dispatcher::default();
        let peer = attach(&session);
        let err =
            send(&dispatcher, &session, &peer, json!({"command": "update_data"})).unwrap_err();
        assert!(matches!(err, SyncError::Decode(_)));
        assert_eq!(session.payload(), Bytes::from_static(b"keep"));
    }

    #[test]
    fn connection_count_includes_every_attach() {
        let session = Session::placeholder(SessionId::new(1));
        let dispatcher = Dispatcher::default();
        let mut first = attach(&session);
        let second = attach(&session);
        let _third = attach(&session);

        send(&dispatcher, &session, &first, json!({"command": "get_connection_count"})).unwrap();
        let reply = first.next_json();
        assert_eq!(reply["command"], "get_connection_count");
        assert_eq!(reply["content"]["count"], 3);

        drop(second);
        let _fourth = attach(&session);
        send(&dispatcher, &session, &first, json!({"command": "get_connection_count"})).unwrap();
        assert_eq!(first.next_json()["content"]["count"], 4);
    }

    #[test]
    fn unknown_command_is_reported() {
        let session = Session::placeholder(SessionId::new(1));
        let dispatcher = Dispatcher::default();
        let mut peer = attach(&session);
        let err =
            send(&dispatcher, &session, &peer, json!({"command": "force_end_test"})).unwrap_err();
        assert_eq!(err, SyncError::UnknownCommand("force_end_test".into()));
        assert!(peer.is_idle());
    }

    #[test]
    fn malformed_frame_is_decode_error() {
        let session = Session::placeholder(SessionId::new(1));
        let dispatcher = Dispatcher::default();
        let peer = attach(&session);
        let err = dispatcher.dispatch(&session, peer.index, b"{not json").unwrap_err();
        assert!(matches!(err, SyncError::Decode(_)));

        let bad_arrival = json!({"command": "wait_checkpoint", "content": {"identifier": 5}});
        let err = send(&dispatcher, &session, &peer, bad_arrival).unwrap_err();
        assert!(matches!(err, SyncError::Decode(_)));
        assert_eq!(session.checkpoint_count(), 0);
    }

    #[test]
    fn three_way_checkpoint_then_late_arrival() {
        let session = Session::placeholder(SessionId::new(7));
        let dispatcher = Dispatcher::new(Duration::from_millis(500));
        let mut peers: Vec<Peer> = (0..3).map(|_| attach(&session)).collect();

        send(&dispatcher, &session, &peers[0], wait("sync", 3)).unwrap();
        send(&dispatcher, &session, &peers[1], wait("sync", 3)).unwrap();
        assert!(peers.iter_mut().all(|p| p.is_idle()));

        let before = Utc::now().timestamp_millis();
        send(&dispatcher, &session, &peers[2], wait("sync", 3)).unwrap();
        for peer in &mut peers {
            let msg = peer.next_json();
            assert_eq!(msg["command"], "wait_checkpoint");
            assert_eq!(msg["content"]["identifier"], "sync");
            assert_eq!(msg["content"]["finished"], true);
            assert!(msg["content"]["start_at"].as_i64().unwrap() >= before + 500);
            assert!(peer.is_idle());
        }

        let mut late = attach(&session);
        send(&dispatcher, &session, &late, wait("sync", 3)).unwrap();
        assert_eq!(late.next_json()["content"]["finished"], true);
        assert!(peers.iter_mut().all(|p| p.is_idle()));

        let checkpoint = session.find_checkpoint("sync").unwrap();
        assert_eq!(checkpoint.arrived().len(), 3);
    }

    #[test]
    fn huge_resume_delay_saturates_start_time() {
        let session = Session::placeholder(SessionId::new(7));
        let dispatcher = Dispatcher::new(Duration::from_millis(9_000_000_000_000_000));
        let mut peer = attach(&session);

        send(&dispatcher, &session, &peer, wait("x", 1)).unwrap();
        let msg = peer.next_json();
        assert_eq!(msg["content"]["finished"], true);
        assert_eq!(
            msg["content"]["start_at"].as_i64().unwrap(),
            DateTime::<Utc>::MAX_UTC.timestamp_millis()
        );
    }

    #[test]
    fn resume_at_adds_delay() {
        let dispatcher = Dispatcher::new(Duration::from_millis(1500));
        let now = Utc::now();
        assert_eq!(dispatcher.resume_at(now) - now, chrono::Duration::milliseconds(1500));
    }

    #[test]
    fn first_target_count_wins() {
        let session = Session::placeholder(SessionId::new(7));
        let dispatcher = Dispatcher::default();
        let mut a = attach(&session);
        let mut b = attach(&session);

        send(&dispatcher, &session, &a, wait("gate", 2)).unwrap();
        // A later caller asking for 1 must not release the barrier early.
        send(&dispatcher, &session, &b, wait("gate", 1)).unwrap();
        assert_eq!(session.find_checkpoint("gate").unwrap().target_count(), 2);
        assert_eq!(a.next_json()["content"]["finished"], true);
        assert_eq!(b.next_json()["content"]["finished"], true);
    }

    #[test]
    fn repeated_wait_from_same_connection_is_idempotent() {
        let session = Session::placeholder(SessionId::new(7));
        let dispatcher = Dispatcher::default();
        let mut a = attach(&session);
        let mut b = attach(&session);

        send(&dispatcher, &session, &a, wait("pair", 2)).unwrap();
        send(&dispatcher, &session, &a, wait("pair", 2)).unwrap();
        assert!(a.is_idle());
        assert!(!session.find_checkpoint("pair").unwrap().is_finished());

        send(&dispatcher, &session, &b, wait("pair", 2)).unwrap();
        assert_eq!(a.next_json()["content"]["finished"], true);
        assert_eq!(b.next_json()["content"]["finished"], true);
        assert!(a.is_idle());
    }

    #[test]
    fn broadcast_survives_disconnected_peer() {
        let session = Session::placeholder(SessionId::new(7));
        let dispatcher = Dispatcher::default();
        let gone = attach(&session);
        let mut stays = attach(&session);

        send(&dispatcher, &session, &gone, wait("sync", 2)).unwrap();
        let gone_index = gone.index;
        drop(gone);

        send(&dispatcher, &session, &stays, wait("sync", 2)).unwrap();
        assert_eq!(stays.next_json()["content"]["finished"], true);

        let checkpoint = session.find_checkpoint("sync").unwrap();
        assert!(checkpoint.is_finished());
        assert!(checkpoint.arrived().contains(&gone_index));
    }

    #[test]
    fn checkpoints_are_independent() {
        let session = Session::placeholder(SessionId::new(7));
        let dispatcher = Dispatcher::default();
        let mut a = attach(&session);
        let b = attach(&session);

        send(&dispatcher, &session, &a, wait("one", 1)).unwrap();
        send(&dispatcher, &session, &b, wait("two", 2)).unwrap();
        assert_eq!(a.next_json()["content"]["identifier"], "one");
        assert!(!session.find_checkpoint("two").unwrap().is_finished());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_arrivals_notify_everyone_once() {
        let session = std::sync::Arc::new(Session::placeholder(SessionId::new(9)));
        let dispatcher = Dispatcher::default();
        let mut peers: Vec<Peer> = (0..32).map(|_| attach(&session)).collect();

        let tasks: Vec<_> = peers
            .iter()
            .map(|peer| {
                let session = std::sync::Arc::clone(&session);
                let dispatcher = dispatcher.clone();
                let index = peer.index;
                tokio::spawn(async move {
                    let msg = wait("swarm", 32).to_string();
                    dispatcher.dispatch(&session, index, msg.as_bytes())
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        for peer in &mut peers {
            assert_eq!(peer.next_json()["content"]["finished"], true);
            assert!(peer.is_idle());
        }
    }
}

//! The snapshot capture collaborator.
//!
//! The manager arbitrates snapshot work for an actor: at most one capture is
//! in flight at a time, and a capture request made while one is running is
//! refused rather than queued. Refusal is load shedding, not failure —
//! callers retry at their next opportunity.
//!
//! The handle is cheap to clone and internally synchronized: the capture
//! subsystem completes work from its own thread while the actor thread
//! requests and inspects.

use std::collections::VecDeque;
use std::sync::Arc;

use lodestone_types::{EntryMeta, Snapshot};
use parking_lot::Mutex;
use tracing::debug;

/// Message asking the snapshot subsystem to install an out-of-band snapshot,
/// bypassing the journal (e.g. an operator-supplied restore).
#[derive(Debug, Clone, PartialEq)]
pub struct ApplySnapshot {
    /// The snapshot to install.
    pub snapshot: Snapshot,
}

/// An accepted capture request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Log position the capture covers.
    pub last_applied: EntryMeta,
    /// Index replicated to all followers, or `-1` when unknown (trimming
    /// is then left to the capture subsystem).
    pub replicated_to_all_index: i64,
}

#[derive(Debug, Default)]
struct Inner {
    in_flight: Option<CaptureRequest>,
    last_capture: Option<CaptureRequest>,
    accepted_captures: u64,
    pending_applies: VecDeque<ApplySnapshot>,
}

/// Cloneable handle to an actor's snapshot capture state.
#[derive(Debug, Clone, Default)]
pub struct SnapshotManager {
    inner: Arc<Mutex<Inner>>,
}

impl SnapshotManager {
    /// Creates an idle manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a capture is in flight.
    pub fn is_capturing(&self) -> bool {
        self.inner.lock().in_flight.is_some()
    }

    /// Requests a snapshot capture at `last_applied`.
    ///
    /// Returns `true` when the request is accepted and capture work begins;
    /// `false` when a capture is already in flight. Refusal is not an error.
    pub fn capture(&self, last_applied: EntryMeta, replicated_to_all_index: i64) -> bool {
        let mut inner = self.inner.lock();
        if inner.in_flight.is_some() {
            debug!(%last_applied, "capture refused: capture already in flight");
            return false;
        }
        let request = CaptureRequest { last_applied, replicated_to_all_index };
        inner.in_flight = Some(request);
        inner.last_capture = Some(request);
        inner.accepted_captures += 1;
        true
    }

    /// Marks the in-flight capture finished, returning its request. Called
    /// by the capture subsystem when its work (or abort) completes.
    pub fn complete_capture(&self) -> Option<CaptureRequest> {
        self.inner.lock().in_flight.take()
    }

    /// The most recently accepted capture request.
    pub fn last_capture(&self) -> Option<CaptureRequest> {
        self.inner.lock().last_capture
    }

    /// Number of capture requests accepted over the manager's lifetime.
    pub fn accepted_captures(&self) -> u64 {
        self.inner.lock().accepted_captures
    }

    /// Queues an out-of-band snapshot for installation.
    pub fn apply(&self, apply: ApplySnapshot) {
        self.inner.lock().pending_applies.push_back(apply);
    }

    /// Dequeues the next snapshot awaiting installation. Drained by the
    /// snapshot subsystem.
    pub fn take_applied(&self) -> Option<ApplySnapshot> {
        self.inner.lock().pending_applies.pop_front()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use lodestone_types::{SnapshotState, TermInfo};

    use super::*;

    #[test]
    fn capture_accepts_when_idle() {
        let manager = SnapshotManager::new();
        assert!(!manager.is_capturing());
        assert!(manager.capture(EntryMeta::new(5, 2), -1));
        assert!(manager.is_capturing());
        assert_eq!(manager.accepted_captures(), 1);
        assert_eq!(
            manager.last_capture().unwrap(),
            CaptureRequest { last_applied: EntryMeta::new(5, 2), replicated_to_all_index: -1 }
        );
    }

    #[test]
    fn capture_refuses_while_in_flight() {
        let manager = SnapshotManager::new();
        assert!(manager.capture(EntryMeta::new(5, 2), -1));
        assert!(!manager.capture(EntryMeta::new(6, 2), -1));
        assert_eq!(manager.accepted_captures(), 1);
        // The refused request does not overwrite the in-flight one.
        assert_eq!(manager.last_capture().unwrap().last_applied, EntryMeta::new(5, 2));
    }

    #[test]
    fn complete_capture_returns_to_idle() {
        let manager = SnapshotManager::new();
        manager.capture(EntryMeta::new(5, 2), -1);
        let finished = manager.complete_capture().unwrap();
        assert_eq!(finished.last_applied, EntryMeta::new(5, 2));
        assert!(!manager.is_capturing());
        assert!(manager.capture(EntryMeta::new(9, 3), -1));
    }

    #[test]
    fn apply_queues_in_order() {
        let manager = SnapshotManager::new();
        let first = ApplySnapshot {
            snapshot: Snapshot::empty(TermInfo::new(1, None), None),
        };
        let second = ApplySnapshot {
            snapshot: Snapshot::builder()
                .state(SnapshotState::data(b"state".to_vec()))
                .term_info(TermInfo::new(2, None))
                .build(),
        };
        manager.apply(first.clone());
        manager.apply(second.clone());
        assert_eq!(manager.take_applied().unwrap(), first);
        assert_eq!(manager.take_applied().unwrap(), second);
        assert!(manager.take_applied().is_none());
    }

    #[test]
    fn clones_share_state() {
        let manager = SnapshotManager::new();
        let clone = manager.clone();
        assert!(manager.capture(EntryMeta::new(1, 1), -1));
        assert!(clone.is_capturing());
        clone.complete_capture();
        assert!(!manager.is_capturing());
    }
}

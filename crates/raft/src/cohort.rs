//! The application-side seam for recovery.

use lodestone_types::{Payload, Snapshot, SnapshotState};

use crate::error::BoxedError;

/// Application-side consumer of recovered state.
///
/// During replay the driver delivers payloads in well-formed batches:
/// `start_log_recovery_batch` then up to `max_batch_size` calls to
/// `append_recovered_log_entry` then exactly one
/// `apply_current_log_recovery_batch`, with no overlap across batches.
/// Membership payloads never reach the cohort; they are consensus state.
///
/// Any error returned from a batch or snapshot method aborts recovery and is
/// fatal to the actor.
pub trait RecoveryCohort {
    /// Opens a new replay batch of at most `max_batch_size` payloads.
    fn start_log_recovery_batch(&mut self, max_batch_size: u32) -> Result<(), BoxedError>;

    /// Appends one recovered payload to the open batch.
    fn append_recovered_log_entry(&mut self, payload: &Payload) -> Result<(), BoxedError>;

    /// Applies the open batch to application state.
    fn apply_current_log_recovery_batch(&mut self) -> Result<(), BoxedError>;

    /// Replaces application state with a recovered snapshot. Called at most
    /// once per recovery, before any batch.
    fn apply_recovery_snapshot(&mut self, state: &SnapshotState) -> Result<(), BoxedError>;

    /// An operator-supplied snapshot to restore from when the persistence
    /// store turns out to be empty. Consulted once, at recovery completion.
    fn restore_from_snapshot(&self) -> Option<Snapshot>;
}

//! The seam to the persistence runtime's journal and snapshot store.

use lodestone_types::Snapshot;
use snafu::Snafu;

use crate::error::BoxedError;

/// Error from a persistence backend.
#[derive(Debug, Snafu)]
pub enum ProviderError {
    /// The backing store rejected or failed an operation.
    #[snafu(display("persistence backend failed during {operation}: {source}"))]
    Backend {
        /// The provider operation that failed.
        operation: &'static str,
        /// The backend's error.
        source: BoxedError,
    },
}

impl ProviderError {
    /// Wraps a backend error for `operation`.
    pub fn backend(operation: &'static str, source: impl Into<BoxedError>) -> Self {
        Self::Backend { operation, source: source.into() }
    }
}

/// Interface to the journal and snapshot store backing a Raft actor.
///
/// Implementations enqueue writes synchronously and complete them in the
/// background; recovery does not wait for durability.
pub trait PersistenceProvider {
    /// Whether persisted state is authoritative. False when persistence is
    /// configured off: replayed data is then evidence of stale storage and
    /// triggers cleanup at the end of recovery.
    fn is_recovery_applicable(&self) -> bool;

    /// Persists a snapshot to the snapshot store.
    fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), ProviderError>;

    /// Deletes journal entries up to and including `sequence_number`.
    fn delete_messages(&self, sequence_number: u64) -> Result<(), ProviderError>;

    /// Sequence number of the last journal entry.
    fn last_sequence_number(&self) -> u64;
}

//! An in-memory `PersistenceProvider` test double.

use parking_lot::Mutex;

use lodestone_raft::persistence::{PersistenceProvider, ProviderError};
use lodestone_types::Snapshot;

#[derive(Debug, Default)]
struct Inner {
    saved_snapshots: Vec<Snapshot>,
    deletions: Vec<u64>,
}

/// An in-memory journal/snapshot store recording what recovery asks of it.
#[derive(Debug)]
pub struct MemoryPersistence {
    recovery_applicable: bool,
    last_sequence_number: u64,
    fail_saves: bool,
    inner: Mutex<Inner>,
}

impl MemoryPersistence {
    /// Creates a provider with persistence enabled.
    pub fn new() -> Self {
        Self {
            recovery_applicable: true,
            last_sequence_number: 0,
            fail_saves: false,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Creates a provider with persistence configured off.
    pub fn disabled() -> Self {
        Self { recovery_applicable: false, ..Self::new() }
    }

    /// Sets the sequence number reported for the journal tail.
    pub fn with_last_sequence_number(mut self, sequence_number: u64) -> Self {
        self.last_sequence_number = sequence_number;
        self
    }

    /// Makes `save_snapshot` fail with a backend error.
    pub fn with_failing_saves(mut self) -> Self {
        self.fail_saves = true;
        self
    }

    /// Snapshots handed to `save_snapshot`, in order.
    pub fn saved_snapshots(&self) -> Vec<Snapshot> {
        self.inner.lock().saved_snapshots.clone()
    }

    /// Sequence numbers handed to `delete_messages`, in order.
    pub fn deletions(&self) -> Vec<u64> {
        self.inner.lock().deletions.clone()
    }
}

impl Default for MemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistenceProvider for MemoryPersistence {
    fn is_recovery_applicable(&self) -> bool {
        self.recovery_applicable
    }

    fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), ProviderError> {
        if self.fail_saves {
            return Err(ProviderError::backend(
                "save_snapshot",
                std::io::Error::other("injected snapshot store failure"),
            ));
        }
        self.inner.lock().saved_snapshots.push(snapshot.clone());
        Ok(())
    }

    fn delete_messages(&self, sequence_number: u64) -> Result<(), ProviderError> {
        self.inner.lock().deletions.push(sequence_number);
        Ok(())
    }

    fn last_sequence_number(&self) -> u64 {
        self.last_sequence_number
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use lodestone_types::TermInfo;

    use super::*;

    #[test]
    fn records_saves_and_deletions() {
        let provider = MemoryPersistence::new().with_last_sequence_number(7);
        assert!(provider.is_recovery_applicable());
        assert_eq!(provider.last_sequence_number(), 7);

        provider.save_snapshot(&Snapshot::empty(TermInfo::new(1, None), None)).unwrap();
        provider.delete_messages(7).unwrap();
        assert_eq!(provider.saved_snapshots().len(), 1);
        assert_eq!(provider.deletions(), vec![7]);
    }

    #[test]
    fn disabled_provider_reports_not_applicable() {
        assert!(!MemoryPersistence::disabled().is_recovery_applicable());
    }

    #[test]
    fn failing_saves_surface_backend_errors() {
        let provider = MemoryPersistence::new().with_failing_saves();
        let err =
            provider.save_snapshot(&Snapshot::empty(TermInfo::new(1, None), None)).unwrap_err();
        assert!(err.to_string().contains("save_snapshot"));
        assert!(provider.saved_snapshots().is_empty());
    }
}

//! The in-memory replicated log.
//!
//! The log holds the dense suffix of entries not yet covered by a snapshot,
//! anchored at `(snapshot_index, snapshot_term)`. Entries are contiguous
//! starting at `snapshot_index + 1`, so random access is offset arithmetic
//! into the backing `Vec`.

use lodestone_types::{EntryMeta, LogEntry, Snapshot};
use snafu::{Snafu, ensure};

/// Errors from replicated log mutation.
///
/// These indicate a programmer error or corrupted journal, not a recoverable
/// condition; callers propagate them.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LogError {
    /// An appended entry did not follow the last index.
    #[snafu(display("out-of-order append: entry index {index} does not follow last index {last_index}"))]
    OutOfOrder {
        /// Index of the rejected entry.
        index: i64,
        /// Last index in the log at the time of the append.
        last_index: i64,
    },

    /// A removal reached into the snapshot-covered prefix.
    #[snafu(display("cannot remove from index {index}: entries up to snapshot index {snapshot_index} are immutable"))]
    BeforeSnapshot {
        /// First index requested for removal.
        index: i64,
        /// The log's snapshot anchor.
        snapshot_index: i64,
    },
}

/// Append-only, truncatable, snapshot-anchored log of replicated entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicatedLog {
    snapshot_index: i64,
    snapshot_term: i64,
    entries: Vec<LogEntry>,
    data_size: u64,
}

impl ReplicatedLog {
    /// Creates an empty log with no snapshot anchor.
    pub fn new() -> Self {
        Self { snapshot_index: -1, snapshot_term: -1, entries: Vec::new(), data_size: 0 }
    }

    /// Creates a log seeded from a snapshot: anchored at the snapshot's last
    /// covered position and pre-populated with its unapplied entries.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let data_size = snapshot.unapplied_entries.iter().map(LogEntry::size).sum();
        Self {
            snapshot_index: snapshot.last_index,
            snapshot_term: snapshot.last_term,
            entries: snapshot.unapplied_entries.clone(),
            data_size,
        }
    }

    /// Appends an entry to the tail of the log.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::OutOfOrder`] unless `entry.index` is exactly
    /// `last_index() + 1`.
    pub fn append(&mut self, entry: LogEntry) -> Result<(), LogError> {
        let last_index = self.last_index();
        ensure!(entry.index == last_index + 1, OutOfOrderSnafu { index: entry.index, last_index });
        self.data_size += entry.size();
        self.entries.push(entry);
        Ok(())
    }

    /// Removes all entries with `index >= from`, returning how many were
    /// dropped. A `from` past the tail is an idempotent no-op.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::BeforeSnapshot`] when `from` reaches into the
    /// snapshot-covered prefix.
    pub fn remove_from(&mut self, from: i64) -> Result<u64, LogError> {
        ensure!(
            from > self.snapshot_index,
            BeforeSnapshotSnafu { index: from, snapshot_index: self.snapshot_index }
        );
        if from > self.last_index() {
            return Ok(0);
        }
        let offset = (from - self.snapshot_index - 1) as usize;
        let removed = self.entries.split_off(offset);
        self.data_size -= removed.iter().map(LogEntry::size).sum::<u64>();
        Ok(removed.len() as u64)
    }

    /// Returns the entry at `index`, or `None` when the index is outside the
    /// live range `(snapshot_index, last_index]`.
    pub fn get(&self, index: i64) -> Option<&LogEntry> {
        if index <= self.snapshot_index || index > self.last_index() {
            return None;
        }
        self.entries.get((index - self.snapshot_index - 1) as usize)
    }

    /// Number of live entries. Always `last_index() - snapshot_index()`.
    pub fn size(&self) -> u64 {
        self.entries.len() as u64
    }

    /// Cumulative payload weight of the live entries in bytes.
    pub fn data_size(&self) -> u64 {
        self.data_size
    }

    /// True when the log holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the last live entry, or the snapshot anchor when empty.
    pub fn last_index(&self) -> i64 {
        self.entries.last().map_or(self.snapshot_index, |entry| entry.index)
    }

    /// Term of the last live entry, or the snapshot term when empty.
    pub fn last_term(&self) -> i64 {
        self.entries.last().map_or(self.snapshot_term, |entry| entry.term)
    }

    /// Index of the last entry covered by the anchoring snapshot (`-1` if
    /// the log was never snapshotted).
    pub fn snapshot_index(&self) -> i64 {
        self.snapshot_index
    }

    /// Term of the last entry covered by the anchoring snapshot.
    pub fn snapshot_term(&self) -> i64 {
        self.snapshot_term
    }

    /// Position of the log's tail: the last live entry, the snapshot anchor
    /// when the log is empty, or `None` for a virgin log.
    pub fn last_meta(&self) -> Option<EntryMeta> {
        if let Some(entry) = self.entries.last() {
            return Some(entry.meta());
        }
        if self.snapshot_index == -1 {
            return None;
        }
        Some(EntryMeta::new(self.snapshot_index, self.snapshot_term))
    }
}

//! The persisted recovery event protocol.
//!
//! On restart the persistence runtime replays the journal as a sequence of
//! these events, always ending with [`RecoveryEvent::RecoveryCompleted`]:
//!
//! ```text
//! [SnapshotOffer?, (LogEntry | ApplyJournalEntries | DeleteEntries
//!                   | ServerConfig | UpdateElectionTerm)*, RecoveryCompleted]
//! ```
//!
//! Events deserialized from a legacy on-disk format carry a `migrated`
//! marker; recovering any such event triggers re-persistence in the current
//! format once recovery completes.

use lodestone_types::{LogEntry, ServerConfiguration, Snapshot, TermInfo};
use serde::{Deserialize, Serialize};

/// One event in the persisted recovery stream.
///
/// Serialized adjacently tagged so journals written by newer versions with
/// event kinds this version does not know deserialize to
/// [`RecoveryEvent::Unknown`] instead of failing recovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum RecoveryEvent {
    /// Persisted snapshot, delivered first when one exists.
    SnapshotOffer(Snapshot),
    /// A journal log entry.
    LogEntry(LogEntry),
    /// Marker that entries up to `to_index` were applied to the state
    /// machine before the restart.
    ApplyJournalEntries {
        /// Highest applied index.
        to_index: i64,
        /// True when deserialized from a legacy on-disk format.
        #[serde(default)]
        migrated: bool,
    },
    /// Marker that entries from `from_index` onward were truncated.
    DeleteEntries {
        /// First truncated index.
        from_index: i64,
        /// True when deserialized from a legacy on-disk format.
        #[serde(default)]
        migrated: bool,
    },
    /// Cluster membership persisted outside a log entry.
    ServerConfig(ServerConfiguration),
    /// Persisted election term update.
    UpdateElectionTerm {
        /// The persisted term state.
        term_info: TermInfo,
        /// True when deserialized from a legacy on-disk format.
        #[serde(default)]
        migrated: bool,
    },
    /// End of the persisted stream; recovery finishes.
    RecoveryCompleted,
    /// Unrecognized persisted message; ignored.
    #[serde(other)]
    Unknown,
}

impl RecoveryEvent {
    /// Convenience constructor for a current-format apply marker.
    pub const fn apply_journal_entries(to_index: i64) -> Self {
        Self::ApplyJournalEntries { to_index, migrated: false }
    }

    /// Convenience constructor for a current-format truncation marker.
    pub const fn delete_entries(from_index: i64) -> Self {
        Self::DeleteEntries { from_index, migrated: false }
    }

    /// Convenience constructor for a current-format term update.
    pub const fn update_election_term(term_info: TermInfo) -> Self {
        Self::UpdateElectionTerm { term_info, migrated: false }
    }

    /// Whether this event was recovered from a legacy serialized form.
    ///
    /// Snapshot offers are excluded: a snapshot's migration status lives in
    /// its state blob and unapplied entries, which the driver inspects
    /// separately.
    pub fn carries_migrated_marker(&self) -> bool {
        match self {
            Self::LogEntry(entry) => entry.payload.is_migrated(),
            Self::ServerConfig(config) => config.migrated,
            Self::ApplyJournalEntries { migrated, .. }
            | Self::DeleteEntries { migrated, .. }
            | Self::UpdateElectionTerm { migrated, .. } => *migrated,
            Self::SnapshotOffer(_) | Self::RecoveryCompleted | Self::Unknown => false,
        }
    }
}

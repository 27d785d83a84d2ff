//! Core type definitions for Lodestone.
//!
//! These types model the persisted consensus state of a single Raft actor:
//! - `NodeId`, `TermInfo`, `EntryMeta` for election and log bookkeeping
//! - `Payload` for the replicated entry taxonomy
//! - `Snapshot` / `SnapshotState` for persisted point-in-time state
//!
//! Log indices and terms are `i64` with `-1` meaning "none"; a freshly
//! installed node has `snapshot_index == -1` and an empty journal.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a cluster member.
///
/// Wraps the member name as configured by the operator (e.g. `member-1`).
/// Ordered so membership sets iterate deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a node identifier from a member name.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the member name.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Election bookkeeping
// ============================================================================

/// Persisted election term state: the current term and the candidate this
/// node voted for in it, if any.
///
/// Terms are monotonic. During journal replay a recovered `TermInfo` only
/// ever moves the term forward; the snapshot's term info is authoritative at
/// recovery start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermInfo {
    /// Current election term.
    pub term: i64,
    /// Candidate this node granted its vote to in `term`.
    pub voted_for: Option<NodeId>,
}

impl TermInfo {
    /// Creates term info for `term` with a recorded vote.
    pub fn new(term: i64, voted_for: Option<NodeId>) -> Self {
        Self { term, voted_for }
    }
}

impl fmt::Display for TermInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.voted_for {
            Some(node) => write!(f, "term {} (voted for {})", self.term, node),
            None => write!(f, "term {}", self.term),
        }
    }
}

/// The `(index, term)` pair identifying a position in the replicated log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    /// Log index.
    pub index: i64,
    /// Term the entry was created in.
    pub term: i64,
}

impl EntryMeta {
    /// Creates an entry meta from raw index and term.
    pub const fn new(index: i64, term: i64) -> Self {
        Self { index, term }
    }
}

impl fmt::Display for EntryMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[index: {}, term: {}]", self.index, self.term)
    }
}

// ============================================================================
// Payload taxonomy
// ============================================================================

/// Cluster membership carried in the replicated log.
///
/// Membership changes take effect at their log position; they are consensus
/// state, not application state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfiguration {
    /// Voting members.
    pub voting: BTreeSet<NodeId>,
    /// Non-voting members (learners).
    pub non_voting: BTreeSet<NodeId>,
    /// True when this configuration was recovered from a legacy serialized
    /// form and must be re-persisted in the current format.
    #[serde(default)]
    pub migrated: bool,
}

impl ServerConfiguration {
    /// Creates a configuration from voting and non-voting member sets.
    pub fn new<V, N>(voting: V, non_voting: N) -> Self
    where
        V: IntoIterator<Item = NodeId>,
        N: IntoIterator<Item = NodeId>,
    {
        Self {
            voting: voting.into_iter().collect(),
            non_voting: non_voting.into_iter().collect(),
            migrated: false,
        }
    }

    /// Returns true if `id` appears in either member set.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.voting.contains(id) || self.non_voting.contains(id)
    }

    /// Returns true if `id` is a voting member.
    pub fn is_voting(&self, id: &NodeId) -> bool {
        self.voting.contains(id)
    }

    /// Serialized weight of this configuration in bytes.
    pub fn size(&self) -> u64 {
        self.voting
            .iter()
            .chain(self.non_voting.iter())
            .map(|id| id.as_str().len() as u64)
            .sum()
    }
}

/// An opaque application payload replicated through the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationData {
    /// Serialized application command.
    pub bytes: Vec<u8>,
    /// Whether this payload belongs in durable storage. Non-persistent
    /// payloads found in a journal are evidence of stale storage.
    #[serde(default = "default_persistent")]
    pub persistent: bool,
    /// True when recovered from a legacy serialized form.
    #[serde(default)]
    pub migrated: bool,
}

fn default_persistent() -> bool {
    true
}

impl ApplicationData {
    /// Creates a persistent application payload.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: bytes.into(), persistent: true, migrated: false }
    }

    /// Creates a payload excluded from durable storage.
    pub fn transient(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: bytes.into(), persistent: false, migrated: false }
    }
}

/// The closed set of payload kinds a replicated log entry can carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    /// Application state machine command.
    Data(ApplicationData),
    /// Cluster membership change.
    ServerConfig(ServerConfiguration),
    /// Leader no-op, appended at the start of a term.
    NoOp {
        /// True when recovered from a legacy serialized form.
        #[serde(default)]
        migrated: bool,
    },
}

impl Payload {
    /// Convenience constructor for a persistent application payload.
    pub fn data(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Data(ApplicationData::new(bytes))
    }

    /// Convenience constructor for a no-op payload.
    pub const fn noop() -> Self {
        Self::NoOp { migrated: false }
    }

    /// Whether this payload belongs in durable storage.
    pub fn is_persistent(&self) -> bool {
        match self {
            Self::Data(data) => data.persistent,
            Self::ServerConfig(_) => true,
            Self::NoOp { .. } => false,
        }
    }

    /// Whether this payload was recovered from a legacy serialized form and
    /// must be re-persisted in the current format.
    pub fn is_migrated(&self) -> bool {
        match self {
            Self::Data(data) => data.migrated,
            Self::ServerConfig(config) => config.migrated,
            Self::NoOp { migrated } => *migrated,
        }
    }

    /// Serialized weight of this payload in bytes.
    pub fn size(&self) -> u64 {
        match self {
            Self::Data(data) => data.bytes.len() as u64,
            Self::ServerConfig(config) => config.size(),
            Self::NoOp { .. } => 0,
        }
    }

    /// Returns the membership change carried by this payload, if any.
    pub fn as_server_config(&self) -> Option<&ServerConfiguration> {
        match self {
            Self::ServerConfig(config) => Some(config),
            _ => None,
        }
    }
}

// ============================================================================
// Log entries
// ============================================================================

/// A single replicated log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Position in the log. Contiguous starting at `snapshot_index + 1`.
    pub index: i64,
    /// Term the entry was created in. Non-decreasing across the log.
    pub term: i64,
    /// The replicated payload.
    pub payload: Payload,
}

impl LogEntry {
    /// Creates a log entry.
    pub fn new(index: i64, term: i64, payload: Payload) -> Self {
        Self { index, term, payload }
    }

    /// Returns the `(index, term)` position of this entry.
    pub fn meta(&self) -> EntryMeta {
        EntryMeta::new(self.index, self.term)
    }

    /// Serialized weight of this entry, as accounted by the log.
    pub fn size(&self) -> u64 {
        self.payload.size()
    }
}

// ============================================================================
// Snapshots
// ============================================================================

/// Application state captured in a snapshot: either empty or an opaque blob
/// owned by the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotState {
    /// No application state.
    Empty,
    /// Serialized application state.
    Data {
        /// The opaque application blob.
        bytes: Vec<u8>,
        /// True when the blob was serialized in an older format and must be
        /// re-captured in the current one.
        #[serde(default)]
        needs_migration: bool,
    },
}

impl SnapshotState {
    /// Creates a state blob in the current serialization format.
    pub fn data(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Data { bytes: bytes.into(), needs_migration: false }
    }

    /// Returns true for [`SnapshotState::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Whether the blob requires re-capture in the current format.
    pub fn needs_migration(&self) -> bool {
        matches!(self, Self::Data { needs_migration: true, .. })
    }
}

/// A compact representation of state at a log position, plus the unapplied
/// entries needed to reach the committed tail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct Snapshot {
    /// Captured application state.
    pub state: SnapshotState,
    /// Entries past `last_applied_index` that were not yet applied when the
    /// snapshot was taken.
    #[builder(default)]
    pub unapplied_entries: Vec<LogEntry>,
    /// Index of the last entry covered by this snapshot (`-1` if none).
    #[builder(default = -1)]
    pub last_index: i64,
    /// Term of the last entry covered by this snapshot (`-1` if none).
    #[builder(default = -1)]
    pub last_term: i64,
    /// Index of the last entry applied to the state machine (`-1` if none).
    #[builder(default = -1)]
    pub last_applied_index: i64,
    /// Term of the last applied entry (`-1` if none).
    #[builder(default = -1)]
    pub last_applied_term: i64,
    /// Election term state at capture time.
    pub term_info: TermInfo,
    /// Cluster membership at capture time, when dynamic configuration is in
    /// use.
    pub server_config: Option<ServerConfiguration>,
    /// Votes observed for the current term, keyed by voter.
    pub election_votes: Option<BTreeMap<NodeId, NodeId>>,
}

impl Snapshot {
    /// Creates an empty snapshot preserving only election term state and
    /// cluster membership.
    ///
    /// Used both to scrub a recovered snapshot when persistence is disabled
    /// and to build the post-recovery cleanup snapshot.
    pub fn empty(term_info: TermInfo, server_config: Option<ServerConfiguration>) -> Self {
        Self {
            state: SnapshotState::Empty,
            unapplied_entries: Vec::new(),
            last_index: -1,
            last_term: -1,
            last_applied_index: -1,
            last_applied_term: -1,
            term_info,
            server_config,
            election_votes: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn node_id_display_and_order() {
        let a = NodeId::new("member-1");
        let b = NodeId::from("member-2");
        assert_eq!(a.to_string(), "member-1");
        assert!(a < b);
    }

    #[test]
    fn payload_persistence_markers() {
        assert!(Payload::data(b"tx".to_vec()).is_persistent());
        assert!(!Payload::Data(ApplicationData::transient(b"tx".to_vec())).is_persistent());
        assert!(Payload::ServerConfig(ServerConfiguration::default()).is_persistent());
        assert!(!Payload::noop().is_persistent());
    }

    #[test]
    fn payload_migration_markers() {
        assert!(!Payload::data(b"tx".to_vec()).is_migrated());

        let mut data = ApplicationData::new(b"tx".to_vec());
        data.migrated = true;
        assert!(Payload::Data(data).is_migrated());

        let mut config = ServerConfiguration::new([NodeId::new("a")], []);
        config.migrated = true;
        assert!(Payload::ServerConfig(config).is_migrated());

        assert!(Payload::NoOp { migrated: true }.is_migrated());
        assert!(!Payload::noop().is_migrated());
    }

    #[test]
    fn payload_sizes() {
        assert_eq!(Payload::data(vec![0u8; 42]).size(), 42);
        assert_eq!(Payload::noop().size(), 0);

        let config = ServerConfiguration::new(
            [NodeId::new("ab")],
            [NodeId::new("cdef")],
        );
        assert_eq!(Payload::ServerConfig(config).size(), 6);
    }

    #[test]
    fn server_configuration_membership() {
        let config = ServerConfiguration::new(
            [NodeId::new("leader"), NodeId::new("follower")],
            [NodeId::new("learner")],
        );
        assert!(config.is_voting(&NodeId::new("leader")));
        assert!(!config.is_voting(&NodeId::new("learner")));
        assert!(config.contains(&NodeId::new("learner")));
        assert!(!config.contains(&NodeId::new("stranger")));
    }

    #[test]
    fn log_entry_meta() {
        let entry = LogEntry::new(7, 2, Payload::noop());
        assert_eq!(entry.meta(), EntryMeta::new(7, 2));
        assert_eq!(entry.meta().to_string(), "[index: 7, term: 2]");
    }

    #[test]
    fn snapshot_empty_preserves_term_and_membership() {
        let term_info = TermInfo::new(5, Some(NodeId::new("member-1")));
        let config = ServerConfiguration::new([NodeId::new("member-1")], []);
        let snapshot = Snapshot::empty(term_info.clone(), Some(config.clone()));

        assert!(snapshot.state.is_empty());
        assert!(snapshot.unapplied_entries.is_empty());
        assert_eq!(snapshot.last_index, -1);
        assert_eq!(snapshot.last_applied_index, -1);
        assert_eq!(snapshot.term_info, term_info);
        assert_eq!(snapshot.server_config, Some(config));
    }

    #[test]
    fn snapshot_builder_defaults() {
        let snapshot = Snapshot::builder()
            .state(SnapshotState::data(b"app".to_vec()))
            .term_info(TermInfo::new(1, None))
            .build();
        assert_eq!(snapshot.last_index, -1);
        assert_eq!(snapshot.last_applied_term, -1);
        assert!(snapshot.server_config.is_none());
        assert!(snapshot.election_votes.is_none());
    }

    #[test]
    fn serde_round_trip() {
        let entry = LogEntry::new(3, 1, Payload::data(b"cmd".to_vec()));
        let json = serde_json::to_string(&entry).unwrap();
        let back: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn serde_defaults_for_markers() {
        // Older journals predate the migrated/persistent markers.
        let json = r#"{"index":1,"term":1,"payload":{"Data":{"bytes":[1,2]}}}"#;
        let entry: LogEntry = serde_json::from_str(json).unwrap();
        assert!(entry.payload.is_persistent());
        assert!(!entry.payload.is_migrated());
    }
}

//! Shared per-actor consensus state.
//!
//! `RaftActorContext` holds everything a role (Recovery, Follower, Leader)
//! needs to see about this actor: the replicated log, election term,
//! commit/applied indices, cluster membership, configuration, and the
//! snapshot manager handle. Recovery mutates it exclusively; afterwards it
//! is handed to the Follower role.

use std::collections::BTreeSet;

use lodestone_types::{NodeId, RaftConfig, ServerConfiguration, TermInfo};
use tracing::{debug, trace};

use crate::log::ReplicatedLog;
use crate::snapshot_manager::SnapshotManager;

/// Per-actor consensus state shared across roles.
#[derive(Debug)]
pub struct RaftActorContext {
    id: NodeId,
    log: ReplicatedLog,
    term_info: TermInfo,
    last_applied: i64,
    commit_index: i64,
    voting_peers: BTreeSet<NodeId>,
    non_voting_peers: BTreeSet<NodeId>,
    voting_member: bool,
    dynamic_server_config: bool,
    config: RaftConfig,
    snapshot_manager: SnapshotManager,
}

impl RaftActorContext {
    /// Creates the context for a freshly started actor: empty log, term 0,
    /// no applied entries, no peers.
    pub fn new(id: NodeId, config: RaftConfig) -> Self {
        Self {
            id,
            log: ReplicatedLog::new(),
            term_info: TermInfo::default(),
            last_applied: -1,
            commit_index: -1,
            voting_peers: BTreeSet::new(),
            non_voting_peers: BTreeSet::new(),
            voting_member: true,
            dynamic_server_config: false,
            config,
            snapshot_manager: SnapshotManager::new(),
        }
    }

    /// This actor's member identifier.
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// The actor's configuration parameters.
    pub fn config(&self) -> &RaftConfig {
        &self.config
    }

    /// The replicated log.
    pub fn replicated_log(&self) -> &ReplicatedLog {
        &self.log
    }

    /// Mutable access to the replicated log.
    pub fn replicated_log_mut(&mut self) -> &mut ReplicatedLog {
        &mut self.log
    }

    /// Replaces the replicated log wholesale (e.g. when seeding from a
    /// recovered snapshot).
    pub fn set_replicated_log(&mut self, log: ReplicatedLog) {
        self.log = log;
    }

    /// Current election term state.
    pub fn term_info(&self) -> &TermInfo {
        &self.term_info
    }

    /// Replaces the election term state.
    pub fn set_term_info(&mut self, term_info: TermInfo) {
        trace!(id = %self.id, %term_info, "term info updated");
        self.term_info = term_info;
    }

    /// Index of the last entry applied to the state machine (`-1` if none).
    pub fn last_applied(&self) -> i64 {
        self.last_applied
    }

    /// Moves the applied cursor.
    pub fn set_last_applied(&mut self, index: i64) {
        trace!(id = %self.id, index, "last applied updated");
        self.last_applied = index;
    }

    /// Index of the highest entry known to be committed (`-1` if none).
    pub fn commit_index(&self) -> i64 {
        self.commit_index
    }

    /// Moves the commit cursor.
    pub fn set_commit_index(&mut self, index: i64) {
        self.commit_index = index;
    }

    /// The snapshot manager handle for this actor.
    pub fn snapshot_manager(&self) -> &SnapshotManager {
        &self.snapshot_manager
    }

    /// Identifiers of all known peers, voting and non-voting, excluding
    /// this actor.
    pub fn peer_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.voting_peers.iter().chain(self.non_voting_peers.iter())
    }

    /// Whether this actor votes in elections under the current membership.
    pub fn is_voting_member(&self) -> bool {
        self.voting_member
    }

    /// Installs cluster membership from a replicated configuration.
    ///
    /// Peer sets are rebuilt from the configuration with this actor
    /// excluded; the actor's own voting status is recomputed (a member
    /// absent from the configuration no longer votes). Marks dynamic
    /// membership as in use.
    pub fn update_peer_ids(&mut self, server_config: &ServerConfiguration) {
        self.voting_peers =
            server_config.voting.iter().filter(|id| **id != self.id).cloned().collect();
        self.non_voting_peers =
            server_config.non_voting.iter().filter(|id| **id != self.id).cloned().collect();
        self.voting_member = server_config.is_voting(&self.id);
        self.dynamic_server_config = true;
        debug!(
            id = %self.id,
            voting = self.voting_peers.len(),
            non_voting = self.non_voting_peers.len(),
            voting_member = self.voting_member,
            "peer membership updated"
        );
    }

    /// The current membership as a `ServerConfiguration`, or `None` when no
    /// dynamic configuration has ever been installed.
    ///
    /// With `include_self` the actor itself is listed under its current
    /// voting status.
    pub fn peer_server_info(&self, include_self: bool) -> Option<ServerConfiguration> {
        if !self.dynamic_server_config {
            return None;
        }
        let mut voting = self.voting_peers.clone();
        let mut non_voting = self.non_voting_peers.clone();
        if include_self {
            if self.voting_member {
                voting.insert(self.id.clone());
            } else {
                non_voting.insert(self.id.clone());
            }
        }
        Some(ServerConfiguration { voting, non_voting, migrated: false })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn context() -> RaftActorContext {
        RaftActorContext::new(NodeId::new("member-1"), RaftConfig::default())
    }

    #[test]
    fn fresh_context_has_sentinel_state() {
        let context = context();
        assert_eq!(context.last_applied(), -1);
        assert_eq!(context.commit_index(), -1);
        assert_eq!(context.replicated_log().last_index(), -1);
        assert!(context.is_voting_member());
        assert_eq!(context.peer_ids().count(), 0);
        assert!(context.peer_server_info(true).is_none());
    }

    #[test]
    fn update_peer_ids_excludes_self() {
        let mut context = context();
        context.update_peer_ids(&ServerConfiguration::new(
            [NodeId::new("member-1"), NodeId::new("member-2")],
            [NodeId::new("member-3")],
        ));
        let peers: Vec<_> = context.peer_ids().cloned().collect();
        assert_eq!(peers, vec![NodeId::new("member-2"), NodeId::new("member-3")]);
        assert!(context.is_voting_member());
    }

    #[test]
    fn voting_status_recomputed_from_config() {
        let mut context = context();
        context.update_peer_ids(&ServerConfiguration::new(
            [NodeId::new("member-2")],
            [NodeId::new("member-1")],
        ));
        assert!(!context.is_voting_member());

        // Absent from the configuration entirely: no longer a voter.
        context.update_peer_ids(&ServerConfiguration::new([NodeId::new("member-2")], []));
        assert!(!context.is_voting_member());
    }

    #[test]
    fn peer_server_info_lists_self_under_current_status() {
        let mut context = context();
        context.update_peer_ids(&ServerConfiguration::new(
            [NodeId::new("member-1"), NodeId::new("member-2")],
            [],
        ));

        let with_self = context.peer_server_info(true).unwrap();
        assert!(with_self.is_voting(&NodeId::new("member-1")));
        assert!(with_self.is_voting(&NodeId::new("member-2")));

        let without_self = context.peer_server_info(false).unwrap();
        assert!(!without_self.contains(&NodeId::new("member-1")));
    }

    #[test]
    fn peer_server_info_places_non_voting_self_as_learner() {
        let mut context = context();
        context.update_peer_ids(&ServerConfiguration::new([NodeId::new("member-2")], []));
        let info = context.peer_server_info(true).unwrap();
        assert!(info.non_voting.contains(&NodeId::new("member-1")));
        assert!(!info.is_voting(&NodeId::new("member-1")));
    }
}

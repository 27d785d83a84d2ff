//! The recovery state machine.
//!
//! On restart the persistence runtime replays the journal into a
//! [`RecoveryDriver`], one event per [`offer`](RecoveryDriver::offer) call.
//! The driver rebuilds consensus state (term, log, commit/applied cursors,
//! membership) in the context, replays application payloads into the cohort
//! in batches, and on `RecoveryCompleted` performs exactly one of three
//! reconciliation actions:
//!
//! - wipe: persist an empty snapshot and clear the journal (stale data was
//!   recovered with persistence disabled, or migrated data cannot be
//!   re-persisted)
//! - capture: take a fresh snapshot to upgrade migrated on-disk formats
//! - restore: install an operator-supplied snapshot, only when the store
//!   was empty
//!
//! The driver is single-use: it owns the context and cohort for the run and
//! releases them through [`into_parts`](RecoveryDriver::into_parts) once
//! `offer` has returned `true`.

use lodestone_types::{EntryMeta, LogEntry, Snapshot};
use snafu::ResultExt;
use tracing::{debug, error, info, trace, warn};

use crate::cohort::RecoveryCohort;
use crate::context::RaftActorContext;
use crate::error::{CohortSnafu, LogSnafu, ProviderSnafu, RecoveryError};
use crate::event::RecoveryEvent;
use crate::log::ReplicatedLog;
use crate::persistence::PersistenceProvider;
use crate::snapshot_manager::ApplySnapshot;
use crate::stopwatch::Stopwatch;

/// Consumes the persisted recovery event stream and rebuilds actor state.
pub struct RecoveryDriver<C> {
    context: RaftActorContext,
    cohort: C,
    current_batch_count: u32,
    data_recovered_with_persistence_disabled: bool,
    any_data_recovered: bool,
    has_migrated_data_recovered: bool,
    recovery_timer: Option<Stopwatch>,
    recovery_snapshot_timer: Option<Stopwatch>,
}

impl<C: RecoveryCohort> RecoveryDriver<C> {
    /// Creates a driver owning `context` and `cohort` for one recovery run.
    pub fn new(context: RaftActorContext, cohort: C) -> Self {
        Self {
            context,
            cohort,
            current_batch_count: 0,
            data_recovered_with_persistence_disabled: false,
            any_data_recovered: false,
            has_migrated_data_recovered: false,
            recovery_timer: None,
            recovery_snapshot_timer: None,
        }
    }

    /// The context being rebuilt. Primarily for inspection mid-recovery.
    pub fn context(&self) -> &RaftActorContext {
        &self.context
    }

    /// The cohort being driven.
    pub fn cohort(&self) -> &C {
        &self.cohort
    }

    /// Mutable access to the cohort, e.g. to arm a restore snapshot before
    /// replay starts.
    pub fn cohort_mut(&mut self) -> &mut C {
        &mut self.cohort
    }

    /// Releases the recovered context and cohort to the next role.
    pub fn into_parts(self) -> (RaftActorContext, C) {
        (self.context, self.cohort)
    }

    /// Consumes one persisted recovery event.
    ///
    /// Events must be delivered in the order the persistence runtime
    /// produced them. Returns `Ok(true)` exactly once, on
    /// [`RecoveryEvent::RecoveryCompleted`].
    ///
    /// # Errors
    ///
    /// Cohort faults, provider faults, and log invariant violations abort
    /// the run; see [`RecoveryError`].
    pub fn offer<P>(&mut self, event: RecoveryEvent, provider: &P) -> Result<bool, RecoveryError>
    where
        P: PersistenceProvider + ?Sized,
    {
        trace!(id = %self.context.id(), ?event, "recovery event");

        self.any_data_recovered |= !matches!(event, RecoveryEvent::RecoveryCompleted);
        if event.carries_migrated_marker() {
            self.has_migrated_data_recovered = true;
        }

        match event {
            RecoveryEvent::SnapshotOffer(snapshot) => self.on_snapshot_offer(snapshot, provider)?,
            RecoveryEvent::LogEntry(entry) => self.on_log_entry(entry, provider)?,
            RecoveryEvent::ApplyJournalEntries { to_index, .. } => {
                self.on_apply_journal_entries(to_index, provider)?;
            }
            RecoveryEvent::DeleteEntries { from_index, .. } => {
                self.on_delete_entries(from_index, provider)?;
            }
            RecoveryEvent::ServerConfig(server_config) => {
                self.context.update_peer_ids(&server_config);
            }
            RecoveryEvent::UpdateElectionTerm { term_info, .. } => {
                self.context.set_term_info(term_info);
            }
            RecoveryEvent::RecoveryCompleted => {
                self.on_recovery_completed(provider)?;
                return Ok(true);
            }
            RecoveryEvent::Unknown => {}
        }
        Ok(false)
    }

    fn init_recovery_timers(&mut self) {
        if self.recovery_timer.is_none() {
            self.recovery_timer = Some(Stopwatch::started());
        }
        if self.recovery_snapshot_timer.is_none()
            && self.context.config().recovery_snapshot_interval_seconds > 0
        {
            self.recovery_snapshot_timer = Some(Stopwatch::started());
        }
    }

    fn on_snapshot_offer<P>(
        &mut self,
        snapshot: Snapshot,
        provider: &P,
    ) -> Result<(), RecoveryError>
    where
        P: PersistenceProvider + ?Sized,
    {
        debug!(id = %self.context.id(), "snapshot offered");

        self.init_recovery_timers();

        for entry in &snapshot.unapplied_entries {
            if entry.payload.is_migrated() {
                self.has_migrated_data_recovered = true;
            }
        }

        let snapshot = if provider.is_recovery_applicable() {
            snapshot
        } else {
            // We may have just transitioned to persistence-disabled while
            // the store still holds state data and log entries. Keep only
            // the election term and server configuration.
            Snapshot::empty(snapshot.term_info, snapshot.server_config)
        };

        // The log seeded from the snapshot also serves it back later when
        // the snapshot must be installed on a peer.
        self.context.set_replicated_log(ReplicatedLog::from_snapshot(&snapshot));
        self.context.set_last_applied(snapshot.last_applied_index);
        self.context.set_commit_index(snapshot.last_applied_index);
        self.context.set_term_info(snapshot.term_info.clone());

        let mut timer = Stopwatch::started();

        if snapshot.state.needs_migration() {
            self.has_migrated_data_recovered = true;
        }
        if !snapshot.state.is_empty() {
            self.cohort
                .apply_recovery_snapshot(&snapshot.state)
                .context(CohortSnafu { stage: "apply_recovery_snapshot" })?;
        }

        if let Some(server_config) = &snapshot.server_config {
            self.context.update_peer_ids(server_config);
        }

        let elapsed = timer.stop();
        let log = self.context.replicated_log();
        info!(
            id = %self.context.id(),
            elapsed = ?elapsed,
            snapshot_index = log.snapshot_index(),
            snapshot_term = log.snapshot_term(),
            journal_size = log.size(),
            "recovery snapshot applied"
        );
        Ok(())
    }

    fn on_log_entry<P>(&mut self, entry: LogEntry, provider: &P) -> Result<(), RecoveryError>
    where
        P: PersistenceProvider + ?Sized,
    {
        debug!(
            id = %self.context.id(),
            index = entry.index,
            size = entry.size(),
            "recovered log entry"
        );

        // Membership changes take effect at their log position regardless of
        // persistence mode.
        if let Some(server_config) = entry.payload.as_server_config() {
            self.context.update_peer_ids(server_config);
        }

        if provider.is_recovery_applicable() {
            self.context.replicated_log_mut().append(entry).context(LogSnafu)?;
        } else if !entry.payload.is_persistent() {
            self.data_recovered_with_persistence_disabled = true;
        }
        Ok(())
    }

    fn on_apply_journal_entries<P>(
        &mut self,
        to_index: i64,
        provider: &P,
    ) -> Result<(), RecoveryError>
    where
        P: PersistenceProvider + ?Sized,
    {
        if !provider.is_recovery_applicable() {
            self.data_recovered_with_persistence_disabled = true;
            return Ok(());
        }

        let first_unapplied = self.context.last_applied() + 1;

        // first_unapplied can exceed to_index when the apply marker survived
        // in the journal but the entries it names were already absorbed into
        // a snapshot.
        debug!(
            id = %self.context.id(),
            from = first_unapplied,
            to = to_index,
            "applying recovered journal entries"
        );

        let mut last_applied = first_unapplied - 1;
        for i in first_unapplied..=to_index {
            let Some(entry) = self.context.replicated_log().get(i).cloned() else {
                error!(id = %self.context.id(), index = i, "log entry not found during recovery");
                break;
            };
            last_applied += 1;
            self.batch_recovered_log_entry(&entry)?;

            if self.should_take_recovery_snapshot()
                && !self.context.snapshot_manager().is_capturing()
            {
                if self.current_batch_count > 0 {
                    self.end_current_log_recovery_batch()?;
                }
                self.context.set_last_applied(last_applied);
                self.context.set_commit_index(last_applied);
                self.take_recovery_snapshot(entry.meta());
            }
        }

        self.context.set_last_applied(last_applied);
        self.context.set_commit_index(last_applied);
        Ok(())
    }

    fn on_delete_entries<P>(&mut self, from_index: i64, provider: &P) -> Result<(), RecoveryError>
    where
        P: PersistenceProvider + ?Sized,
    {
        if provider.is_recovery_applicable() {
            let removed =
                self.context.replicated_log_mut().remove_from(from_index).context(LogSnafu)?;
            debug!(id = %self.context.id(), from_index, removed, "recovered log truncation");
        } else {
            self.data_recovered_with_persistence_disabled = true;
        }
        Ok(())
    }

    fn batch_recovered_log_entry(&mut self, entry: &LogEntry) -> Result<(), RecoveryError> {
        self.init_recovery_timers();

        // Membership is consensus state, already applied to the context when
        // the entry was recovered; replaying it through the cohort would
        // hand application code a payload it does not own.
        if entry.payload.as_server_config().is_some() {
            return Ok(());
        }

        let batch_size = self.context.config().journal_recovery_log_batch_size;
        if self.current_batch_count == 0 {
            self.cohort
                .start_log_recovery_batch(batch_size)
                .context(CohortSnafu { stage: "start_log_recovery_batch" })?;
        }

        self.cohort
            .append_recovered_log_entry(&entry.payload)
            .context(CohortSnafu { stage: "append_recovered_log_entry" })?;

        self.current_batch_count += 1;
        if self.current_batch_count >= batch_size {
            self.end_current_log_recovery_batch()?;
        }
        Ok(())
    }

    fn end_current_log_recovery_batch(&mut self) -> Result<(), RecoveryError> {
        self.cohort
            .apply_current_log_recovery_batch()
            .context(CohortSnafu { stage: "apply_current_log_recovery_batch" })?;
        self.current_batch_count = 0;
        Ok(())
    }

    fn should_take_recovery_snapshot(&self) -> bool {
        match &self.recovery_snapshot_timer {
            Some(timer) => {
                timer.elapsed().as_secs()
                    >= u64::from(self.context.config().recovery_snapshot_interval_seconds)
            }
            None => false,
        }
    }

    fn take_recovery_snapshot(&mut self, last_applied: EntryMeta) {
        info!(id = %self.context.id(), index = last_applied.index, "taking mid-recovery snapshot");
        if self.context.snapshot_manager().capture(last_applied, -1) {
            info!(id = %self.context.id(), "capture accepted, restarting recovery snapshot interval");
            if let Some(timer) = &mut self.recovery_snapshot_timer {
                timer.restart();
            }
        } else {
            // Timer deliberately left running so the next entry retries.
            info!(id = %self.context.id(), "snapshot manager busy, will retry on the next recovered entry");
        }
    }

    fn on_recovery_completed<P>(&mut self, provider: &P) -> Result<(), RecoveryError>
    where
        P: PersistenceProvider + ?Sized,
    {
        if self.current_batch_count > 0 {
            self.end_current_log_recovery_batch()?;
        }

        let recovery_time = self.recovery_timer.take().map(|mut timer| timer.stop());
        if let Some(mut timer) = self.recovery_snapshot_timer.take() {
            timer.stop();
        }

        let log = self.context.replicated_log();
        info!(
            id = %self.context.id(),
            elapsed = ?recovery_time,
            last_index = log.last_index(),
            last_term = log.last_term(),
            snapshot_index = log.snapshot_index(),
            snapshot_term = log.snapshot_term(),
            journal_size = log.size(),
            "recovery completed, switching actor to Follower"
        );

        if self.data_recovered_with_persistence_disabled
            || self.has_migrated_data_recovered && !provider.is_recovery_applicable()
        {
            if self.has_migrated_data_recovered {
                info!(id = %self.context.id(), "saving snapshot after recovery due to migrated entries");
            } else {
                info!(id = %self.context.id(), "saving snapshot after recovery due to data persistence disabled");
            }

            // Either persistence is disabled and data entries were recovered
            // (we just transitioned to disabled, or a persistence backup was
            // restored) or migrated entries were recovered and cannot be
            // re-captured. Persist an empty snapshot and clear the journal
            // of the unwanted entries.
            let snapshot = Snapshot::empty(
                self.context.term_info().clone(),
                self.context.peer_server_info(true),
            );
            provider.save_snapshot(&snapshot).context(ProviderSnafu)?;
            provider.delete_messages(provider.last_sequence_number()).context(ProviderSnafu)?;
        } else if self.has_migrated_data_recovered {
            info!(id = %self.context.id(), "snapshot capture initiated after recovery due to migrated entries");

            match self.context.replicated_log().last_meta() {
                Some(last_meta) => {
                    self.context.snapshot_manager().capture(last_meta, -1);
                }
                None => {
                    debug!(id = %self.context.id(), "nothing to capture, log is virgin");
                }
            }
        } else {
            self.possibly_restore_from_snapshot();
        }
        Ok(())
    }

    fn possibly_restore_from_snapshot(&mut self) {
        let Some(snapshot) = self.cohort.restore_from_snapshot() else {
            return;
        };

        if self.any_data_recovered {
            warn!(
                id = %self.context.id(),
                "restore snapshot not applied: the persistence store is not empty"
            );
            return;
        }

        debug!(id = %self.context.id(), "applying restore snapshot");
        self.context.snapshot_manager().apply(ApplySnapshot { snapshot });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use lodestone_test_utils::{MemoryPersistence, RecordingCohort};
    use lodestone_types::{NodeId, Payload, RaftConfig, TermInfo};

    use super::*;

    fn driver_with_interval(interval_seconds: u32) -> RecoveryDriver<RecordingCohort> {
        let config = RaftConfig::builder()
            .journal_recovery_log_batch_size(10)
            .recovery_snapshot_interval_seconds(interval_seconds)
            .build()
            .unwrap();
        let context = RaftActorContext::new(NodeId::new("member-1"), config);
        RecoveryDriver::new(context, RecordingCohort::new())
    }

    #[test]
    fn timers_start_lazily_on_first_batched_entry() {
        let mut driver = driver_with_interval(30);
        assert!(driver.recovery_timer.is_none());
        assert!(driver.recovery_snapshot_timer.is_none());

        let entry = LogEntry::new(0, 1, Payload::data(b"tx".to_vec()));
        driver.batch_recovered_log_entry(&entry).unwrap();
        assert!(driver.recovery_timer.as_ref().unwrap().is_running());
        assert!(driver.recovery_snapshot_timer.as_ref().unwrap().is_running());
    }

    #[test]
    fn snapshot_timer_disabled_when_interval_is_zero() {
        let mut driver = driver_with_interval(0);
        let entry = LogEntry::new(0, 1, Payload::data(b"tx".to_vec()));
        driver.batch_recovered_log_entry(&entry).unwrap();
        assert!(driver.recovery_timer.is_some());
        assert!(driver.recovery_snapshot_timer.is_none());
        assert!(!driver.should_take_recovery_snapshot());
    }

    #[test]
    fn membership_payloads_are_not_batched() {
        let mut driver = driver_with_interval(0);
        let entry = LogEntry::new(
            0,
            1,
            Payload::ServerConfig(lodestone_types::ServerConfiguration::new(
                [NodeId::new("member-1")],
                [],
            )),
        );
        driver.batch_recovered_log_entry(&entry).unwrap();
        assert_eq!(driver.current_batch_count, 0);
        assert!(driver.cohort.calls().is_empty());
    }

    #[test]
    fn refused_capture_leaves_interval_timer_running() {
        let mut driver = driver_with_interval(1);
        driver.init_recovery_timers();

        // Occupy the manager so the mid-recovery capture is refused.
        assert!(driver.context.snapshot_manager().capture(EntryMeta::new(0, 1), -1));
        driver.take_recovery_snapshot(EntryMeta::new(1, 1));
        assert_eq!(driver.context.snapshot_manager().accepted_captures(), 1);
        assert!(driver.recovery_snapshot_timer.as_ref().unwrap().is_running());
    }

    #[test]
    fn accepted_capture_restarts_interval_timer() {
        let mut driver = driver_with_interval(1);
        driver.init_recovery_timers();
        std::thread::sleep(std::time::Duration::from_millis(30));

        driver.take_recovery_snapshot(EntryMeta::new(1, 1));
        assert_eq!(driver.context.snapshot_manager().accepted_captures(), 1);
        let timer = driver.recovery_snapshot_timer.as_ref().unwrap();
        assert!(timer.is_running());
        assert!(timer.elapsed() < std::time::Duration::from_millis(30));
    }

    #[test]
    fn unknown_event_is_ignored_but_counts_as_recovered_data() {
        let provider = MemoryPersistence::new();
        let mut driver = driver_with_interval(0);
        driver.cohort.set_restore_from_snapshot(Snapshot::empty(TermInfo::new(1, None), None));

        assert!(!driver.offer(RecoveryEvent::Unknown, &provider).unwrap());
        assert!(driver.offer(RecoveryEvent::RecoveryCompleted, &provider).unwrap());

        // The stray event suppressed the operator restore.
        let (context, _cohort) = driver.into_parts();
        assert!(context.snapshot_manager().take_applied().is_none());
    }
}

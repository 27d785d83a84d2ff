//! A recording `RecoveryCohort` test double.

use lodestone_raft::cohort::RecoveryCohort;
use lodestone_raft::error::BoxedError;
use lodestone_types::{Payload, Snapshot, SnapshotState};
use snafu::Snafu;

/// Error injected into a cohort method by [`RecordingCohort::fail_on`].
#[derive(Debug, Snafu)]
#[snafu(display("injected cohort failure in {stage}"))]
pub struct InjectedFailure {
    /// The failed stage.
    pub stage: &'static str,
}

/// One observed cohort invocation, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum CohortCall {
    /// `start_log_recovery_batch(max_batch_size)`.
    StartBatch(u32),
    /// `append_recovered_log_entry(payload)`.
    Append(Payload),
    /// `apply_current_log_recovery_batch()`.
    ApplyBatch,
    /// `apply_recovery_snapshot(state)`.
    ApplySnapshot(SnapshotState),
}

/// A `RecoveryCohort` that records every invocation for later assertions.
#[derive(Debug, Default)]
pub struct RecordingCohort {
    calls: Vec<CohortCall>,
    restore: Option<Snapshot>,
    fail_on: Option<&'static str>,
}

impl RecordingCohort {
    /// Creates a cohort with no recorded calls and no restore snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `restore_from_snapshot` return `snapshot`.
    pub fn set_restore_from_snapshot(&mut self, snapshot: Snapshot) {
        self.restore = Some(snapshot);
    }

    /// Makes the named cohort method fail with [`InjectedFailure`].
    pub fn fail_on(&mut self, stage: &'static str) {
        self.fail_on = Some(stage);
    }

    /// All recorded invocations, in order.
    pub fn calls(&self) -> &[CohortCall] {
        &self.calls
    }

    /// Number of `start_log_recovery_batch` calls.
    pub fn batch_starts(&self) -> usize {
        self.calls.iter().filter(|call| matches!(call, CohortCall::StartBatch(_))).count()
    }

    /// Number of `apply_current_log_recovery_batch` calls.
    pub fn batch_applies(&self) -> usize {
        self.calls.iter().filter(|call| matches!(call, CohortCall::ApplyBatch)).count()
    }

    /// Payloads delivered via `append_recovered_log_entry`, in order.
    pub fn appended(&self) -> Vec<&Payload> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                CohortCall::Append(payload) => Some(payload),
                _ => None,
            })
            .collect()
    }

    /// Snapshot states delivered via `apply_recovery_snapshot`, in order.
    pub fn applied_snapshots(&self) -> Vec<&SnapshotState> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                CohortCall::ApplySnapshot(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    fn check_injected(&self, stage: &'static str) -> Result<(), BoxedError> {
        if self.fail_on == Some(stage) {
            return Err(Box::new(InjectedFailure { stage }));
        }
        Ok(())
    }
}

impl RecoveryCohort for RecordingCohort {
    fn start_log_recovery_batch(&mut self, max_batch_size: u32) -> Result<(), BoxedError> {
        self.check_injected("start_log_recovery_batch")?;
        self.calls.push(CohortCall::StartBatch(max_batch_size));
        Ok(())
    }

    fn append_recovered_log_entry(&mut self, payload: &Payload) -> Result<(), BoxedError> {
        self.check_injected("append_recovered_log_entry")?;
        self.calls.push(CohortCall::Append(payload.clone()));
        Ok(())
    }

    fn apply_current_log_recovery_batch(&mut self) -> Result<(), BoxedError> {
        self.check_injected("apply_current_log_recovery_batch")?;
        self.calls.push(CohortCall::ApplyBatch);
        Ok(())
    }

    fn apply_recovery_snapshot(&mut self, state: &SnapshotState) -> Result<(), BoxedError> {
        self.check_injected("apply_recovery_snapshot")?;
        self.calls.push(CohortCall::ApplySnapshot(state.clone()));
        Ok(())
    }

    fn restore_from_snapshot(&self) -> Option<Snapshot> {
        self.restore.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn records_calls_in_order() {
        let mut cohort = RecordingCohort::new();
        cohort.start_log_recovery_batch(5).unwrap();
        cohort.append_recovered_log_entry(&Payload::noop()).unwrap();
        cohort.apply_current_log_recovery_batch().unwrap();

        assert_eq!(
            cohort.calls(),
            [
                CohortCall::StartBatch(5),
                CohortCall::Append(Payload::noop()),
                CohortCall::ApplyBatch,
            ]
        );
        assert_eq!(cohort.batch_starts(), 1);
        assert_eq!(cohort.batch_applies(), 1);
        assert_eq!(cohort.appended().len(), 1);
    }

    #[test]
    fn injected_failure_fires_on_named_stage_only() {
        let mut cohort = RecordingCohort::new();
        cohort.fail_on("apply_current_log_recovery_batch");
        cohort.start_log_recovery_batch(5).unwrap();
        let err = cohort.apply_current_log_recovery_batch().unwrap_err();
        assert!(err.to_string().contains("apply_current_log_recovery_batch"));
    }
}

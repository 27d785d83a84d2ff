//! Error types for the lodestone-raft crate using snafu.
//!
//! Log and provider errors are colocated with their modules; this module
//! holds the driver-fatal [`RecoveryError`] that surfaces out of
//! [`RecoveryDriver::offer`](crate::recovery::RecoveryDriver::offer).
//!
//! Recoverable replay conditions (a journal entry superseded by a snapshot,
//! a refused capture) are handled locally and logged; everything here aborts
//! the recovery run.

use snafu::Snafu;

use crate::log::LogError;
use crate::persistence::ProviderError;

/// Boxed error raised by application-side collaborators (cohorts and
/// persistence backends are foreign code).
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that abort a recovery run.
///
/// Recovery cannot be partially completed: any of these faults is fatal to
/// the actor, which must restart and re-read the journal from the beginning.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RecoveryError {
    /// The recovery cohort raised a fault while consuming replayed state.
    #[snafu(display("recovery cohort failed during {stage}: {source}"))]
    Cohort {
        /// The cohort operation that failed.
        stage: &'static str,
        /// The cohort's error.
        source: BoxedError,
    },

    /// The persistence provider failed a post-recovery operation.
    #[snafu(display("persistence provider failed: {source}"))]
    Provider {
        /// The provider's error.
        source: ProviderError,
    },

    /// The replicated log rejected a recovered mutation. The journal is
    /// internally inconsistent or the replay was mis-ordered.
    #[snafu(display("replicated log rejected recovered mutation: {source}"))]
    Log {
        /// The log invariant violation.
        source: LogError,
    },
}

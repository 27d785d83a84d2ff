//! Replicated log and persistence recovery for the Lodestone Raft actor.
//!
//! This crate provides:
//! - The in-memory replicated log (`ReplicatedLog`)
//! - Shared per-actor consensus state (`RaftActorContext`)
//! - The snapshot capture collaborator (`SnapshotManager`)
//! - Seams to the persistence runtime and the application
//!   (`PersistenceProvider`, `RecoveryCohort`)
//! - The recovery state machine that rebuilds actor state from a persisted
//!   event stream (`RecoveryDriver`)
//!
//! Recovery is single-threaded and synchronous: the persistence runtime
//! replays journal events in order into [`RecoveryDriver::offer`], which
//! mutates the context, drives the cohort, and reports completion when the
//! stream ends. The recovered context is then handed to the Follower role.

#![deny(unsafe_code)]

pub mod cohort;
pub mod context;
pub mod error;
pub mod event;
pub mod log;
pub mod persistence;
pub mod recovery;
pub mod snapshot_manager;
pub mod stopwatch;

pub use cohort::RecoveryCohort;
pub use context::RaftActorContext;
pub use error::{BoxedError, RecoveryError};
pub use event::RecoveryEvent;
pub use log::{LogError, ReplicatedLog};
pub use persistence::{PersistenceProvider, ProviderError};
pub use recovery::RecoveryDriver;
pub use snapshot_manager::{ApplySnapshot, CaptureRequest, SnapshotManager};
pub use stopwatch::Stopwatch;

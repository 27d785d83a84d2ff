//! Core types and configuration for the Lodestone replicated state machine.
//!
//! This crate provides the foundational types shared across Lodestone:
//! - Identifier and consensus bookkeeping types (`NodeId`, `TermInfo`, `EntryMeta`)
//! - The replicated payload taxonomy (`Payload`, `ServerConfiguration`)
//! - Persisted snapshot structures (`Snapshot`, `SnapshotState`)
//! - Node configuration (`RaftConfig`) with construction-time validation

#![deny(unsafe_code)]

pub mod config;
pub mod types;

pub use config::{ConfigError, RaftConfig};
pub use types::{
    ApplicationData, EntryMeta, LogEntry, NodeId, Payload, ServerConfiguration, Snapshot,
    SnapshotState, TermInfo,
};

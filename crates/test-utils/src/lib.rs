//! Shared test utilities for Lodestone crates.
//!
//! This crate provides common test doubles to reduce boilerplate across
//! test modules:
//!
//! - [`RecordingCohort`] - a `RecoveryCohort` that records every invocation
//! - [`MemoryPersistence`] - an in-memory `PersistenceProvider`
//! - [`strategies`] - proptest generators for domain values

#![deny(unsafe_code)]

mod cohort;
pub use cohort::{CohortCall, InjectedFailure, RecordingCohort};

mod persistence;
pub use persistence::MemoryPersistence;

pub mod strategies;

//! Shared types, the job store trait, and core utilities for Jobwright.
//!
//! This crate holds everything that both the engine and the storage adapters
//! need to agree on: the persisted job descriptor, identifiers, limits, and
//! the error type. Keeping it separate lets adapter crates build without
//! pulling in the engine.

pub mod descriptor;
pub mod error;
pub mod job_store;
pub mod prelude;
pub mod types;
pub mod utils;

// vim: ts=4

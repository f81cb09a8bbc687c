//! Jobwright is a durable background job engine.
//!
//! # Features
//!
//! - Named dispatch queues with per-queue concurrency
//! - Retries with fixed or exponential backoff and a retry limit
//! - Periodic jobs, delayed starts and deadlines
//! - Start constraints (network, charging) with deferral
//! - Cancellation by id, by tag, or all at once, including running jobs
//! - Persistence through a pluggable job store and restore after restart

use std::sync::OnceLock;

pub mod app;
pub mod opts;

// Re-export shared types and the engine
pub use jobwright_core::{builder, clock, config, constraint, job, manager, queue, registry, retry, store, unit};
pub use jobwright_core::{
	CancelReason, Job, JobBuilder, JobContext, JobCreator, JobError, JobKind, JobRegistry, Manager,
	ManagerBuilder, ManagerConfig, RetryConstraint,
};
pub use jobwright_types::{descriptor, error, job_store, lock, types};

pub use app::{App, AppBuilder};
pub use opts::AppOpts;

pub mod prelude {
	pub use crate::app::{App, AppBuilder};
	pub use jobwright_core::{Job, JobBuilder, JobContext, JobError, RetryConstraint};
	pub use jobwright_types::prelude::*;
}

use jobwright_types::prelude::*;

static DEFAULT_APP: OnceLock<App> = OnceLock::new();

/// Make `app` the process-wide default. Can be done once.
pub fn set_default(app: App) -> JwResult<()> {
	DEFAULT_APP.set(app).map_err(|_| Error::Internal("default app already set".into()))
}

/// The process-wide default app, if one was set
pub fn default_app() -> Option<&'static App> {
	DEFAULT_APP.get()
}

// vim: ts=4

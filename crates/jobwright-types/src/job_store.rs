//! Persistence port for job descriptors.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{descriptor::JobDescriptor, prelude::*};

/// Durable storage for job descriptors, keyed by job id.
///
/// Implementations must return from `load` and `load_all` exactly what was
/// saved, and `load_all` must yield descriptors in the order they were first
/// saved. `delete` of an unknown id is not an error.
#[async_trait]
pub trait JobStore: Debug + Send + Sync {
	/// Insert or replace
	async fn save(&self, descriptor: &JobDescriptor) -> JwResult<()>;

	async fn load(&self, id: JobId) -> JwResult<Option<JobDescriptor>>;

	async fn load_all(&self) -> JwResult<Vec<JobDescriptor>>;

	async fn delete(&self, id: JobId) -> JwResult<()>;
}

// vim: ts=4

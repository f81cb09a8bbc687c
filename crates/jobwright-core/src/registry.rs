//! Mapping from job kind to behavior.

use parking_lot::RwLock;
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};

use crate::{job::Job, prelude::*};

/// Rebuilds job behavior from a persisted kind and params.
///
/// A creator answers `Ok(None)` for kinds it does not know, so several
/// creators can be chained.
pub trait JobCreator: Send + Sync {
	fn create(&self, kind: &str, params: &Value) -> JwResult<Option<Arc<dyn Job>>>;
}

/// A job type that can build itself from params
pub trait JobKind: Job + 'static {
	fn kind() -> &'static str
	where
		Self: Sized;
	fn build(params: &Value) -> JwResult<Arc<dyn Job>>
	where
		Self: Sized;
}

type JobBuilderFn = dyn Fn(&Value) -> JwResult<Arc<dyn Job>> + Send + Sync;

// JobRegistry
//*************
#[derive(Default)]
pub struct JobRegistry {
	builders: RwLock<HashMap<Box<str>, Arc<JobBuilderFn>>>,
}

impl JobRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register<T: JobKind>(&self) -> JwResult<&Self> {
		info!("Registering job kind {}", T::kind());
		self.register_fn(T::kind(), T::build)
	}

	pub fn register_fn<F>(&self, kind: &str, builder: F) -> JwResult<&Self>
	where
		F: Fn(&Value) -> JwResult<Arc<dyn Job>> + Send + Sync + 'static,
	{
		if kind.trim().is_empty() {
			return Err(Error::ValidationError("job kind must not be empty".into()));
		}
		if self.builders.write().insert(kind.into(), Arc::new(builder)).is_some() {
			warn!("Job kind {} registered twice, keeping the latest", kind);
		}
		Ok(self)
	}

	pub fn kinds(&self) -> Vec<Box<str>> {
		let mut kinds: Vec<Box<str>> = self.builders.read().keys().cloned().collect();
		kinds.sort();
		kinds
	}
}

impl JobCreator for JobRegistry {
	fn create(&self, kind: &str, params: &Value) -> JwResult<Option<Arc<dyn Job>>> {
		// Builders run outside the lock
		let builder = self.builders.read().get(kind).cloned();
		builder.map(|build| build(params)).transpose()
	}
}

impl std::fmt::Debug for JobRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("JobRegistry").field("kinds", &self.kinds()).finish()
	}
}


// vim: ts=4

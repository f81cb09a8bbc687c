//! Job manager: the public entry point of the engine.
//!
//! Owns the named dispatch queues (created on first use), resolves job
//! behavior through the registered creators, and restores persisted jobs
//! after a restart.

use futures::future::try_join_all;
use itertools::Itertools;
use parking_lot::RwLock;
use serde_json::Value;
use std::{
	collections::HashMap,
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
};

use crate::{
	builder::JobBuilder,
	config::ManagerConfig,
	constraint::{AlwaysSatisfied, ConstraintPredicate},
	job::Job,
	prelude::*,
	queue::{CancelFilter, DispatchQueue, Enqueued, QueueSettings, QueueStats},
	registry::JobCreator,
	store::InMemoryJobStore,
};
use jobwright_types::{
	descriptor::{JobDescriptor, JobOptions},
	job_store::JobStore,
};

// ManagerBuilder
//****************
#[derive(Default)]
pub struct ManagerBuilder {
	config: ManagerConfig,
	store: Option<Arc<dyn JobStore>>,
	predicate: Option<Arc<dyn ConstraintPredicate>>,
	creators: Vec<Arc<dyn JobCreator>>,
}

impl ManagerBuilder {
	pub fn config(mut self, config: ManagerConfig) -> Self {
		self.config = config;
		self
	}

	pub fn store(mut self, store: Arc<dyn JobStore>) -> Self {
		self.store = Some(store);
		self
	}

	pub fn predicate(mut self, predicate: Arc<dyn ConstraintPredicate>) -> Self {
		self.predicate = Some(predicate);
		self
	}

	/// Add a creator; creators are asked in the order they were added
	pub fn creator(mut self, creator: Arc<dyn JobCreator>) -> Self {
		self.creators.push(creator);
		self
	}

	pub fn build(self) -> Manager {
		let store = self.store.unwrap_or_else(|| {
			warn!("No job store configured, jobs will not survive a restart");
			Arc::new(InMemoryJobStore::new())
		});
		if self.creators.is_empty() {
			warn!("Job manager built without creators, every submission will fail");
		}
		Manager {
			inner: Arc::new(ManagerInner {
				config: self.config,
				store,
				predicate: self.predicate.unwrap_or_else(|| Arc::new(AlwaysSatisfied)),
				creators: self.creators,
				queues: RwLock::new(HashMap::new()),
				restored: AtomicBool::new(false),
				paused: AtomicBool::new(false),
				closed: AtomicBool::new(false),
			}),
		}
	}
}

// Manager
//*********
struct ManagerInner {
	config: ManagerConfig,
	store: Arc<dyn JobStore>,
	predicate: Arc<dyn ConstraintPredicate>,
	creators: Vec<Arc<dyn JobCreator>>,
	queues: RwLock<HashMap<Box<str>, DispatchQueue>>,
	restored: AtomicBool,
	paused: AtomicBool,
	closed: AtomicBool,
}

#[derive(Clone)]
pub struct Manager {
	inner: Arc<ManagerInner>,
}

impl std::fmt::Debug for Manager {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("Manager")
			.field("config", &self.inner.config)
			.field("store", &self.inner.store)
			.field("queues", &self.queue_names())
			.finish_non_exhaustive()
	}
}

impl Manager {
	pub fn builder() -> ManagerBuilder {
		ManagerBuilder::default()
	}

	pub fn config(&self) -> &ManagerConfig {
		&self.inner.config
	}

	pub fn store(&self) -> &Arc<dyn JobStore> {
		&self.inner.store
	}

	/// Start building a job of `kind` to submit to this manager
	pub fn job(&self, kind: &str) -> JobBuilder {
		JobBuilder::new(kind)
	}

	fn create_job(&self, kind: &str, params: &Value) -> JwResult<Arc<dyn Job>> {
		for creator in &self.inner.creators {
			if let Some(job) = creator.create(kind, params)? {
				return Ok(job);
			}
		}
		Err(Error::CreatorNotFound(kind.into()))
	}

	/// The queue called `name`, started on first use
	fn queue(&self, name: &str) -> JwResult<DispatchQueue> {
		if let Some(queue) = self.inner.queues.read().get(name) {
			return Ok(queue.clone());
		}
		let mut queues = self.inner.queues.write();
		// `shutdown` drains the map after setting the flag
		self.ensure_open()?;
		let queue = queues
			.entry(name.into())
			.or_insert_with(|| {
				let queue = DispatchQueue::spawn(
					name,
					QueueSettings::from_config(&self.inner.config, name),
					Arc::clone(&self.inner.store),
					Arc::clone(&self.inner.predicate),
				);
				if self.inner.paused.load(Ordering::Acquire) && queue.pause().is_err() {
					warn!("Queue '{}' closed right after start", name);
				}
				queue
			})
			.clone();
		Ok(queue)
	}

	fn queues(&self) -> Vec<DispatchQueue> {
		self.inner.queues.read().values().cloned().collect()
	}

	fn queue_names(&self) -> Vec<Box<str>> {
		self.inner.queues.read().keys().cloned().sorted().collect()
	}

	fn ensure_open(&self) -> JwResult<()> {
		if self.inner.closed.load(Ordering::Acquire) { Err(Error::QueueClosed) } else { Ok(()) }
	}

	/// Validate, persist and schedule a job. Returns its id, or the id of the
	/// live job sharing its single-instance key.
	pub async fn submit(&self, opts: JobOptions) -> JwResult<JobId> {
		self.ensure_open()?;
		opts.validate()?;
		let job = self.create_job(&opts.kind, &opts.params)?;
		let descriptor = JobDescriptor::new(opts, &self.inner.config.default_queue, Timestamp::now());
		debug!("Submitting job {} ({}) to '{}'", descriptor.id(), descriptor.kind(), descriptor.queue());
		let enqueued = self.queue(descriptor.queue())?.enqueue(descriptor, job).await?;
		Ok(enqueued.id())
	}

	async fn cancel(&self, filter: CancelFilter) -> JwResult<usize> {
		let counts = try_join_all(self.queues().iter().map(|q| q.cancel(filter.clone()))).await?;
		Ok(counts.into_iter().sum())
	}

	/// Cancel every live job in every queue
	pub async fn cancel_all(&self) -> JwResult<usize> {
		self.cancel(CancelFilter::All).await
	}

	pub async fn cancel_by_tag(&self, tag: &str) -> JwResult<usize> {
		self.cancel(CancelFilter::Tag(tag.into())).await
	}

	pub async fn cancel_by_id(&self, id: JobId) -> JwResult<bool> {
		Ok(self.cancel(CancelFilter::Id(id)).await? > 0)
	}

	/// Load persisted jobs and put them back on their queues.
	///
	/// Allowed once per manager. Jobs that were running when the process
	/// stopped are scheduled again; jobs whose kind no creator knows are
	/// skipped and left in the store.
	pub async fn restore(&self) -> JwResult<usize> {
		self.ensure_open()?;
		if self.inner.restored.swap(true, Ordering::AcqRel) {
			return Err(Error::AlreadyRestored);
		}

		let descriptors = self.inner.store.load_all().await?;
		info!("Restoring {} persisted job(s)", descriptors.len());

		let mut restored = 0;
		for mut descriptor in descriptors {
			let id = descriptor.id();
			if descriptor.state().is_terminal() {
				warn!("Dropping finished job {} ({}) left in store", id, descriptor.state());
				if let Err(err) = self.inner.store.delete(id).await {
					error!("Cannot delete finished job {}: {}", id, err);
				}
				continue;
			}
			if descriptor.reclassify_interrupted() {
				info!("Job {} ({}) was interrupted, scheduling it again", id, descriptor.kind());
			}
			let job = match self.create_job(descriptor.kind(), descriptor.params()) {
				Ok(job) => job,
				Err(err) => {
					error!("Cannot restore job {} ({}): {}", id, descriptor.kind(), err);
					continue;
				}
			};
			match self.queue(descriptor.queue())?.enqueue(descriptor, job).await? {
				Enqueued::Added(_) => restored += 1,
				Enqueued::Existing(_) => debug!("Job {} is already live, not restored", id),
			}
		}
		Ok(restored)
	}

	pub fn pause(&self) -> JwResult<()> {
		self.inner.paused.store(true, Ordering::Release);
		self.queues().iter().try_for_each(DispatchQueue::pause)
	}

	pub fn resume(&self) -> JwResult<()> {
		self.inner.paused.store(false, Ordering::Release);
		self.queues().iter().try_for_each(DispatchQueue::resume)
	}

	/// Tell every queue that start constraints may have changed
	pub fn constraints_changed(&self) -> JwResult<()> {
		self.queues().iter().try_for_each(DispatchQueue::wake)
	}

	/// Per-queue load, sorted by queue name
	pub fn stats(&self) -> Vec<(Box<str>, QueueStats)> {
		self.inner
			.queues
			.read()
			.iter()
			.map(|(name, queue)| (name.clone(), queue.stats()))
			.sorted_by(|a, b| a.0.cmp(&b.0))
			.collect()
	}

	/// Wait until no queue owns a live job
	pub async fn wait_idle(&self) -> JwResult<()> {
		try_join_all(self.queues().iter().map(DispatchQueue::wait_idle)).await?;
		Ok(())
	}

	/// Stop all queues. Persisted descriptors are kept for the next restore.
	pub async fn shutdown(&self) -> JwResult<()> {
		if self.inner.closed.swap(true, Ordering::AcqRel) {
			return Ok(());
		}
		let queues: Vec<DispatchQueue> = self.inner.queues.write().drain().map(|(_, q)| q).collect();
		info!("Shutting down {} queue(s)", queues.len());
		for queue in queues {
			if let Err(err) = queue.shutdown().await {
				warn!("Queue '{}' did not shut down cleanly: {}", queue.name(), err);
			}
		}
		Ok(())
	}
}

// vim: ts=4

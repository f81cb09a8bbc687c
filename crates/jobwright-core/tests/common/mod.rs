//! Shared fixtures for engine tests
#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use async_trait::async_trait;
use std::{
	sync::{
		Arc, Mutex,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	time::Duration,
};
use tokio::sync::{Notify, RwLock, RwLockWriteGuard};

use jobwright_core::{
	CancelReason, Job, JobContext, JobError, JobRegistry, Manager, ManagerConfig, RetryConstraint,
	store::InMemoryJobStore,
};
use jobwright_types::{descriptor::JobDescriptor, job_store::JobStore, prelude::*};

pub const WAIT: Duration = Duration::from_secs(5);

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

// TestJob
//*********

/// Job that counts its callbacks and can be told to fail or to run long
#[derive(Debug)]
pub struct TestJob {
	pub on_run: AtomicUsize,
	pub on_retry: AtomicUsize,
	pub on_complete: AtomicUsize,
	pub on_cancel: AtomicUsize,
	pub cancel_reasons: Mutex<Vec<CancelReason>>,
	/// Attempts whose body has returned
	pub returned: AtomicUsize,
	fail: Option<JobError>,
	retry: RetryConstraint,
	duration: Duration,
	/// When set, each attempt waits for `release` and ignores cancellation
	gate: Option<Notify>,
	removed: Notify,
}

impl TestJob {
	fn build(fail: Option<JobError>, retry: RetryConstraint, duration: Duration, gated: bool) -> Arc<Self> {
		Arc::new(Self {
			on_run: AtomicUsize::new(0),
			on_retry: AtomicUsize::new(0),
			on_complete: AtomicUsize::new(0),
			on_cancel: AtomicUsize::new(0),
			cancel_reasons: Mutex::new(Vec::new()),
			returned: AtomicUsize::new(0),
			fail,
			retry,
			duration,
			gate: gated.then(Notify::new),
			removed: Notify::new(),
		})
	}

	fn with(fail: Option<JobError>, retry: RetryConstraint, duration: Duration) -> Arc<Self> {
		Self::build(fail, retry, duration, false)
	}

	/// Each attempt blocks until `release` and never checks for cancellation
	pub fn gated(fail: Option<JobError>, retry: RetryConstraint) -> Arc<Self> {
		Self::build(fail, retry, Duration::ZERO, true)
	}

	/// Let one waiting (or the next) gated attempt return
	pub fn release(&self) {
		if let Some(gate) = &self.gate {
			gate.notify_one();
		}
	}

	/// Wait until `n` attempt bodies have returned
	pub async fn wait_returned(&self, n: usize) {
		tokio::time::timeout(WAIT, async {
			while self.returned.load(Ordering::SeqCst) < n {
				tokio::time::sleep(Duration::from_millis(5)).await;
			}
		})
		.await
		.expect("job did not return in time");
	}

	pub fn succeeding() -> Arc<Self> {
		Self::with(None, RetryConstraint::Cancel, Duration::ZERO)
	}

	/// Fails every attempt and answers `retry` when asked
	pub fn failing(retry: RetryConstraint) -> Arc<Self> {
		Self::with(Some(JobError::failed("always failing")), retry, Duration::ZERO)
	}

	/// Runs for `duration` unless cancelled first
	pub fn long_running(duration: Duration) -> Arc<Self> {
		Self::with(None, RetryConstraint::Cancel, duration)
	}

	pub fn runs(&self) -> usize {
		self.on_run.load(Ordering::SeqCst)
	}
	pub fn retries(&self) -> usize {
		self.on_retry.load(Ordering::SeqCst)
	}
	pub fn completions(&self) -> usize {
		self.on_complete.load(Ordering::SeqCst)
	}
	pub fn cancels(&self) -> usize {
		self.on_cancel.load(Ordering::SeqCst)
	}

	pub fn last_cancel_reason(&self) -> Option<CancelReason> {
		self.cancel_reasons.lock().unwrap().last().cloned()
	}

	/// Wait for `on_complete` or `on_cancel`
	pub async fn wait_removed(&self) {
		tokio::time::timeout(WAIT, self.removed.notified())
			.await
			.expect("job was not removed in time");
	}

	/// Wait until the job has started at least `n` attempts
	pub async fn wait_runs(&self, n: usize) {
		tokio::time::timeout(WAIT, async {
			while self.runs() < n {
				tokio::time::sleep(Duration::from_millis(5)).await;
			}
		})
		.await
		.expect("job did not run in time");
	}
}

#[async_trait]
impl Job for TestJob {
	async fn on_run(&self, ctx: &JobContext) -> Result<(), JobError> {
		self.on_run.fetch_add(1, Ordering::SeqCst);
		if let Some(gate) = &self.gate {
			gate.notified().await;
		} else if !self.duration.is_zero() {
			ctx.sleep(self.duration).await?;
		}
		self.returned.fetch_add(1, Ordering::SeqCst);
		match &self.fail {
			Some(err) => Err(err.clone()),
			None => Ok(()),
		}
	}

	fn on_retry(&self, _error: &JobError) -> RetryConstraint {
		self.on_retry.fetch_add(1, Ordering::SeqCst);
		self.retry
	}

	fn on_complete(&self) {
		self.on_complete.fetch_add(1, Ordering::SeqCst);
		self.removed.notify_one();
	}

	fn on_cancel(&self, reason: &CancelReason) {
		self.on_cancel.fetch_add(1, Ordering::SeqCst);
		self.cancel_reasons.lock().unwrap().push(reason.clone());
		self.removed.notify_one();
	}
}

// Recorder
//**********

/// Job that appends its name to a shared log and tracks peak concurrency
#[derive(Debug)]
pub struct Recorder {
	name: &'static str,
	log: Arc<Mutex<Vec<&'static str>>>,
	active: Arc<AtomicUsize>,
	peak: Arc<AtomicUsize>,
	duration: Duration,
	done: Arc<Notify>,
}

#[derive(Debug, Default)]
pub struct RecorderShared {
	pub log: Arc<Mutex<Vec<&'static str>>>,
	pub active: Arc<AtomicUsize>,
	pub peak: Arc<AtomicUsize>,
	pub done: Arc<Notify>,
}

impl RecorderShared {
	pub fn job(&self, name: &'static str, duration: Duration) -> Arc<Recorder> {
		Arc::new(Recorder {
			name,
			log: Arc::clone(&self.log),
			active: Arc::clone(&self.active),
			peak: Arc::clone(&self.peak),
			duration,
			done: Arc::clone(&self.done),
		})
	}

	pub fn log(&self) -> Vec<&'static str> {
		self.log.lock().unwrap().clone()
	}

	pub fn peak(&self) -> usize {
		self.peak.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl Job for Recorder {
	async fn on_run(&self, ctx: &JobContext) -> Result<(), JobError> {
		let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
		self.peak.fetch_max(now_active, Ordering::SeqCst);
		self.log.lock().unwrap().push(self.name);
		let res = ctx.sleep(self.duration).await;
		self.active.fetch_sub(1, Ordering::SeqCst);
		res
	}

	fn on_retry(&self, _error: &JobError) -> RetryConstraint {
		RetryConstraint::Cancel
	}

	fn on_complete(&self) {
		self.done.notify_one();
	}
}

// Stores
//********

/// Store whose writes always fail
#[derive(Debug, Default)]
pub struct FailingStore;

#[async_trait]
impl JobStore for FailingStore {
	async fn save(&self, _descriptor: &JobDescriptor) -> JwResult<()> {
		Err(Error::DbError)
	}

	async fn load(&self, _id: JobId) -> JwResult<Option<JobDescriptor>> {
		Ok(None)
	}

	async fn load_all(&self) -> JwResult<Vec<JobDescriptor>> {
		Ok(Vec::new())
	}

	async fn delete(&self, _id: JobId) -> JwResult<()> {
		Err(Error::DbError)
	}
}

/// In-memory store whose deletes fail while `fail_delete` is set
#[derive(Debug, Default)]
pub struct StickyStore {
	pub inner: InMemoryJobStore,
	pub fail_delete: AtomicBool,
}

impl StickyStore {
	pub fn failing_deletes() -> Arc<Self> {
		Arc::new(Self { inner: InMemoryJobStore::new(), fail_delete: AtomicBool::new(true) })
	}
}

#[async_trait]
impl JobStore for StickyStore {
	async fn save(&self, descriptor: &JobDescriptor) -> JwResult<()> {
		self.inner.save(descriptor).await
	}

	async fn load(&self, id: JobId) -> JwResult<Option<JobDescriptor>> {
		self.inner.load(id).await
	}

	async fn load_all(&self) -> JwResult<Vec<JobDescriptor>> {
		self.inner.load_all().await
	}

	async fn delete(&self, id: JobId) -> JwResult<()> {
		if self.fail_delete.load(Ordering::SeqCst) {
			return Err(Error::DbError);
		}
		self.inner.delete(id).await
	}
}

/// In-memory store whose writes wait while a test holds the gate
#[derive(Debug, Default)]
pub struct GatedStore {
	pub inner: InMemoryJobStore,
	gate: RwLock<()>,
}

impl GatedStore {
	/// Block every save and delete until the guard is dropped
	pub async fn hold(&self) -> RwLockWriteGuard<'_, ()> {
		self.gate.write().await
	}
}

#[async_trait]
impl JobStore for GatedStore {
	async fn save(&self, descriptor: &JobDescriptor) -> JwResult<()> {
		let _open = self.gate.read().await;
		self.inner.save(descriptor).await
	}

	async fn load(&self, id: JobId) -> JwResult<Option<JobDescriptor>> {
		self.inner.load(id).await
	}

	async fn load_all(&self) -> JwResult<Vec<JobDescriptor>> {
		self.inner.load_all().await
	}

	async fn delete(&self, id: JobId) -> JwResult<()> {
		let _open = self.gate.read().await;
		self.inner.delete(id).await
	}
}

// Manager setup
//***************

/// Registry that hands out the given instances by kind
pub fn registry(jobs: &[(&str, Arc<dyn Job>)]) -> Arc<JobRegistry> {
	let registry = JobRegistry::new();
	for (kind, job) in jobs {
		let job = Arc::clone(job);
		registry.register_fn(kind, move |_| Ok(Arc::clone(&job))).unwrap();
	}
	Arc::new(registry)
}

pub fn manager_with(
	config: ManagerConfig,
	store: Arc<dyn JobStore>,
	jobs: &[(&str, Arc<dyn Job>)],
) -> Manager {
	init_tracing();
	Manager::builder().config(config).store(store).creator(registry(jobs)).build()
}

/// Manager over an in-memory store with a single job kind
pub fn manager(kind: &str, job: Arc<dyn Job>) -> (Manager, Arc<InMemoryJobStore>) {
	let store = Arc::new(InMemoryJobStore::new());
	let manager = manager_with(ManagerConfig::default(), store.clone(), &[(kind, job)]);
	(manager, store)
}

// vim: ts=4

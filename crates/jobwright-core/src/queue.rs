//! Dispatch queue.
//!
//! Each named queue is a single task that owns its entries, its clock and its
//! running count. Everything that touches queue state (submissions, cancel
//! requests, attempt outcomes, timer wake-ups) arrives on that task and is
//! handled one at a time, so there is no locking around the schedule.
//!
//! A descriptor is persisted before it becomes visible to the dispatcher and
//! before each attempt starts; its persisted record is deleted before the
//! final callback fires.

use std::{
	collections::HashMap,
	fmt,
	sync::Arc,
	time::Duration,
};
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::{
	clock::{self, SchedulerClock},
	config::ManagerConfig,
	constraint::ConstraintPredicate,
	job::{CancelReason, Job, JobError},
	prelude::*,
	retry::{RetryDecision, RetryPolicy},
	unit::{ExecutionUnit, Outcome, UnitHandle},
};
use jobwright_types::{descriptor::JobDescriptor, job_store::JobStore};

/// Which live jobs a cancel request applies to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CancelFilter {
	All,
	Tag(Box<str>),
	Id(JobId),
}

impl CancelFilter {
	fn matches(&self, descriptor: &JobDescriptor) -> bool {
		match self {
			CancelFilter::All => true,
			CancelFilter::Tag(tag) => descriptor.has_tag(tag),
			CancelFilter::Id(id) => descriptor.id() == *id,
		}
	}
}

/// Result of handing a descriptor to a queue
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enqueued {
	Added(JobId),
	/// A live job with the same id or single-instance key already exists
	Existing(JobId),
}

impl Enqueued {
	pub fn id(self) -> JobId {
		match self {
			Enqueued::Added(id) | Enqueued::Existing(id) => id,
		}
	}
}

/// Snapshot of a queue's load
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
	/// Scheduled, not yet due
	pub waiting: usize,
	/// Due, waiting for a slot or for constraints
	pub ready: usize,
	pub running: usize,
	/// Ready but held back by unmet constraints
	pub deferred: usize,
	pub paused: bool,
}

impl QueueStats {
	/// Jobs the queue still owns
	pub fn live(&self) -> usize {
		self.waiting + self.ready + self.running
	}
}

enum QueueCommand {
	Enqueue { descriptor: JobDescriptor, job: Arc<dyn Job>, reply: oneshot::Sender<JwResult<Enqueued>> },
	Cancel { filter: CancelFilter, reply: oneshot::Sender<usize> },
	Pause(bool),
	Wake,
	Shutdown { reply: oneshot::Sender<()> },
}

/// Timings and limits a queue runs with
#[derive(Clone, Debug)]
pub struct QueueSettings {
	pub concurrency: usize,
	pub policy: RetryPolicy,
	pub recheck_interval: Duration,
	pub persist_retry_delay: Duration,
}

impl QueueSettings {
	pub fn from_config(config: &ManagerConfig, queue: &str) -> Self {
		Self {
			concurrency: config.concurrency_for(queue).get(),
			policy: RetryPolicy::new(config.max_backoff),
			recheck_interval: config.recheck_interval,
			persist_retry_delay: config.persist_retry_delay,
		}
	}
}

// DispatchQueue
//***************

/// Cheap, cloneable handle to a running queue task
#[derive(Clone)]
pub struct DispatchQueue {
	name: Arc<str>,
	tx: flume::Sender<QueueCommand>,
	stats: watch::Receiver<QueueStats>,
}

impl fmt::Debug for DispatchQueue {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("DispatchQueue")
			.field("name", &self.name)
			.field("stats", &*self.stats.borrow())
			.finish_non_exhaustive()
	}
}

impl DispatchQueue {
	/// Start the queue task. Must be called within a tokio runtime.
	pub fn spawn(
		name: &str,
		settings: QueueSettings,
		store: Arc<dyn JobStore>,
		predicate: Arc<dyn ConstraintPredicate>,
	) -> Self {
		let name: Arc<str> = name.into();
		let (tx, rx_cmd) = flume::unbounded();
		let (tx_outcome, rx_outcome) = flume::unbounded();
		let (tx_stats, stats) = watch::channel(QueueStats::default());

		let worker = QueueWorker {
			name: Arc::clone(&name),
			concurrency: settings.concurrency.max(1),
			policy: settings.policy,
			recheck_interval: settings.recheck_interval,
			persist_retry_delay: settings.persist_retry_delay,
			store,
			predicate,
			clock: SchedulerClock::new(),
			entries: HashMap::new(),
			running: 0,
			deferred: 0,
			paused: false,
			units_token: CancellationToken::new(),
			tx_outcome,
			tx_stats,
		};
		info!("Queue '{}' started (concurrency {})", name, worker.concurrency);
		tokio::spawn(worker.run(rx_cmd, rx_outcome));

		Self { name, tx, stats }
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub async fn enqueue(&self, descriptor: JobDescriptor, job: Arc<dyn Job>) -> JwResult<Enqueued> {
		let (reply, rx) = oneshot::channel();
		self.send(QueueCommand::Enqueue { descriptor, job, reply })?;
		rx.await.map_err(|_| Error::QueueClosed)?
	}

	/// Cancel matching live jobs; returns how many were cancelled
	pub async fn cancel(&self, filter: CancelFilter) -> JwResult<usize> {
		let (reply, rx) = oneshot::channel();
		self.send(QueueCommand::Cancel { filter, reply })?;
		rx.await.map_err(|_| Error::QueueClosed)
	}

	pub fn pause(&self) -> JwResult<()> {
		self.send(QueueCommand::Pause(true))
	}

	pub fn resume(&self) -> JwResult<()> {
		self.send(QueueCommand::Pause(false))
	}

	/// Re-evaluate ready jobs now, e.g. after platform conditions changed
	pub fn wake(&self) -> JwResult<()> {
		self.send(QueueCommand::Wake)
	}

	pub fn stats(&self) -> QueueStats {
		*self.stats.borrow()
	}

	/// Wait until the queue owns no live job
	pub async fn wait_idle(&self) -> JwResult<()> {
		let mut stats = self.stats.clone();
		stats.wait_for(|s| s.live() == 0).await.map(|_| ()).map_err(|_| Error::QueueClosed)
	}

	/// Stop the queue task. Running attempts are signalled, persisted
	/// descriptors are left as they are for a later restore.
	pub async fn shutdown(&self) -> JwResult<()> {
		let (reply, rx) = oneshot::channel();
		self.send(QueueCommand::Shutdown { reply })?;
		rx.await.map_err(|_| Error::QueueClosed)
	}

	fn send(&self, cmd: QueueCommand) -> JwResult<()> {
		self.tx.send(cmd).map_err(|_| Error::QueueClosed)
	}
}

// QueueWorker
//*************
struct QueueEntry {
	descriptor: JobDescriptor,
	job: Arc<dyn Job>,
	unit: Option<UnitHandle>,
	/// Set once a cancel request has been accepted for a running attempt
	cancel_reason: Option<CancelReason>,
}

struct QueueWorker {
	name: Arc<str>,
	concurrency: usize,
	policy: RetryPolicy,
	recheck_interval: Duration,
	persist_retry_delay: Duration,
	store: Arc<dyn JobStore>,
	predicate: Arc<dyn ConstraintPredicate>,
	clock: SchedulerClock,
	entries: HashMap<JobId, QueueEntry>,
	running: usize,
	deferred: usize,
	paused: bool,
	/// Parent of every attempt's cancellation token
	units_token: CancellationToken,
	tx_outcome: flume::Sender<(JobId, Outcome)>,
	tx_stats: watch::Sender<QueueStats>,
}

impl QueueWorker {
	async fn run(
		mut self,
		rx_cmd: flume::Receiver<QueueCommand>,
		rx_outcome: flume::Receiver<(JobId, Outcome)>,
	) {
		loop {
			self.dispatch_ready().await;
			self.publish_stats();
			let wake = self.next_wake();

			tokio::select! {
				// Commands before outcomes
				biased;
				cmd = rx_cmd.recv_async() => match cmd {
					Ok(QueueCommand::Shutdown { reply }) => {
						self.stop();
						let _ = reply.send(());
						break;
					}
					Ok(cmd) => self.handle_command(cmd).await,
					Err(_) => {
						self.stop();
						break;
					}
				},
				Ok((id, outcome)) = rx_outcome.recv_async() => self.handle_outcome(id, outcome).await,
				() = clock::sleep_until(wake) => {}
			}
		}
		info!("Queue '{}' stopped", self.name);
	}

	fn next_wake(&self) -> Option<Timestamp> {
		let next = self.clock.next_wake();
		if self.deferred > 0 && !self.paused {
			let recheck = Timestamp::from_now(self.recheck_interval);
			return Some(next.map_or(recheck, |n| n.min(recheck)));
		}
		next
	}

	fn publish_stats(&self) {
		self.tx_stats.send_replace(QueueStats {
			waiting: self.clock.waiting_len(),
			ready: self.clock.ready_len(),
			running: self.running,
			deferred: self.deferred,
			paused: self.paused,
		});
	}

	fn stop(&mut self) {
		debug!("Queue '{}' stopping with {} running", self.name, self.running);
		self.units_token.cancel();
	}

	async fn handle_command(&mut self, cmd: QueueCommand) {
		match cmd {
			QueueCommand::Enqueue { descriptor, job, reply } => {
				let res = self.enqueue(descriptor, job).await;
				self.publish_stats();
				let _ = reply.send(res);
			}
			QueueCommand::Cancel { filter, reply } => {
				let count = self.cancel_matching(&filter).await;
				self.publish_stats();
				let _ = reply.send(count);
			}
			QueueCommand::Pause(paused) => {
				info!("Queue '{}' {}", self.name, if paused { "paused" } else { "resumed" });
				self.paused = paused;
			}
			QueueCommand::Wake => {}
			// Handled by the loop
			QueueCommand::Shutdown { .. } => {}
		}
	}

	async fn enqueue(&mut self, mut descriptor: JobDescriptor, job: Arc<dyn Job>) -> JwResult<Enqueued> {
		let id = descriptor.id();
		if self.entries.contains_key(&id) {
			debug!("Job {} already queued in '{}'", id, self.name);
			return Ok(Enqueued::Existing(id));
		}
		// Entries with an accepted cancel only wait for their attempt to report back
		if let Some(key) = descriptor.single_instance()
			&& let Some(existing) = self
				.entries
				.values()
				.find(|e| e.cancel_reason.is_none() && e.descriptor.single_instance() == Some(key))
		{
			info!("Job {} deduplicated by key '{}' into {}", id, key, existing.descriptor.id());
			return Ok(Enqueued::Existing(existing.descriptor.id()));
		}

		descriptor.mark_scheduled()?;
		self.store.save(&descriptor).await.inspect_err(|err| {
			error!("Queue '{}': failed to persist job {}: {}", self.name, id, err);
		})?;

		debug!("Job {} ({}) scheduled at {}", id, descriptor.kind(), descriptor.not_before());
		self.clock.insert(id, descriptor.wake_at());
		self.entries.insert(id, QueueEntry { descriptor, job, unit: None, cancel_reason: None });
		Ok(Enqueued::Added(id))
	}

	async fn dispatch_ready(&mut self) {
		let now = Timestamp::now();
		self.clock.promote(now);
		self.deferred = 0;
		if self.paused {
			return;
		}

		for id in self.clock.ready() {
			let Some(entry) = self.entries.get(&id) else {
				warn!("Queue '{}': dropping unknown job {} from schedule", self.name, id);
				self.clock.remove(id);
				continue;
			};
			if entry.descriptor.deadline_passed(now) {
				self.finalize_cancelled(id, CancelReason::DeadlineExceeded).await;
				continue;
			}
			if self.running >= self.concurrency {
				continue;
			}
			self.start(id).await;
		}
	}

	async fn start(&mut self, id: JobId) {
		let Some(entry) = self.entries.get(&id) else { return };

		let mut attempt = entry.descriptor.clone();
		let unit = match ExecutionUnit::prepare(
			&mut attempt,
			Arc::clone(&entry.job),
			self.predicate.as_ref(),
			&self.units_token,
		) {
			Ok(Some(unit)) => unit,
			Ok(None) => {
				trace!("Job {} deferred: constraints not met", id);
				self.deferred += 1;
				return;
			}
			Err(err) => {
				error!("Queue '{}': cannot start job {}: {}", self.name, id, err);
				return;
			}
		};

		if let Err(err) = self.store.save(&attempt).await {
			error!(
				"Queue '{}': failed to persist start of job {}: {}, retrying in {:?}",
				self.name, id, err, self.persist_retry_delay
			);
			if let Some(entry) = self.entries.get_mut(&id) {
				entry.descriptor.postpone(Timestamp::from_now(self.persist_retry_delay));
				self.clock.insert(id, entry.descriptor.wake_at());
			}
			return;
		}

		self.clock.remove(id);
		let handle = unit.handle();
		let tx_outcome = self.tx_outcome.clone();
		info!("Running job {} ({}) attempt {}", id, attempt.kind(), attempt.run_count());
		unit.spawn(move |id, outcome| {
			if tx_outcome.send((id, outcome)).is_err() {
				debug!("Outcome of job {} dropped: queue stopped", id);
			}
		});
		if let Some(entry) = self.entries.get_mut(&id) {
			entry.descriptor = attempt;
			entry.unit = Some(handle);
		}
		self.running += 1;
	}

	async fn handle_outcome(&mut self, id: JobId, outcome: Outcome) {
		let Some(entry) = self.entries.get_mut(&id) else {
			warn!("Queue '{}': outcome for unknown job {}", self.name, id);
			return;
		};
		if entry.unit.take().is_none() {
			warn!("Queue '{}': outcome for job {} which is not running", self.name, id);
			return;
		}
		self.running = self.running.saturating_sub(1);
		let pending_cancel = entry.cancel_reason.take();

		match (outcome, pending_cancel) {
			(Outcome::CancelledMidRun, reason) => {
				self.finalize_cancelled(id, reason.unwrap_or(CancelReason::Requested)).await;
			}
			(Outcome::Success, pending) => self.on_success(id, pending).await,
			// A failure that raced a cancel request is not retried
			(Outcome::Failure(_), Some(reason)) => self.finalize_cancelled(id, reason).await,
			(Outcome::Failure(err), None) => self.on_failure(id, err).await,
		}
	}

	async fn on_success(&mut self, id: JobId, pending_cancel: Option<CancelReason>) {
		let Some(entry) = self.entries.get_mut(&id) else { return };
		match entry.descriptor.mark_succeeded(Timestamp::now()) {
			Ok(true) => {
				if let Some(reason) = pending_cancel {
					self.finalize_cancelled(id, reason).await;
					return;
				}
				debug!(
					"Job {} periodic run {} done, next at {}",
					id,
					entry.descriptor.periodic_count(),
					entry.descriptor.not_before()
				);
				self.persist_reschedule(id).await;
			}
			Ok(false) => self.finalize_completed(id).await,
			Err(err) => {
				error!("Queue '{}': job {} succeeded in unexpected state: {}", self.name, id, err);
			}
		}
	}

	async fn on_failure(&mut self, id: JobId, err: JobError) {
		let Some(entry) = self.entries.get_mut(&id) else { return };
		warn!("Job {} ({}) attempt {} failed: {}", id, entry.descriptor.kind(), entry.descriptor.run_count(), err);
		entry.descriptor.record_error(&err);

		let job = Arc::clone(&entry.job);
		let decision =
			self.policy.decide(&mut entry.descriptor, &err, |e| job.on_retry(e), Timestamp::now());
		match decision {
			Ok(RetryDecision::Retry(delay)) => {
				info!("Retrying job {} in {:?} (retry {})", id, delay, entry.descriptor.retry_count());
				if let Err(err) = entry.descriptor.mark_rescheduled() {
					error!("Queue '{}': cannot reschedule job {}: {}", self.name, id, err);
				}
				self.persist_reschedule(id).await;
			}
			Ok(RetryDecision::Cancel(reason)) => self.finalize_cancelled(id, reason).await,
			Err(decide_err) => {
				error!("Queue '{}': retry decision for job {} failed: {}", self.name, id, decide_err);
				self.finalize_cancelled(id, CancelReason::ConstraintCancel(err)).await;
			}
		}
	}

	/// Persist a job that goes back on the schedule. A failed write is logged
	/// and the in-memory schedule goes ahead.
	async fn persist_reschedule(&mut self, id: JobId) {
		let Some(entry) = self.entries.get(&id) else { return };
		if let Err(err) = self.store.save(&entry.descriptor).await {
			error!("Queue '{}': failed to persist reschedule of job {}: {}", self.name, id, err);
		}
		self.clock.insert(id, entry.descriptor.wake_at());
	}

	async fn cancel_matching(&mut self, filter: &CancelFilter) -> usize {
		let ids: Vec<JobId> = self
			.entries
			.values()
			.filter(|e| e.cancel_reason.is_none() && filter.matches(&e.descriptor))
			.map(|e| e.descriptor.id())
			.collect();

		let mut count = 0;
		for id in ids {
			let Some(entry) = self.entries.get_mut(&id) else { continue };
			match entry.unit.as_ref().map(UnitHandle::request_cancel) {
				Some(won) => {
					// Finalized when the attempt reports back
					if !won {
						debug!("Job {} finished before cancel, honoring its result", id);
					}
					entry.cancel_reason = Some(CancelReason::Requested);
					if let Err(err) = self.store.delete(id).await {
						error!("Queue '{}': failed to delete cancelled job {}: {}", self.name, id, err);
					}
				}
				None => self.finalize_cancelled(id, CancelReason::Requested).await,
			}
			count += 1;
		}
		if count > 0 {
			info!("Queue '{}': cancelled {} job(s) ({:?})", self.name, count, filter);
		}
		count
	}

	/// Drop the persisted record of a finished job. If the delete fails the
	/// record is overwritten with the terminal descriptor, which `restore`
	/// discards.
	async fn remove_persisted(&self, descriptor: &JobDescriptor) {
		let id = descriptor.id();
		let Err(err) = self.store.delete(id).await else { return };
		warn!("Queue '{}': failed to delete {} job {}: {}", self.name, descriptor.state(), id, err);
		if let Err(err) = self.store.save(descriptor).await {
			error!("Queue '{}': job {} left in store as {}: {}", self.name, id, descriptor.state(), err);
		}
	}

	async fn finalize_completed(&mut self, id: JobId) {
		let Some(entry) = self.entries.remove(&id) else { return };
		self.clock.remove(id);
		self.remove_persisted(&entry.descriptor).await;
		info!("Job {} ({}) completed after {} run(s)", id, entry.descriptor.kind(), entry.descriptor.run_count());
		entry.job.on_complete();
	}

	async fn finalize_cancelled(&mut self, id: JobId, reason: CancelReason) {
		let Some(mut entry) = self.entries.remove(&id) else { return };
		self.clock.remove(id);
		if let Err(err) = entry.descriptor.mark_cancelled() {
			warn!("Queue '{}': {}", self.name, err);
		}
		self.remove_persisted(&entry.descriptor).await;
		info!("Job {} ({}) cancelled: {}", id, entry.descriptor.kind(), reason);
		entry.job.on_cancel(&reason);
	}
}

// vim: ts=4

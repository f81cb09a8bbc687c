//! Persisted job descriptor and its lifecycle.
//!
//! A `JobDescriptor` is the durable part of a job: identity, configuration
//! and progress counters. Behavior lives elsewhere and is rebuilt from
//! `kind` and `params` on restore. All state changes go through the
//! transition methods below, which reject moves out of a terminal state.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeSet, fmt, time::Duration};

use crate::prelude::*;

// JobState
//**********
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
	Idle,
	Scheduled,
	Running,
	Retrying,
	Completed,
	Cancelled,
}

impl JobState {
	pub fn is_terminal(self) -> bool {
		matches!(self, JobState::Completed | JobState::Cancelled)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			JobState::Idle => "idle",
			JobState::Scheduled => "scheduled",
			JobState::Running => "running",
			JobState::Retrying => "retrying",
			JobState::Completed => "completed",
			JobState::Cancelled => "cancelled",
		}
	}
}

impl fmt::Display for JobState {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

// Requirements
//**************

/// Minimum connectivity a job needs before it may start
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkRequirement {
	/// Runs regardless of connectivity
	#[default]
	Any,
	/// Needs at least a cellular connection
	Cellular,
	Wifi,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
	pub network: NetworkRequirement,
	pub charging: bool,
}

// JobOptions
//************

/// Submission parameters, produced by the job builder.
#[derive(Clone, Debug, PartialEq)]
pub struct JobOptions {
	pub kind: Box<str>,
	pub queue: Option<Box<str>>,
	pub tags: BTreeSet<Box<str>>,
	pub params: Value,
	pub retry_limit: Limit,
	/// `Limited(0)` means the job is not periodic
	pub periodic_limit: Limit,
	pub periodic_interval: Duration,
	pub initial_delay: Duration,
	pub deadline: Option<Timestamp>,
	pub single_instance: Option<Box<str>>,
	pub requirements: Requirements,
}

impl JobOptions {
	pub fn new(kind: impl Into<Box<str>>) -> Self {
		Self {
			kind: kind.into(),
			queue: None,
			tags: BTreeSet::new(),
			params: Value::Null,
			retry_limit: Limit::Limited(0),
			periodic_limit: Limit::Limited(0),
			periodic_interval: Duration::ZERO,
			initial_delay: Duration::ZERO,
			deadline: None,
			single_instance: None,
			requirements: Requirements::default(),
		}
	}

	pub fn validate(&self) -> JwResult<()> {
		if self.kind.trim().is_empty() {
			return Err(Error::ValidationError("job kind must not be empty".into()));
		}
		if self.queue.as_deref().is_some_and(|q| q.trim().is_empty()) {
			return Err(Error::ValidationError("queue name must not be empty".into()));
		}
		if self.tags.iter().any(|t| t.trim().is_empty()) {
			return Err(Error::ValidationError("tags must not be empty".into()));
		}
		if self.single_instance.as_deref().is_some_and(|k| k.trim().is_empty()) {
			return Err(Error::ValidationError("single instance key must not be empty".into()));
		}
		Ok(())
	}
}

// JobDescriptor
//***************
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
	id: JobId,
	kind: Box<str>,
	queue: Box<str>,
	tags: BTreeSet<Box<str>>,
	params: Value,
	single_instance: Option<Box<str>>,
	retry_limit: Limit,
	periodic_limit: Limit,
	periodic_interval: Duration,
	deadline: Option<Timestamp>,
	requirements: Requirements,
	created_at: Timestamp,
	state: JobState,
	run_count: u32,
	retry_count: u32,
	periodic_count: u32,
	not_before: Timestamp,
	/// Last exponential delay handed out
	backoff: Duration,
	last_error: Option<Box<str>>,
}

impl JobDescriptor {
	/// Build a fresh descriptor in the `Idle` state.
	pub fn new(opts: JobOptions, default_queue: &str, now: Timestamp) -> Self {
		Self {
			id: JobId::new(),
			kind: opts.kind,
			queue: opts.queue.unwrap_or_else(|| default_queue.into()),
			tags: opts.tags,
			params: opts.params,
			single_instance: opts.single_instance,
			retry_limit: opts.retry_limit,
			periodic_limit: opts.periodic_limit,
			periodic_interval: opts.periodic_interval,
			deadline: opts.deadline,
			requirements: opts.requirements,
			created_at: now,
			state: JobState::Idle,
			run_count: 0,
			retry_count: 0,
			periodic_count: 0,
			not_before: now.after(opts.initial_delay),
			backoff: Duration::ZERO,
			last_error: None,
		}
	}

	pub fn id(&self) -> JobId {
		self.id
	}
	pub fn kind(&self) -> &str {
		&self.kind
	}
	pub fn queue(&self) -> &str {
		&self.queue
	}
	pub fn tags(&self) -> &BTreeSet<Box<str>> {
		&self.tags
	}
	pub fn has_tag(&self, tag: &str) -> bool {
		self.tags.contains(tag)
	}
	pub fn params(&self) -> &Value {
		&self.params
	}
	pub fn single_instance(&self) -> Option<&str> {
		self.single_instance.as_deref()
	}
	pub fn retry_limit(&self) -> Limit {
		self.retry_limit
	}
	pub fn periodic_limit(&self) -> Limit {
		self.periodic_limit
	}
	pub fn periodic_interval(&self) -> Duration {
		self.periodic_interval
	}
	pub fn deadline(&self) -> Option<Timestamp> {
		self.deadline
	}
	pub fn requirements(&self) -> Requirements {
		self.requirements
	}
	pub fn created_at(&self) -> Timestamp {
		self.created_at
	}
	pub fn state(&self) -> JobState {
		self.state
	}
	pub fn run_count(&self) -> u32 {
		self.run_count
	}
	pub fn retry_count(&self) -> u32 {
		self.retry_count
	}
	pub fn periodic_count(&self) -> u32 {
		self.periodic_count
	}
	pub fn not_before(&self) -> Timestamp {
		self.not_before
	}
	pub fn backoff(&self) -> Duration {
		self.backoff
	}
	pub fn last_error(&self) -> Option<&str> {
		self.last_error.as_deref()
	}

	pub fn is_periodic(&self) -> bool {
		self.periodic_limit != Limit::Limited(0)
	}

	/// Whether the retry budget is used up
	pub fn retries_exhausted(&self) -> bool {
		!self.retry_limit.allows(self.retry_count)
	}

	/// Earliest instant the scheduler has to look at this job again:
	/// either it becomes eligible or its deadline passes.
	pub fn wake_at(&self) -> Timestamp {
		match self.deadline {
			Some(deadline) => self.not_before.min(deadline),
			None => self.not_before,
		}
	}

	pub fn deadline_passed(&self, now: Timestamp) -> bool {
		self.deadline.is_some_and(|d| d <= now)
	}

	fn transition(&mut self, allowed: &[JobState], to: JobState) -> JwResult<()> {
		if self.state.is_terminal() || !allowed.contains(&self.state) {
			return Err(Error::InvalidTransition { id: self.id, from: self.state, to });
		}
		self.state = to;
		Ok(())
	}

	/// Accept into a queue. Restored descriptors are already `Scheduled`.
	pub fn mark_scheduled(&mut self) -> JwResult<()> {
		self.transition(&[JobState::Idle, JobState::Scheduled], JobState::Scheduled)
	}

	/// Begin an attempt
	pub fn mark_running(&mut self) -> JwResult<()> {
		self.transition(&[JobState::Scheduled], JobState::Running)?;
		self.run_count = self.run_count.saturating_add(1);
		Ok(())
	}

	/// Record a retry decision taking effect after `delay`
	pub fn mark_retrying(&mut self, delay: Duration, now: Timestamp) -> JwResult<()> {
		self.transition(&[JobState::Running], JobState::Retrying)?;
		self.retry_count = self.retry_count.saturating_add(1);
		self.not_before = now.after(delay);
		Ok(())
	}

	/// Put a retrying job back on the schedule
	pub fn mark_rescheduled(&mut self) -> JwResult<()> {
		self.transition(&[JobState::Retrying], JobState::Scheduled)
	}

	/// Record a successful attempt.
	///
	/// Returns `true` if another periodic repetition is due, in which case the
	/// job is `Scheduled` again one interval from `now`. Otherwise it is `Completed`.
	pub fn mark_succeeded(&mut self, now: Timestamp) -> JwResult<bool> {
		if self.state != JobState::Running {
			return Err(Error::InvalidTransition {
				id: self.id,
				from: self.state,
				to: JobState::Completed,
			});
		}
		self.periodic_count = self.periodic_count.saturating_add(1);
		if self.is_periodic() && self.periodic_limit.allows(self.periodic_count) {
			self.state = JobState::Scheduled;
			self.not_before = now.after(self.periodic_interval);
			Ok(true)
		} else {
			self.state = JobState::Completed;
			Ok(false)
		}
	}

	pub fn mark_cancelled(&mut self) -> JwResult<()> {
		self.transition(
			&[JobState::Idle, JobState::Scheduled, JobState::Running, JobState::Retrying],
			JobState::Cancelled,
		)
	}

	/// Recover a descriptor persisted mid-attempt. Returns `true` if it was
	/// reclassified.
	pub fn reclassify_interrupted(&mut self) -> bool {
		match self.state {
			JobState::Running | JobState::Retrying | JobState::Idle => {
				self.state = JobState::Scheduled;
				true
			}
			_ => false,
		}
	}

	/// Push the eligibility time back without touching counters
	pub fn postpone(&mut self, until: Timestamp) {
		self.not_before = until;
	}

	pub fn set_backoff(&mut self, backoff: Duration) {
		self.backoff = backoff;
	}

	pub fn record_error(&mut self, error: impl fmt::Display) {
		self.last_error = Some(error.to_string().into());
	}
}


// vim: ts=4

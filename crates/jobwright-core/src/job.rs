//! Job behavior contract and the context handed to a running attempt.

use async_trait::async_trait;
use serde_json::Value;
use std::{fmt, fmt::Debug, time::Duration};
use tokio_util::sync::CancellationToken;

use crate::prelude::*;
use jobwright_types::descriptor::JobDescriptor;

/// Follow-up a job asks for after a failed attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryConstraint {
	/// Retry after a fixed delay
	Retry(Duration),
	/// Retry after `initial * 2^retry_count`
	Exponential(Duration),
	/// Exponential backoff that never waits longer than `max`
	ExponentialWithLimit { initial: Duration, max: Duration },
	/// Give up now
	Cancel,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobError {
	Failed(String),
	/// The attempt stopped because it observed a cancellation request
	Interrupted,
}

impl JobError {
	pub fn failed(msg: impl Into<String>) -> Self {
		JobError::Failed(msg.into())
	}
}

impl fmt::Display for JobError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			JobError::Failed(msg) => write!(f, "failed: {}", msg),
			JobError::Interrupted => write!(f, "interrupted"),
		}
	}
}

impl std::error::Error for JobError {}

impl From<Error> for JobError {
	fn from(err: Error) -> Self {
		JobError::Failed(err.to_string())
	}
}

/// Why a job ended in `Cancelled`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CancelReason {
	/// `cancel_all`, `cancel_by_tag` or `cancel_by_id`
	Requested,
	RetryLimitReached(JobError),
	/// The job answered `RetryConstraint::Cancel`
	ConstraintCancel(JobError),
	DeadlineExceeded,
}

impl fmt::Display for CancelReason {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			CancelReason::Requested => write!(f, "cancel requested"),
			CancelReason::RetryLimitReached(err) => write!(f, "retry limit reached ({})", err),
			CancelReason::ConstraintCancel(err) => write!(f, "cancelled by job ({})", err),
			CancelReason::DeadlineExceeded => write!(f, "deadline exceeded"),
		}
	}
}

// JobContext
//************

/// Per-attempt view a job gets while running
#[derive(Clone, Debug)]
pub struct JobContext {
	id: JobId,
	kind: Box<str>,
	attempt: u32,
	params: Value,
	token: CancellationToken,
}

impl JobContext {
	pub(crate) fn new(descriptor: &JobDescriptor, token: CancellationToken) -> Self {
		Self {
			id: descriptor.id(),
			kind: descriptor.kind().into(),
			attempt: descriptor.run_count(),
			params: descriptor.params().clone(),
			token,
		}
	}

	pub(crate) fn token(&self) -> CancellationToken {
		self.token.clone()
	}

	pub fn id(&self) -> JobId {
		self.id
	}

	pub fn kind(&self) -> &str {
		&self.kind
	}

	/// 1-based number of this attempt
	pub fn attempt(&self) -> u32 {
		self.attempt
	}

	pub fn params(&self) -> &Value {
		&self.params
	}

	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}

	/// Resolves once cancellation of this attempt has been requested
	pub async fn cancelled(&self) {
		self.token.cancelled().await;
	}

	/// Bail out with `JobError::Interrupted` if cancellation was requested
	pub fn checkpoint(&self) -> Result<(), JobError> {
		if self.is_cancelled() { Err(JobError::Interrupted) } else { Ok(()) }
	}

	/// Sleep that wakes early with `JobError::Interrupted` on cancellation
	pub async fn sleep(&self, duration: Duration) -> Result<(), JobError> {
		tokio::select! {
			() = self.token.cancelled() => Err(JobError::Interrupted),
			() = tokio::time::sleep(duration) => Ok(()),
		}
	}
}

// Job
//*****

/// Behavior of one job kind.
///
/// `on_run` may be invoked many times over the life of a job. `on_complete`
/// and `on_cancel` are each invoked at most once, and never both.
#[async_trait]
pub trait Job: Send + Sync + Debug {
	async fn on_run(&self, ctx: &JobContext) -> Result<(), JobError>;

	/// Classify a failed attempt. Not consulted once the retry limit is reached.
	fn on_retry(&self, error: &JobError) -> RetryConstraint;

	fn on_complete(&self) {}

	fn on_cancel(&self, _reason: &CancelReason) {}
}

// vim: ts=4

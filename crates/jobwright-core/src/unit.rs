//! Execution unit: one attempt of one job.
//!
//! The unit and a cancel request race on a single atomic phase. Whichever
//! side moves it out of `RUNNING` first decides the outcome, so an attempt is
//! reported exactly once as either finished or cancelled.

use std::sync::{
	Arc,
	atomic::{AtomicU8, Ordering},
};
use tokio_util::sync::CancellationToken;

use crate::{
	constraint::ConstraintPredicate,
	job::{Job, JobContext, JobError},
	prelude::*,
};
use jobwright_types::descriptor::JobDescriptor;

const RUNNING: u8 = 0;
const FINISHED: u8 = 1;
const CANCEL_REQUESTED: u8 = 2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
	Success,
	Failure(JobError),
	/// A cancel request won the race; the job result is discarded
	CancelledMidRun,
}

/// Queue-side handle of an active unit
#[derive(Debug)]
pub struct UnitHandle {
	phase: Arc<AtomicU8>,
	token: CancellationToken,
}

impl UnitHandle {
	/// Ask the attempt to stop. Returns `false` if it already finished.
	pub fn request_cancel(&self) -> bool {
		let won = self
			.phase
			.compare_exchange(RUNNING, CANCEL_REQUESTED, Ordering::AcqRel, Ordering::Acquire)
			.is_ok();
		if won {
			self.token.cancel();
		}
		won
	}

	pub fn is_cancel_requested(&self) -> bool {
		self.phase.load(Ordering::Acquire) == CANCEL_REQUESTED
	}
}

pub struct ExecutionUnit {
	id: JobId,
	job: Arc<dyn Job>,
	ctx: JobContext,
	phase: Arc<AtomicU8>,
}

impl ExecutionUnit {
	/// Admit an attempt: check start constraints, then move the descriptor
	/// to `Running`. Returns `None` if constraints are not met, leaving the
	/// descriptor untouched.
	pub fn prepare(
		descriptor: &mut JobDescriptor,
		job: Arc<dyn Job>,
		predicate: &dyn ConstraintPredicate,
		parent: &CancellationToken,
	) -> JwResult<Option<Self>> {
		if !predicate.is_satisfied(descriptor) {
			return Ok(None);
		}
		descriptor.mark_running()?;
		let ctx = JobContext::new(descriptor, parent.child_token());
		Ok(Some(Self { id: descriptor.id(), job, ctx, phase: Arc::new(AtomicU8::new(RUNNING)) }))
	}

	pub fn id(&self) -> JobId {
		self.id
	}

	pub fn handle(&self) -> UnitHandle {
		UnitHandle { phase: Arc::clone(&self.phase), token: self.ctx.token() }
	}

	/// Run the attempt on its own task and pass the outcome to `report`
	pub fn spawn<F>(self, report: F)
	where
		F: FnOnce(JobId, Outcome) + Send + 'static,
	{
		tokio::spawn(async move {
			let outcome = self.run().await;
			report(self.id, outcome);
		});
	}

	pub async fn run(&self) -> Outcome {
		let job = Arc::clone(&self.job);
		let ctx = self.ctx.clone();
		// Inner task so a panicking job surfaces as a JoinError
		let result = match tokio::spawn(async move { job.on_run(&ctx).await }).await {
			Ok(result) => result,
			Err(err) => {
				error!("Job {} ({}) panicked: {}", self.id, self.ctx.kind(), err);
				Err(JobError::failed(format!("job panicked: {}", err)))
			}
		};
		self.settle(result)
	}

	fn settle(&self, result: Result<(), JobError>) -> Outcome {
		if self
			.phase
			.compare_exchange(RUNNING, FINISHED, Ordering::AcqRel, Ordering::Acquire)
			.is_err()
		{
			return Outcome::CancelledMidRun;
		}
		match result {
			Ok(()) => Outcome::Success,
			Err(err) => Outcome::Failure(err),
		}
	}
}


// vim: ts=4

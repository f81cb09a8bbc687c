//! Retry policy evaluation.
//!
//! After a failed attempt the queue asks the policy what to do next. The
//! retry limit is checked first; only when budget remains is the job asked
//! for its `RetryConstraint`.

use std::time::Duration;

use crate::{
	job::{CancelReason, JobError, RetryConstraint},
	prelude::*,
};
use jobwright_types::descriptor::JobDescriptor;

pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(24 * 3600);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryDecision {
	Retry(Duration),
	Cancel(CancelReason),
}

#[derive(Clone, Debug)]
pub struct RetryPolicy {
	max_backoff: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self { max_backoff: DEFAULT_MAX_BACKOFF }
	}
}

impl RetryPolicy {
	pub fn new(max_backoff: Duration) -> Self {
		Self { max_backoff }
	}

	/// `initial * 2^retry_count`, saturating, capped at `cap` and the global maximum
	pub fn calculate_backoff(&self, initial: Duration, retry_count: u32, cap: Option<Duration>) -> Duration {
		let limit = cap.map_or(self.max_backoff, |cap| cap.min(self.max_backoff));
		let delay = 2u32
			.checked_pow(retry_count)
			.and_then(|factor| initial.checked_mul(factor))
			.unwrap_or(if initial.is_zero() { Duration::ZERO } else { Duration::MAX });
		delay.min(limit)
	}

	/// Decide the follow-up of a failed attempt.
	///
	/// On `Retry` the descriptor is moved to `Retrying` with its retry count
	/// incremented and `not_before` set. On `Cancel` it is left untouched.
	/// `on_retry` is only called when the retry budget is not used up.
	pub fn decide<F>(
		&self,
		descriptor: &mut JobDescriptor,
		error: &JobError,
		on_retry: F,
		now: Timestamp,
	) -> JwResult<RetryDecision>
	where
		F: FnOnce(&JobError) -> RetryConstraint,
	{
		if descriptor.retries_exhausted() {
			return Ok(RetryDecision::Cancel(CancelReason::RetryLimitReached(error.clone())));
		}

		let delay = match on_retry(error) {
			RetryConstraint::Retry(delay) => delay,
			RetryConstraint::Exponential(initial) => self.exponential(descriptor, initial, None),
			RetryConstraint::ExponentialWithLimit { initial, max } => {
				self.exponential(descriptor, initial, Some(max))
			}
			RetryConstraint::Cancel => {
				return Ok(RetryDecision::Cancel(CancelReason::ConstraintCancel(error.clone())));
			}
		};

		descriptor.mark_retrying(delay, now)?;
		Ok(RetryDecision::Retry(delay))
	}

	fn exponential(&self, descriptor: &mut JobDescriptor, initial: Duration, cap: Option<Duration>) -> Duration {
		// Never shorter than the delay handed out last time
		let delay = self
			.calculate_backoff(initial, descriptor.retry_count(), cap)
			.max(descriptor.backoff());
		descriptor.set_backoff(delay);
		delay
	}
}


// vim: ts=4

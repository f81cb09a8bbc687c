//! Manager configuration
//!
//! Queue concurrency, backoff cap, and the timings of the dispatch loop.

use std::{collections::HashMap, num::NonZeroUsize, time::Duration};

use crate::retry::DEFAULT_MAX_BACKOFF;

pub const DEFAULT_QUEUE: &str = "default";

/// Settings of a single named queue
#[derive(Clone, Debug)]
pub struct QueueConfig {
	/// Maximum number of jobs running at once
	pub concurrency: NonZeroUsize,
}

impl QueueConfig {
	pub fn new(concurrency: usize) -> Self {
		Self { concurrency: NonZeroUsize::new(concurrency).unwrap_or(NonZeroUsize::MIN) }
	}
}

#[derive(Clone, Debug)]
pub struct ManagerConfig {
	/// Queue used when a job does not name one
	pub default_queue: Box<str>,
	/// Concurrency of queues without an explicit entry in `queues`
	pub default_concurrency: NonZeroUsize,
	pub queues: HashMap<Box<str>, QueueConfig>,
	/// Upper bound of any exponential retry delay
	pub max_backoff: Duration,
	/// How often jobs deferred by unmet constraints are looked at again
	pub recheck_interval: Duration,
	/// Delay before retrying a start whose persistence failed
	pub persist_retry_delay: Duration,
}

impl Default for ManagerConfig {
	fn default() -> Self {
		Self {
			default_queue: DEFAULT_QUEUE.into(),
			default_concurrency: NonZeroUsize::MIN,
			queues: HashMap::new(),
			max_backoff: DEFAULT_MAX_BACKOFF,
			recheck_interval: Duration::from_secs(30),
			persist_retry_delay: Duration::from_secs(5),
		}
	}
}

impl ManagerConfig {
	pub fn with_default_queue(mut self, name: impl Into<Box<str>>) -> Self {
		self.default_queue = name.into();
		self
	}

	pub fn with_concurrency(mut self, concurrency: usize) -> Self {
		self.default_concurrency = NonZeroUsize::new(concurrency).unwrap_or(NonZeroUsize::MIN);
		self
	}

	pub fn with_queue(mut self, name: impl Into<Box<str>>, concurrency: usize) -> Self {
		self.queues.insert(name.into(), QueueConfig::new(concurrency));
		self
	}

	pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
		self.max_backoff = max_backoff;
		self
	}

	pub fn with_recheck_interval(mut self, interval: Duration) -> Self {
		self.recheck_interval = interval;
		self
	}

	pub fn with_persist_retry_delay(mut self, delay: Duration) -> Self {
		self.persist_retry_delay = delay;
		self
	}

	pub fn concurrency_for(&self, queue: &str) -> NonZeroUsize {
		self.queues.get(queue).map_or(self.default_concurrency, |q| q.concurrency)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn per_queue_concurrency_overrides_default() {
		let config = ManagerConfig::default().with_concurrency(3).with_queue("uploads", 8);
		assert_eq!(config.concurrency_for("uploads").get(), 8);
		assert_eq!(config.concurrency_for("other").get(), 3);
	}

	#[test]
	fn zero_concurrency_becomes_one() {
		let config = ManagerConfig::default().with_concurrency(0).with_queue("q", 0);
		assert_eq!(config.default_concurrency.get(), 1);
		assert_eq!(config.concurrency_for("q").get(), 1);
	}
}

// vim: ts=4

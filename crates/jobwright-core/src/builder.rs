//! Fluent job submission API
//!
//! ```ignore
//! manager.job("upload")
//!     .params(json!({ "file": "a.jpg" }))
//!     .add_tag("media")
//!     .retry(3)
//!     .require_network(NetworkRequirement::Wifi)
//!     .schedule(&manager)
//!     .await?;
//! ```

use serde_json::Value;
use std::{collections::BTreeSet, time::Duration};

use crate::{manager::Manager, prelude::*};
use jobwright_types::descriptor::{JobOptions, NetworkRequirement, Requirements};

#[derive(Clone, Debug)]
pub struct JobBuilder {
	kind: String,
	queue: Option<String>,
	tags: BTreeSet<Box<str>>,
	params: Value,
	retry: i64,
	periodic: i64,
	interval: Duration,
	delay: Duration,
	deadline: Option<Timestamp>,
	single_instance: Option<String>,
	requirements: Requirements,
}

impl JobBuilder {
	pub fn new(kind: impl Into<String>) -> Self {
		Self {
			kind: kind.into(),
			queue: None,
			tags: BTreeSet::new(),
			params: Value::Null,
			retry: 0,
			periodic: 0,
			interval: Duration::ZERO,
			delay: Duration::ZERO,
			deadline: None,
			single_instance: None,
			requirements: Requirements::default(),
		}
	}

	/// Queue to run on instead of the manager's default
	pub fn queue(mut self, name: impl Into<String>) -> Self {
		self.queue = Some(name.into());
		self
	}

	pub fn add_tag(mut self, tag: impl Into<Box<str>>) -> Self {
		self.tags.insert(tag.into());
		self
	}

	pub fn tags<I, T>(mut self, tags: I) -> Self
	where
		I: IntoIterator<Item = T>,
		T: Into<Box<str>>,
	{
		self.tags.extend(tags.into_iter().map(Into::into));
		self
	}

	pub fn params(mut self, params: Value) -> Self {
		self.params = params;
		self
	}

	/// Maximum number of retries after failed attempts, `-1` for unlimited
	pub fn retry(mut self, max: i64) -> Self {
		self.retry = max;
		self
	}

	/// Repeat after each success, `limit` runs in total (`-1` for unlimited),
	/// waiting `interval` between runs
	pub fn periodic(mut self, limit: i64, interval: Duration) -> Self {
		self.periodic = limit;
		self.interval = interval;
		self
	}

	pub fn delay(mut self, delay: Duration) -> Self {
		self.delay = delay;
		self
	}

	/// Cancel the job if it has not completed by `deadline`
	pub fn deadline(mut self, deadline: Timestamp) -> Self {
		self.deadline = Some(deadline);
		self
	}

	/// At most one live job per key; later submissions return the live one's id
	pub fn single_instance(mut self, key: impl Into<String>) -> Self {
		self.single_instance = Some(key.into());
		self
	}

	pub fn require_network(mut self, network: NetworkRequirement) -> Self {
		self.requirements.network = network;
		self
	}

	pub fn require_charging(mut self, charging: bool) -> Self {
		self.requirements.charging = charging;
		self
	}

	pub fn build(self) -> JwResult<JobOptions> {
		let retry_limit = Limit::from_i64(self.retry)
			.map_err(|_| Error::ValidationError(format!("invalid retry limit {}", self.retry)))?;
		let periodic_limit = Limit::from_i64(self.periodic)
			.map_err(|_| Error::ValidationError(format!("invalid periodic limit {}", self.periodic)))?;

		let opts = JobOptions {
			kind: self.kind.into(),
			queue: self.queue.map(Into::into),
			tags: self.tags,
			params: self.params,
			retry_limit,
			periodic_limit,
			periodic_interval: self.interval,
			initial_delay: self.delay,
			deadline: self.deadline,
			single_instance: self.single_instance.map(Into::into),
			requirements: self.requirements,
		};
		opts.validate()?;
		Ok(opts)
	}

	pub async fn schedule(self, manager: &Manager) -> JwResult<JobId> {
		manager.submit(self.build()?).await
	}
}


// vim: ts=4

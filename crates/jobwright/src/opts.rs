//! Environment-driven options

use std::{env, str::FromStr, time::Duration};

use jobwright_core::ManagerConfig;
use jobwright_types::prelude::*;

pub const ENV_CONCURRENCY: &str = "JOBWRIGHT_CONCURRENCY";
pub const ENV_DEFAULT_QUEUE: &str = "JOBWRIGHT_DEFAULT_QUEUE";
pub const ENV_MAX_BACKOFF_MS: &str = "JOBWRIGHT_MAX_BACKOFF_MS";
pub const ENV_RECHECK_MS: &str = "JOBWRIGHT_RECHECK_MS";

#[derive(Clone, Debug, Default)]
pub struct AppOpts {
	pub config: ManagerConfig,
	/// Restore persisted jobs when the app is built
	pub restore: bool,
}

impl AppOpts {
	/// Defaults overridden by `JOBWRIGHT_*` environment variables
	pub fn from_env() -> JwResult<Self> {
		Self::from_lookup(|key| env::var(key).ok())
	}

	pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> JwResult<Self> {
		let mut config = ManagerConfig::default();
		if let Some(queue) = lookup(ENV_DEFAULT_QUEUE).filter(|q| !q.trim().is_empty()) {
			config = config.with_default_queue(queue);
		}
		if let Some(n) = parse::<usize>(&lookup, ENV_CONCURRENCY)? {
			config = config.with_concurrency(n);
		}
		if let Some(ms) = parse::<u64>(&lookup, ENV_MAX_BACKOFF_MS)? {
			config = config.with_max_backoff(Duration::from_millis(ms));
		}
		if let Some(ms) = parse::<u64>(&lookup, ENV_RECHECK_MS)? {
			config = config.with_recheck_interval(Duration::from_millis(ms));
		}
		Ok(Self { config, restore: true })
	}
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> JwResult<Option<T>> {
	lookup(key)
		.map(|raw| {
			raw.trim()
				.parse::<T>()
				.map_err(|_| Error::ValidationError(format!("{} must be a number, got '{}'", key, raw)))
		})
		.transpose()
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used)]
	use super::*;
	use std::collections::HashMap;

	fn opts(vars: &[(&str, &str)]) -> JwResult<AppOpts> {
		let vars: HashMap<String, String> =
			vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
		AppOpts::from_lookup(|key| vars.get(key).cloned())
	}

	#[test]
	fn defaults_without_env() {
		let opts = opts(&[]).unwrap();
		assert_eq!(&*opts.config.default_queue, "default");
		assert_eq!(opts.config.default_concurrency.get(), 1);
		assert!(opts.restore);
	}

	#[test]
	fn reads_overrides() {
		let opts = opts(&[
			(ENV_DEFAULT_QUEUE, "main"),
			(ENV_CONCURRENCY, "4"),
			(ENV_MAX_BACKOFF_MS, "60000"),
			(ENV_RECHECK_MS, " 250 "),
		])
		.unwrap();
		assert_eq!(&*opts.config.default_queue, "main");
		assert_eq!(opts.config.default_concurrency.get(), 4);
		assert_eq!(opts.config.max_backoff, Duration::from_secs(60));
		assert_eq!(opts.config.recheck_interval, Duration::from_millis(250));
	}

	#[test]
	fn rejects_garbage() {
		assert!(matches!(opts(&[(ENV_CONCURRENCY, "many")]), Err(Error::ValidationError(_))));
	}
}

// vim: ts=4

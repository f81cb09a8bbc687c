//! Common identifiers and value types

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr, time::Duration};
use uuid::Uuid;

use crate::error::{Error, JwResult};

// Timestamp
//***********

/// Wall-clock time in milliseconds since the Unix epoch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
	pub const MAX: Timestamp = Timestamp(i64::MAX);

	pub fn now() -> Timestamp {
		let millis = std::time::SystemTime::now()
			.duration_since(std::time::UNIX_EPOCH)
			.map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
			.unwrap_or_default();
		Timestamp(millis)
	}

	pub fn from_now(delay: Duration) -> Timestamp {
		Self::now().after(delay)
	}

	/// The instant `delay` after this one, saturating at `Timestamp::MAX`
	pub fn after(self, delay: Duration) -> Timestamp {
		let millis = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
		Timestamp(self.0.saturating_add(millis))
	}

	/// Time left from `now` until this instant, zero if already passed
	pub fn duration_since(self, now: Timestamp) -> Duration {
		u64::try_from(self.0.saturating_sub(now.0)).map_or(Duration::ZERO, Duration::from_millis)
	}
}

impl fmt::Display for Timestamp {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match chrono::DateTime::from_timestamp_millis(self.0) {
			Some(dt) => write!(f, "{}", dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
			None => write!(f, "{}", self.0),
		}
	}
}

// JobId
//*******

/// Unique, stable identifier of a job for its whole life
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
	pub fn new() -> JobId {
		JobId(Uuid::new_v4())
	}
}

impl Default for JobId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for JobId {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		fmt::Display::fmt(&self.0, f)
	}
}

impl FromStr for JobId {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Uuid::parse_str(s)
			.map(JobId)
			.map_err(|e| Error::ValidationError(format!("invalid job id '{}': {}", s, e)))
	}
}

// Limit
//*******

/// Count bound used for retries and periodic repetitions.
///
/// Persisted as a plain integer where `-1` means unlimited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Limit {
	Unlimited,
	Limited(u32),
}

impl Limit {
	pub fn from_i64(value: i64) -> JwResult<Limit> {
		match value {
			-1 => Ok(Limit::Unlimited),
			v => u32::try_from(v).map(Limit::Limited).map_err(|_| {
				Error::ValidationError(format!("limit must be -1 or a count >= 0, got {}", v))
			}),
		}
	}

	pub fn as_i64(self) -> i64 {
		match self {
			Limit::Unlimited => -1,
			Limit::Limited(n) => i64::from(n),
		}
	}

	/// Whether `used` leaves room for at least one more
	pub fn allows(self, used: u32) -> bool {
		match self {
			Limit::Unlimited => true,
			Limit::Limited(n) => used < n,
		}
	}
}

impl Serialize for Limit {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_i64(self.as_i64())
	}
}

impl<'de> Deserialize<'de> for Limit {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let raw = i64::deserialize(deserializer)?;
		Limit::from_i64(raw).map_err(serde::de::Error::custom)
	}
}


// vim: ts=4

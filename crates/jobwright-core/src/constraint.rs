//! Start-time constraints. A job whose requirements are not met stays
//! queued and is looked at again on the next recheck or wake-up.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use jobwright_types::descriptor::{JobDescriptor, NetworkRequirement};

pub trait ConstraintPredicate: Send + Sync {
	fn is_satisfied(&self, descriptor: &JobDescriptor) -> bool;
}

/// Accepts everything
#[derive(Debug, Default)]
pub struct AlwaysSatisfied;

impl ConstraintPredicate for AlwaysSatisfied {
	fn is_satisfied(&self, _descriptor: &JobDescriptor) -> bool {
		true
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Connectivity {
	#[default]
	Offline,
	Cellular,
	Wifi,
}

/// Platform conditions set by the host application.
///
/// After changing a condition call `Manager::constraints_changed` so deferred
/// jobs are looked at right away instead of on the next recheck.
#[derive(Debug)]
pub struct StaticConditions {
	connectivity: RwLock<Connectivity>,
	charging: AtomicBool,
}

impl StaticConditions {
	pub fn new(connectivity: Connectivity, charging: bool) -> Self {
		Self { connectivity: RwLock::new(connectivity), charging: AtomicBool::new(charging) }
	}

	pub fn set_connectivity(&self, connectivity: Connectivity) {
		*self.connectivity.write() = connectivity;
	}

	pub fn set_charging(&self, charging: bool) {
		self.charging.store(charging, Ordering::Release);
	}

	pub fn connectivity(&self) -> Connectivity {
		*self.connectivity.read()
	}
}

impl Default for StaticConditions {
	fn default() -> Self {
		Self::new(Connectivity::Wifi, true)
	}
}

impl ConstraintPredicate for StaticConditions {
	fn is_satisfied(&self, descriptor: &JobDescriptor) -> bool {
		let requirements = descriptor.requirements();
		let network_ok = match requirements.network {
			NetworkRequirement::Any => true,
			NetworkRequirement::Cellular => self.connectivity() != Connectivity::Offline,
			NetworkRequirement::Wifi => self.connectivity() == Connectivity::Wifi,
		};
		network_ok && (!requirements.charging || self.charging.load(Ordering::Acquire))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use jobwright_types::{
		descriptor::{JobOptions, Requirements},
		types::Timestamp,
	};

	fn requiring(network: NetworkRequirement, charging: bool) -> JobDescriptor {
		let mut opts = JobOptions::new("upload");
		opts.requirements = Requirements { network, charging };
		JobDescriptor::new(opts, "default", Timestamp(0))
	}

	#[test]
	fn network_levels() {
		let conditions = StaticConditions::new(Connectivity::Cellular, false);
		assert!(conditions.is_satisfied(&requiring(NetworkRequirement::Any, false)));
		assert!(conditions.is_satisfied(&requiring(NetworkRequirement::Cellular, false)));
		assert!(!conditions.is_satisfied(&requiring(NetworkRequirement::Wifi, false)));

		conditions.set_connectivity(Connectivity::Offline);
		assert!(!conditions.is_satisfied(&requiring(NetworkRequirement::Cellular, false)));
		assert!(conditions.is_satisfied(&requiring(NetworkRequirement::Any, false)));
	}

	#[test]
	fn charging_requirement() {
		let conditions = StaticConditions::new(Connectivity::Wifi, false);
		assert!(!conditions.is_satisfied(&requiring(NetworkRequirement::Any, true)));
		conditions.set_charging(true);
		assert!(conditions.is_satisfied(&requiring(NetworkRequirement::Wifi, true)));
	}
}

// vim: ts=4

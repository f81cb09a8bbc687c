//! Per-queue schedule of jobs that are not running.
//!
//! Jobs wait ordered by `(wake_at, seq)` and move to the ready set once their
//! time has come. `seq` is handed out on every insert, so among jobs that are
//! ready at the same time the one inserted first is dispatched first.

use std::collections::{BTreeMap, HashMap};

use crate::prelude::*;

type Seq = u64;

#[derive(Clone, Copy, Debug)]
enum Slot {
	Waiting(Timestamp, Seq),
	Ready(Seq),
}

#[derive(Debug, Default)]
pub struct SchedulerClock {
	waiting: BTreeMap<(Timestamp, Seq), JobId>,
	ready: BTreeMap<Seq, JobId>,
	slots: HashMap<JobId, Slot>,
	next_seq: Seq,
}

impl SchedulerClock {
	pub fn new() -> Self {
		Self::default()
	}

	/// (Re)insert a job to wake at `wake_at`
	pub fn insert(&mut self, id: JobId, wake_at: Timestamp) {
		self.remove(id);
		let seq = self.next_seq;
		self.next_seq += 1;
		self.waiting.insert((wake_at, seq), id);
		self.slots.insert(id, Slot::Waiting(wake_at, seq));
	}

	pub fn remove(&mut self, id: JobId) -> bool {
		match self.slots.remove(&id) {
			Some(Slot::Waiting(at, seq)) => self.waiting.remove(&(at, seq)).is_some(),
			Some(Slot::Ready(seq)) => self.ready.remove(&seq).is_some(),
			None => false,
		}
	}

	pub fn contains(&self, id: JobId) -> bool {
		self.slots.contains_key(&id)
	}

	/// Move every job due at `now` to the ready set
	pub fn promote(&mut self, now: Timestamp) -> usize {
		let mut promoted = 0;
		while let Some(entry) = self.waiting.first_entry() {
			if entry.key().0 > now {
				break;
			}
			let ((_, seq), id) = entry.remove_entry();
			self.ready.insert(seq, id);
			self.slots.insert(id, Slot::Ready(seq));
			promoted += 1;
		}
		promoted
	}

	/// Ready jobs in dispatch order
	pub fn ready(&self) -> Vec<JobId> {
		self.ready.values().copied().collect()
	}

	pub fn next_wake(&self) -> Option<Timestamp> {
		self.waiting.keys().next().map(|(at, _)| *at)
	}

	pub fn waiting_len(&self) -> usize {
		self.waiting.len()
	}

	pub fn ready_len(&self) -> usize {
		self.ready.len()
	}

	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}
}

/// Sleep until `wake`, or forever if there is nothing to wake for
pub async fn sleep_until(wake: Option<Timestamp>) {
	match wake {
		Some(at) => tokio::time::sleep(at.duration_since(Timestamp::now())).await,
		None => std::future::pending().await,
	}
}


// vim: ts=4

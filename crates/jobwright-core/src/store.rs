//! In-memory job store, used when no persistent adapter is configured and
//! in tests. Descriptors are kept serialized so reads go through the same
//! encoding a persistent store would use.

use async_trait::async_trait;
use std::{collections::HashMap, sync::Mutex};

use crate::prelude::*;
use jobwright_types::{descriptor::JobDescriptor, job_store::JobStore, lock};

#[derive(Debug, Default)]
struct Records {
	next_seq: u64,
	jobs: HashMap<JobId, (u64, String)>,
}

// InMemoryJobStore
//******************
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
	records: Mutex<Records>,
}

impl InMemoryJobStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		lock!(self.records, "records").map(|r| r.jobs.len()).unwrap_or_default()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[async_trait]
impl JobStore for InMemoryJobStore {
	async fn save(&self, descriptor: &JobDescriptor) -> JwResult<()> {
		let data = serde_json::to_string(descriptor)?;
		let mut records = lock!(self.records, "records")?;
		let Records { next_seq, jobs } = &mut *records;
		match jobs.get_mut(&descriptor.id()) {
			Some((_, stored)) => *stored = data,
			None => {
				jobs.insert(descriptor.id(), (*next_seq, data));
				*next_seq += 1;
			}
		}
		Ok(())
	}

	async fn load(&self, id: JobId) -> JwResult<Option<JobDescriptor>> {
		let records = lock!(self.records, "records")?;
		records
			.jobs
			.get(&id)
			.map(|(_, data)| serde_json::from_str(data).map_err(Error::from))
			.transpose()
	}

	async fn load_all(&self) -> JwResult<Vec<JobDescriptor>> {
		let records = lock!(self.records, "records")?;
		let mut stored: Vec<&(u64, String)> = records.jobs.values().collect();
		stored.sort_by_key(|(seq, _)| *seq);
		stored
			.into_iter()
			.map(|(_, data)| serde_json::from_str(data).map_err(Error::from))
			.collect()
	}

	async fn delete(&self, id: JobId) -> JwResult<()> {
		lock!(self.records, "records")?.jobs.remove(&id);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used)]
	use super::*;
	use jobwright_types::descriptor::JobOptions;

	fn descriptor(kind: &str) -> JobDescriptor {
		JobDescriptor::new(JobOptions::new(kind), "default", Timestamp::now())
	}

	#[tokio::test]
	async fn save_load_delete() {
		let store = InMemoryJobStore::new();
		let d = descriptor("a");
		store.save(&d).await.unwrap();
		assert_eq!(store.load(d.id()).await.unwrap(), Some(d.clone()));
		store.delete(d.id()).await.unwrap();
		assert_eq!(store.load(d.id()).await.unwrap(), None);
		// Deleting twice is fine
		store.delete(d.id()).await.unwrap();
		assert!(store.is_empty());
	}

	#[tokio::test]
	async fn load_all_keeps_first_save_order() {
		let store = InMemoryJobStore::new();
		let mut a = descriptor("a");
		let b = descriptor("b");
		store.save(&a).await.unwrap();
		store.save(&b).await.unwrap();
		a.mark_scheduled().unwrap();
		store.save(&a).await.unwrap();

		let all = store.load_all().await.unwrap();
		assert_eq!(all, vec![a, b]);
	}
}

// vim: ts=4

//! SQLite job store tests
//!
//! Round-trips descriptors through a database file and checks ordering,
//! upsert and delete semantics.
#![allow(clippy::expect_used, clippy::unwrap_used)]

use jobwright_job_adapter_sqlite::JobAdapterSqlite;
use jobwright_types::{
	descriptor::{JobDescriptor, JobOptions, JobState, NetworkRequirement, Requirements},
	job_store::JobStore,
	types::{JobId, Limit, Timestamp},
};
use std::time::Duration;
use tempfile::TempDir;

async fn create_test_adapter() -> (JobAdapterSqlite, TempDir) {
	let temp_dir = TempDir::new().expect("Failed to create temp directory");
	let adapter = JobAdapterSqlite::new(temp_dir.path().join("jobs.db"))
		.await
		.expect("Failed to create adapter");
	(adapter, temp_dir)
}

fn descriptor(kind: &str, queue: Option<&str>) -> JobDescriptor {
	let mut opts = JobOptions::new(kind);
	opts.queue = queue.map(Into::into);
	let mut d = JobDescriptor::new(opts, "default", Timestamp::now());
	d.mark_scheduled().unwrap();
	d
}

#[tokio::test]
async fn test_roundtrip_preserves_every_field() {
	let (adapter, _temp) = create_test_adapter().await;

	let mut opts = JobOptions::new("upload");
	opts.queue = Some("media".into());
	opts.tags.insert("photos".into());
	opts.params = serde_json::json!({ "path": "/tmp/a.jpg", "sizes": [64, 256] });
	opts.retry_limit = Limit::Unlimited;
	opts.periodic_limit = Limit::Limited(4);
	opts.periodic_interval = Duration::from_millis(2500);
	opts.deadline = Some(Timestamp::from_now(Duration::from_secs(3600)));
	opts.single_instance = Some("upload:a".into());
	opts.requirements = Requirements { network: NetworkRequirement::Wifi, charging: true };
	let mut d = JobDescriptor::new(opts, "default", Timestamp::now());
	d.mark_scheduled().unwrap();
	d.mark_running().unwrap();
	d.set_backoff(Duration::from_millis(400));
	d.record_error("connection reset");

	adapter.save(&d).await.unwrap();
	let loaded = adapter.load(d.id()).await.unwrap();
	assert_eq!(loaded, Some(d));
}

#[tokio::test]
async fn test_load_missing_returns_none() {
	let (adapter, _temp) = create_test_adapter().await;
	assert_eq!(adapter.load(JobId::new()).await.unwrap(), None);
}

#[tokio::test]
async fn test_upsert_keeps_first_save_order() {
	let (adapter, _temp) = create_test_adapter().await;

	let mut first = descriptor("a", None);
	let second = descriptor("b", None);
	adapter.save(&first).await.unwrap();
	adapter.save(&second).await.unwrap();

	first.mark_running().unwrap();
	adapter.save(&first).await.unwrap();

	let all = adapter.load_all().await.unwrap();
	assert_eq!(all.len(), 2);
	assert_eq!(all[0].id(), first.id());
	assert_eq!(all[0].state(), JobState::Running);
	assert_eq!(all[1], second);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
	let (adapter, _temp) = create_test_adapter().await;
	let d = descriptor("a", None);
	adapter.save(&d).await.unwrap();

	adapter.delete(d.id()).await.unwrap();
	adapter.delete(d.id()).await.unwrap();
	assert!(adapter.load_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_and_count_by_queue() {
	let (adapter, _temp) = create_test_adapter().await;
	adapter.save(&descriptor("a", Some("uploads"))).await.unwrap();
	adapter.save(&descriptor("b", None)).await.unwrap();
	adapter.save(&descriptor("c", Some("uploads"))).await.unwrap();

	let uploads = adapter.list(Some("uploads")).await.unwrap();
	let kinds: Vec<&str> = uploads.iter().map(JobDescriptor::kind).collect();
	assert_eq!(kinds, vec!["a", "c"]);

	let counts = adapter.count_by_queue().await.unwrap();
	let expected: Vec<(Box<str>, u64)> = vec![("default".into(), 1), ("uploads".into(), 2)];
	assert_eq!(counts, expected);
}

#[tokio::test]
async fn test_reopen_keeps_jobs() {
	let temp_dir = TempDir::new().expect("Failed to create temp directory");
	let path = temp_dir.path().join("nested").join("jobs.db");
	let d = descriptor("a", None);
	{
		let adapter = JobAdapterSqlite::new(&path).await.unwrap();
		adapter.save(&d).await.unwrap();
	}
	let adapter = JobAdapterSqlite::new(&path).await.unwrap();
	assert_eq!(adapter.load_all().await.unwrap(), vec![d]);
}

// vim: ts=4

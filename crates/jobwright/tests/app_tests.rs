//! App builder tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use async_trait::async_trait;
use serde_json::Value;
use std::{
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
	time::Duration,
};

use jobwright::{
	AppBuilder, AppOpts, ManagerConfig, job_store::JobStore, prelude::*, registry::JobKind,
	store::InMemoryJobStore,
};

static ADDED: AtomicU64 = AtomicU64::new(0);

/// Adds `amount` from its params to a global counter
#[derive(Debug)]
struct AddJob {
	amount: u64,
}

#[async_trait]
impl Job for AddJob {
	async fn on_run(&self, _ctx: &JobContext) -> Result<(), JobError> {
		ADDED.fetch_add(self.amount, Ordering::SeqCst);
		Ok(())
	}

	fn on_retry(&self, _error: &JobError) -> RetryConstraint {
		RetryConstraint::Cancel
	}
}

impl JobKind for AddJob {
	fn kind() -> &'static str {
		"add"
	}

	fn build(params: &Value) -> JwResult<Arc<dyn Job>> {
		let amount = params
			.get("amount")
			.and_then(Value::as_u64)
			.ok_or_else(|| Error::ValidationError("add: missing amount".into()))?;
		Ok(Arc::new(AddJob { amount }))
	}
}

fn builder(store: Arc<InMemoryJobStore>) -> AppBuilder {
	let mut builder =
		AppBuilder::with_opts(AppOpts { config: ManagerConfig::default(), restore: true });
	builder.store(store);
	builder.register::<AddJob>().unwrap();
	builder
}

#[tokio::test]
async fn test_on_init_submits_registered_kind() {
	let store = Arc::new(InMemoryJobStore::new());
	let mut builder = builder(store.clone());
	builder.on_init(|app| async move {
		app.job("add").params(serde_json::json!({ "amount": 7 })).schedule(app.manager()).await?;
		Ok(())
	});
	let app = builder.build().await.unwrap();

	tokio::time::timeout(Duration::from_secs(5), app.wait_idle()).await.unwrap().unwrap();
	assert_eq!(ADDED.load(Ordering::SeqCst) % 100, 7);
	assert!(store.is_empty());
	app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_build_restores_persisted_jobs() {
	let store = Arc::new(InMemoryJobStore::new());
	let first = builder(store.clone()).build().await.unwrap();
	first.pause().unwrap();
	first
		.job("add")
		.params(serde_json::json!({ "amount": 100 }))
		.schedule(first.manager())
		.await
		.unwrap();
	first.shutdown().await.unwrap();
	assert_eq!(store.load_all().await.unwrap().len(), 1);

	let second = builder(store.clone()).build().await.unwrap();
	tokio::time::timeout(Duration::from_secs(5), second.wait_idle()).await.unwrap().unwrap();
	assert!(ADDED.load(Ordering::SeqCst) >= 100);
	assert!(store.is_empty());
	second.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unknown_kind_is_rejected() {
	let app = builder(Arc::new(InMemoryJobStore::new())).build().await.unwrap();
	let res = app.job("nope").schedule(app.manager()).await;
	assert!(matches!(res, Err(Error::CreatorNotFound(_))));

	let res = app.job("add").schedule(app.manager()).await;
	assert!(matches!(res, Err(Error::ValidationError(_))));
	app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_default_app_is_set_once() {
	let app = builder(Arc::new(InMemoryJobStore::new())).build().await.unwrap();
	jobwright::set_default(app.clone()).unwrap();
	assert!(jobwright::default_app().is_some());
	assert!(jobwright::set_default(app.clone()).is_err());
	app.shutdown().await.unwrap();
}

// vim: ts=4

//! Stand-alone runner: SQLite store, a few demo job kinds, Ctrl-C to stop

use async_trait::async_trait;
use serde_json::Value;
use std::{
	env, path,
	sync::{
		Arc,
		atomic::{AtomicU32, Ordering},
	},
	time::Duration,
};
use tracing::info;

use jobwright::{AppBuilder, CancelReason, prelude::*, registry::JobKind};
use jobwright_job_adapter_sqlite::JobAdapterSqlite;

pub struct Config {
	pub db_dir: path::PathBuf,
	/// Submit one job of each demo kind on start
	pub demo: bool,
}

impl Config {
	fn from_env() -> Self {
		let db_dir = env::var("JOBWRIGHT_DB")
			.or_else(|_| env::var("DB_DIR"))
			.unwrap_or_else(|_| "./data".to_string());
		Config {
			db_dir: path::PathBuf::from(db_dir),
			demo: env::var("JOBWRIGHT_DEMO").is_ok_and(|v| v == "1" || v == "true"),
		}
	}
}

// Echo
//******
#[derive(Debug)]
struct Echo {
	message: String,
}

#[async_trait]
impl Job for Echo {
	async fn on_run(&self, ctx: &JobContext) -> Result<(), JobError> {
		info!("echo [{}] attempt {}: {}", ctx.id(), ctx.attempt(), self.message);
		Ok(())
	}

	fn on_retry(&self, _error: &JobError) -> RetryConstraint {
		RetryConstraint::Cancel
	}
}

impl JobKind for Echo {
	fn kind() -> &'static str {
		"echo"
	}

	fn build(params: &Value) -> JwResult<Arc<dyn Job>> {
		let message = params.get("message").and_then(Value::as_str).unwrap_or_default();
		Ok(Arc::new(Echo { message: message.to_string() }))
	}
}

// Sleep
//*******
#[derive(Debug)]
struct Sleep {
	duration: Duration,
}

#[async_trait]
impl Job for Sleep {
	async fn on_run(&self, ctx: &JobContext) -> Result<(), JobError> {
		info!("sleep [{}] for {:?}", ctx.id(), self.duration);
		ctx.sleep(self.duration).await
	}

	fn on_retry(&self, _error: &JobError) -> RetryConstraint {
		RetryConstraint::Retry(Duration::from_secs(1))
	}

	fn on_cancel(&self, reason: &CancelReason) {
		info!("sleep cancelled: {}", reason);
	}
}

impl JobKind for Sleep {
	fn kind() -> &'static str {
		"sleep"
	}

	fn build(params: &Value) -> JwResult<Arc<dyn Job>> {
		let ms = params.get("ms").and_then(Value::as_u64).unwrap_or(1000);
		Ok(Arc::new(Sleep { duration: Duration::from_millis(ms) }))
	}
}

// Flaky
//*******
/// Fails its first `failures` attempts
#[derive(Debug)]
struct Flaky {
	failures: u32,
	attempts: AtomicU32,
}

#[async_trait]
impl Job for Flaky {
	async fn on_run(&self, ctx: &JobContext) -> Result<(), JobError> {
		let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
		if attempt < self.failures {
			return Err(JobError::failed(format!("flaky attempt {} failed", ctx.attempt())));
		}
		info!("flaky [{}] succeeded after {} failure(s)", ctx.id(), attempt);
		Ok(())
	}

	fn on_retry(&self, _error: &JobError) -> RetryConstraint {
		RetryConstraint::ExponentialWithLimit {
			initial: Duration::from_millis(200),
			max: Duration::from_secs(10),
		}
	}
}

impl JobKind for Flaky {
	fn kind() -> &'static str {
		"flaky"
	}

	fn build(params: &Value) -> JwResult<Arc<dyn Job>> {
		let failures = params.get("failures").and_then(Value::as_u64).unwrap_or(2);
		Ok(Arc::new(Flaky {
			failures: u32::try_from(failures).unwrap_or(u32::MAX),
			attempts: AtomicU32::new(0),
		}))
	}
}

async fn submit_demo(app: App) -> JwResult<()> {
	app.job("echo")
		.params(serde_json::json!({ "message": "hello" }))
		.periodic(3, Duration::from_secs(2))
		.schedule(app.manager())
		.await?;
	app.job("sleep")
		.queue("slow")
		.add_tag("demo")
		.params(serde_json::json!({ "ms": 3000 }))
		.schedule(app.manager())
		.await?;
	app.job("flaky")
		.retry(5)
		.params(serde_json::json!({ "failures": 3 }))
		.schedule(app.manager())
		.await?;
	Ok(())
}

#[tokio::main]
async fn main() -> JwResult<()> {
	let config = Config::from_env();

	let mut builder = AppBuilder::from_env()?;
	let store = JobAdapterSqlite::new(config.db_dir.join("jobs.db")).await?;
	builder.store(Arc::new(store)).queue("slow", 2);
	builder.register::<Echo>()?.register::<Sleep>()?.register::<Flaky>()?;
	if config.demo {
		builder.on_init(submit_demo);
	}

	let app = builder.build().await?;
	app.run().await
}

// vim: ts=4

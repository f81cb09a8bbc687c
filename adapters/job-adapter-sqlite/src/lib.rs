//! SQLite job store.
//!
//! Each descriptor is one row keyed by job id. The full descriptor is kept as
//! JSON in `data`; queue, kind, state and timing columns are copied out of it
//! for querying.

use async_trait::async_trait;
use sqlx::sqlite::{self, SqlitePool};
use std::path::Path;

use jobwright_types::{descriptor::JobDescriptor, job_store::JobStore, prelude::*};

mod job;
mod schema;
mod utils;

use schema::init_db;

#[derive(Debug)]
pub struct JobAdapterSqlite {
	db: SqlitePool,
}

impl JobAdapterSqlite {
	/// Open (or create) the database file at `path`
	pub async fn new(path: impl AsRef<Path>) -> JwResult<Self> {
		let path = path.as_ref();
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			tokio::fs::create_dir_all(parent).await?;
		}

		let opts = sqlite::SqliteConnectOptions::new()
			.filename(path)
			.create_if_missing(true)
			.journal_mode(sqlite::SqliteJournalMode::Wal);
		let db = sqlite::SqlitePoolOptions::new()
			.max_connections(5)
			.connect_with(opts)
			.await
			.inspect_err(|err| error!("DbError: {:#?}", err))
			.or(Err(Error::DbError))?;

		init_db(&db)
			.await
			.inspect_err(|err| error!("DbError: {:#?}", err))
			.or(Err(Error::DbError))?;

		info!("Job store opened at {}", path.display());
		Ok(Self { db })
	}

	/// Persisted descriptors, optionally of one queue only, in first-save order
	pub async fn list(&self, queue: Option<&str>) -> JwResult<Vec<JobDescriptor>> {
		job::list(&self.db, queue).await
	}

	/// Number of persisted descriptors per queue
	pub async fn count_by_queue(&self) -> JwResult<Vec<(Box<str>, u64)>> {
		job::count_by_queue(&self.db).await
	}
}

#[async_trait]
impl JobStore for JobAdapterSqlite {
	async fn save(&self, descriptor: &JobDescriptor) -> JwResult<()> {
		job::save(&self.db, descriptor).await
	}

	async fn load(&self, id: JobId) -> JwResult<Option<JobDescriptor>> {
		job::load(&self.db, id).await
	}

	async fn load_all(&self) -> JwResult<Vec<JobDescriptor>> {
		job::list(&self.db, None).await
	}

	async fn delete(&self, id: JobId) -> JwResult<()> {
		job::delete(&self.db, id).await
	}
}

// vim: ts=4

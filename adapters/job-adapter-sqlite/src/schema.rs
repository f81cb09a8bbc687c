//! Database schema initialization

use sqlx::SqlitePool;

/// Create tables and indexes if they do not exist yet
pub(crate) async fn init_db(db: &SqlitePool) -> Result<(), sqlx::Error> {
	let mut tx = db.begin().await?;

	// Jobs
	//******
	// `seq` keeps first-save order across upserts
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS jobs (
		seq integer PRIMARY KEY AUTOINCREMENT,
		job_id text NOT NULL UNIQUE,
		queue text NOT NULL,
		kind text NOT NULL,
		state text NOT NULL,
		not_before integer NOT NULL,
		created_at integer NOT NULL,
		updated_at datetime DEFAULT (unixepoch()),
		data json NOT NULL
	)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_queue ON jobs(queue, seq)")
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;

	Ok(())
}

// vim: ts=4

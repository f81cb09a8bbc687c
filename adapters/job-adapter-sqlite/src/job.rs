//! Job descriptor persistence

use sqlx::{Row, SqlitePool};

use jobwright_types::{descriptor::JobDescriptor, prelude::*};

use crate::utils::*;

/// Insert or replace a descriptor, keeping its original position
pub(crate) async fn save(db: &SqlitePool, descriptor: &JobDescriptor) -> JwResult<()> {
	let data = serde_json::to_string(descriptor)?;
	sqlx::query(
		"INSERT INTO jobs (job_id, queue, kind, state, not_before, created_at, data)
		VALUES (?, ?, ?, ?, ?, ?, ?)
		ON CONFLICT(job_id) DO UPDATE SET
			queue=excluded.queue,
			kind=excluded.kind,
			state=excluded.state,
			not_before=excluded.not_before,
			updated_at=unixepoch(),
			data=excluded.data",
	)
	.bind(descriptor.id().to_string())
	.bind(descriptor.queue())
	.bind(descriptor.kind())
	.bind(descriptor.state().as_str())
	.bind(descriptor.not_before().0)
	.bind(descriptor.created_at().0)
	.bind(data)
	.execute(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	Ok(())
}

pub(crate) async fn load(db: &SqlitePool, id: JobId) -> JwResult<Option<JobDescriptor>> {
	let row = sqlx::query("SELECT data FROM jobs WHERE job_id = ?")
		.bind(id.to_string())
		.fetch_optional(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	match row {
		Some(row) => {
			let data: String = row.try_get("data").inspect_err(inspect).map_err(|_| Error::DbError)?;
			Ok(Some(serde_json::from_str(&data)?))
		}
		None => Ok(None),
	}
}

/// Descriptors in first-save order, optionally filtered by queue
pub(crate) async fn list(db: &SqlitePool, queue: Option<&str>) -> JwResult<Vec<JobDescriptor>> {
	let res = sqlx::query("SELECT data FROM jobs WHERE (?1 IS NULL OR queue = ?1) ORDER BY seq")
		.bind(queue)
		.fetch_all(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	let rows = collect_res(res.iter().map(|row| row.try_get::<String, _>("data")))?;
	rows.iter()
		.map(|data| serde_json::from_str(data).map_err(Error::from))
		.collect()
}

pub(crate) async fn count_by_queue(db: &SqlitePool) -> JwResult<Vec<(Box<str>, u64)>> {
	let res = sqlx::query("SELECT queue, count(*) AS n FROM jobs GROUP BY queue ORDER BY queue")
		.fetch_all(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	collect_res(res.iter().map(|row| {
		let n: i64 = row.try_get("n")?;
		Ok((row.try_get::<String, _>("queue")?.into(), u64::try_from(n).unwrap_or_default()))
	}))
}

pub(crate) async fn delete(db: &SqlitePool, id: JobId) -> JwResult<()> {
	sqlx::query("DELETE FROM jobs WHERE job_id = ?")
		.bind(id.to_string())
		.execute(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	Ok(())
}

// vim: ts=4

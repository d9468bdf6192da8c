//! Send queue persistence
//!
//! The pending -> sending transition in `claim` is the one atomic guard the
//! pipelines rely on; everything else is plain row updates.

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use belfry::marketing_adapter::{CreateQueueEntry, QueueEntry, QueueStats, QueueStatus};
use belfry::prelude::*;

use crate::utils::*;

fn row_to_entry(row: &SqliteRow) -> Result<QueueEntry, sqlx::Error> {
	let status: &str = row.try_get("status")?;
	let status = QueueStatus::parse(status)
		.ok_or_else(|| sqlx::Error::Decode(Box::from("invalid queue status")))?;
	Ok(QueueEntry {
		entry_id: row.try_get("entry_id")?,
		template_id: row.try_get("template_id")?,
		sequence_id: row.try_get("sequence_id")?,
		step_id: row.try_get("step_id")?,
		org_id: row.try_get::<Option<i64>, _>("org_id")?.map(OrgId),
		recipient_user_id: row.try_get("recipient_user_id")?,
		recipient_email: row.try_get("recipient_email")?,
		send_at: row.try_get("send_at").map(Timestamp)?,
		status,
		attempts: row.try_get("attempts")?,
		last_error: row.try_get("last_error")?,
		created_at: row.try_get("created_at").map(Timestamp)?,
	})
}

pub(crate) async fn create(db: &SqlitePool, entry: &CreateQueueEntry<'_>) -> BfResult<i64> {
	let res = sqlx::query(
		"INSERT INTO send_queue
		(template_id, sequence_id, step_id, org_id, recipient_user_id, recipient_email, send_at)
		VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) RETURNING entry_id",
	)
	.bind(entry.template_id)
	.bind(entry.sequence_id)
	.bind(entry.step_id)
	.bind(entry.org_id.map(|o| o.0))
	.bind(entry.recipient_user_id)
	.bind(entry.recipient_email)
	.bind(entry.send_at.0)
	.fetch_one(db)
	.await;
	map_res(res, |row| row.try_get("entry_id"))
}

pub(crate) async fn list_due(db: &SqlitePool, now: Timestamp) -> BfResult<Vec<QueueEntry>> {
	let res = sqlx::query(
		"SELECT entry_id, template_id, sequence_id, step_id, org_id, recipient_user_id,
		recipient_email, send_at, status, attempts, last_error, created_at
		FROM send_queue WHERE status = 'pending' AND send_at <= ?1 ORDER BY send_at ASC",
	)
	.bind(now.0)
	.fetch_all(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;
	collect_res(res.iter().map(row_to_entry))
}

/// Conditional update; zero affected rows means another run got here first.
pub(crate) async fn claim(db: &SqlitePool, entry_id: i64) -> BfResult<bool> {
	let res = sqlx::query(
		"UPDATE send_queue SET status = 'sending' WHERE entry_id = ?1 AND status = 'pending'",
	)
	.bind(entry_id)
	.execute(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;
	Ok(res.rows_affected() == 1)
}

pub(crate) async fn update_result(
	db: &SqlitePool,
	entry_id: i64,
	status: QueueStatus,
	error: Option<&str>,
) -> BfResult<()> {
	let res = sqlx::query(
		"UPDATE send_queue SET status = ?1, attempts = attempts + 1, last_error = ?2
		WHERE entry_id = ?3",
	)
	.bind(status.as_str())
	.bind(error)
	.bind(entry_id)
	.execute(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;
	if res.rows_affected() == 0 {
		return Err(Error::NotFound);
	}
	Ok(())
}

pub(crate) async fn exists(
	db: &SqlitePool,
	sequence_id: i64,
	step_id: i64,
	org_id: OrgId,
) -> BfResult<bool> {
	let res = sqlx::query(
		"SELECT 1 FROM send_queue
		WHERE sequence_id = ?1 AND step_id = ?2 AND org_id = ?3 AND status != 'failed' LIMIT 1",
	)
	.bind(sequence_id)
	.bind(step_id)
	.bind(org_id.0)
	.fetch_optional(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;
	Ok(res.is_some())
}

pub(crate) async fn stats(db: &SqlitePool) -> BfResult<QueueStats> {
	let res = sqlx::query("SELECT status, count(*) as cnt FROM send_queue GROUP BY status")
		.fetch_all(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	let mut stats = QueueStats::default();
	for row in &res {
		let status: &str = row.try_get("status").inspect_err(inspect).map_err(|_| Error::DbError)?;
		let count: u32 = row.try_get("cnt").inspect_err(inspect).map_err(|_| Error::DbError)?;
		match QueueStatus::parse(status) {
			Some(QueueStatus::Pending) => stats.pending = count,
			Some(QueueStatus::Sending) => stats.sending = count,
			Some(QueueStatus::Sent) => stats.sent = count,
			Some(QueueStatus::Failed) => stats.failed = count,
			None => return Err(Error::DbError),
		}
	}
	Ok(stats)
}

// vim: ts=4

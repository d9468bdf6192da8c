//! Send log persistence

use sqlx::{Row, SqlitePool};

use belfry::marketing_adapter::CreateSendLog;
use belfry::prelude::*;

use crate::utils::*;

pub(crate) async fn create(db: &SqlitePool, entry: &CreateSendLog<'_>) -> BfResult<i64> {
	let res = sqlx::query(
		"INSERT INTO send_log
		(template_id, sequence_id, step_id, org_id, recipient_email, sent_at, status, error)
		VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) RETURNING log_id",
	)
	.bind(entry.template_id)
	.bind(entry.sequence_id)
	.bind(entry.step_id)
	.bind(entry.org_id.map(|o| o.0))
	.bind(entry.recipient_email)
	.bind(entry.sent_at.0)
	.bind(entry.status.as_str())
	.bind(entry.error)
	.fetch_one(db)
	.await;
	map_res(res, |row| row.try_get("log_id"))
}

pub(crate) async fn list_logged_steps(
	db: &SqlitePool,
	sequence_id: i64,
	org_id: OrgId,
) -> BfResult<Vec<i64>> {
	let res = sqlx::query(
		"SELECT DISTINCT step_id FROM send_log
		WHERE sequence_id = ?1 AND org_id = ?2 AND status = 'sent' AND step_id IS NOT NULL",
	)
	.bind(sequence_id)
	.bind(org_id.0)
	.fetch_all(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;
	collect_res(res.iter().map(|row| row.try_get("step_id")))
}

// vim: ts=4

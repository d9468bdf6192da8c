//! User preference persistence
//!
//! Rows are created lazily on first opt-out, so most users never have one.

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use belfry::marketing_adapter::UserPreference;
use belfry::prelude::*;

use crate::utils::*;

fn row_to_pref(row: &SqliteRow) -> Result<UserPreference, sqlx::Error> {
	Ok(UserPreference {
		pref_id: row.try_get("pref_id")?,
		user_id: row.try_get("user_id")?,
		opted_out_non_essential: row.try_get("opted_out_non_essential")?,
		created_at: row.try_get("created_at").map(Timestamp)?,
		updated_at: row.try_get("updated_at").map(Timestamp)?,
	})
}

pub(crate) async fn read(db: &SqlitePool, user_id: i64) -> BfResult<Option<UserPreference>> {
	let res = sqlx::query(
		"SELECT pref_id, user_id, opted_out_non_essential, created_at, updated_at
		FROM user_preferences WHERE user_id = ?1",
	)
	.bind(user_id)
	.fetch_optional(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	res.map(|row| row_to_pref(&row).inspect_err(inspect).map_err(|_| Error::DbError))
		.transpose()
}

pub(crate) async fn set_opted_out(
	db: &SqlitePool,
	user_id: i64,
	opted_out: bool,
) -> BfResult<UserPreference> {
	let res = sqlx::query(
		"INSERT INTO user_preferences (user_id, opted_out_non_essential)
		VALUES (?1, ?2)
		ON CONFLICT(user_id) DO UPDATE SET
			opted_out_non_essential = excluded.opted_out_non_essential,
			updated_at = unixepoch()
		RETURNING pref_id, user_id, opted_out_non_essential, created_at, updated_at",
	)
	.bind(user_id)
	.bind(opted_out)
	.fetch_one(db)
	.await;
	map_res(res, row_to_pref)
}

// vim: ts=4

//! Organisation queries

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use belfry::marketing_adapter::Organisation;
use belfry::prelude::*;

use crate::utils::*;

fn row_to_org(row: &SqliteRow) -> Result<Organisation, sqlx::Error> {
	let groups: &str = row.try_get("groups")?;
	Ok(Organisation {
		org_id: OrgId(row.try_get("org_id")?),
		name: row.try_get("name")?,
		email: row.try_get("email")?,
		groups: parse_str_list(groups),
		signed_up_at: row.try_get("signed_up_at").map(Timestamp)?,
		marketing_excluded: row.try_get("marketing_excluded")?,
		owner_user_id: row.try_get("owner_user_id")?,
	})
}

pub(crate) async fn read(db: &SqlitePool, org_id: OrgId) -> BfResult<Organisation> {
	let res = sqlx::query(
		"SELECT org_id, name, email, groups, signed_up_at, marketing_excluded, owner_user_id
		FROM organisations WHERE org_id = ?1",
	)
	.bind(org_id.0)
	.fetch_one(db)
	.await;
	map_res(res, row_to_org)
}

pub(crate) async fn list(db: &SqlitePool) -> BfResult<Vec<Organisation>> {
	let res = sqlx::query(
		"SELECT org_id, name, email, groups, signed_up_at, marketing_excluded, owner_user_id
		FROM organisations ORDER BY org_id",
	)
	.fetch_all(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;
	collect_res(res.iter().map(row_to_org))
}

pub(crate) async fn list_in_group(db: &SqlitePool, group: &str) -> BfResult<Vec<Organisation>> {
	// groups is a comma-separated list; wrap both sides in commas for an
	// exact member match
	let res = sqlx::query(
		"SELECT org_id, name, email, groups, signed_up_at, marketing_excluded, owner_user_id
		FROM organisations
		WHERE (',' || groups || ',') LIKE ('%,' || ?1 || ',%') ORDER BY org_id",
	)
	.bind(group)
	.fetch_all(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;
	collect_res(res.iter().map(row_to_org))
}

// vim: ts=4

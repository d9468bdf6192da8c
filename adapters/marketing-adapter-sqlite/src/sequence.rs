//! Sequence and step queries

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use belfry::marketing_adapter::{Sequence, SequenceScope, SequenceStatus, SequenceStep};
use belfry::prelude::*;

use crate::utils::*;

fn row_to_sequence(row: &SqliteRow) -> Result<Sequence, sqlx::Error> {
	let applies_to: &str = row.try_get("applies_to")?;
	let scope_value: Option<&str> = row.try_get("scope")?;
	let scope = match (applies_to, scope_value) {
		("default", _) => SequenceScope::Default,
		("organisation", Some(id)) => {
			let id = id
				.parse()
				.map_err(|_| sqlx::Error::Decode(Box::from("invalid organisation scope")))?;
			SequenceScope::Organisation(OrgId(id))
		}
		("group", Some(group)) => SequenceScope::Group(group.into()),
		_ => return Err(sqlx::Error::Decode(Box::from("invalid sequence scope"))),
	};
	let status: &str = row.try_get("status")?;
	let status = match status {
		"draft" => SequenceStatus::Draft,
		"active" => SequenceStatus::Active,
		"paused" => SequenceStatus::Paused,
		"archived" => SequenceStatus::Archived,
		_ => return Err(sqlx::Error::Decode(Box::from("invalid sequence status"))),
	};
	Ok(Sequence {
		sequence_id: row.try_get("sequence_id")?,
		name: row.try_get("name")?,
		status,
		scope,
		created_by: row.try_get("created_by")?,
		created_at: row.try_get("created_at").map(Timestamp)?,
		updated_at: row.try_get("updated_at").map(Timestamp)?,
	})
}

pub(crate) async fn list_active(db: &SqlitePool) -> BfResult<Vec<Sequence>> {
	let res = sqlx::query(
		"SELECT sequence_id, name, status, applies_to, scope, created_by, created_at, updated_at
		FROM marketing_sequences WHERE status = 'active' ORDER BY sequence_id",
	)
	.fetch_all(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;
	collect_res(res.iter().map(row_to_sequence))
}

pub(crate) async fn list_steps(db: &SqlitePool, sequence_id: i64) -> BfResult<Vec<SequenceStep>> {
	let res = sqlx::query(
		"SELECT step_id, sequence_id, step_order, delay_days, template_id, condition
		FROM sequence_steps WHERE sequence_id = ?1 ORDER BY step_order ASC",
	)
	.bind(sequence_id)
	.fetch_all(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	collect_res(res.iter().map(|row| {
		Ok(SequenceStep {
			step_id: row.try_get("step_id")?,
			sequence_id: row.try_get("sequence_id")?,
			order: row.try_get("step_order")?,
			delay_days: row.try_get("delay_days")?,
			template_id: row.try_get("template_id")?,
			condition: row.try_get("condition")?,
		})
	}))
}

// vim: ts=4

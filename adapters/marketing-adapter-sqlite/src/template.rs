//! Template, content block and link queries

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use belfry::marketing_adapter::{ContentBlock, EmailTemplate, Link, TemplateStatus};
use belfry::prelude::*;

use crate::utils::*;

fn parse_status(s: &str) -> Result<TemplateStatus, sqlx::Error> {
	match s {
		"draft" => Ok(TemplateStatus::Draft),
		"active" => Ok(TemplateStatus::Active),
		"archived" => Ok(TemplateStatus::Archived),
		_ => Err(sqlx::Error::Decode(Box::from("invalid template status"))),
	}
}

pub(crate) async fn read(db: &SqlitePool, template_id: i64) -> BfResult<EmailTemplate> {
	let res = sqlx::query(
		"SELECT template_id, name, status, subject, preview_text, body_html, body_text, tags,
		created_by, created_at, updated_at
		FROM email_templates WHERE template_id = ?1",
	)
	.bind(template_id)
	.fetch_one(db)
	.await;

	map_res(res, |row| {
		let tags: &str = row.try_get("tags")?;
		Ok(EmailTemplate {
			template_id: row.try_get("template_id")?,
			name: row.try_get("name")?,
			status: parse_status(row.try_get("status")?)?,
			subject: row.try_get("subject")?,
			preview_text: row.try_get("preview_text")?,
			body_html: row.try_get("body_html")?,
			body_text: row.try_get("body_text")?,
			tags: parse_str_list(tags),
			created_by: row.try_get("created_by")?,
			created_at: row.try_get("created_at").map(Timestamp)?,
			updated_at: row.try_get("updated_at").map(Timestamp)?,
		})
	})
}

fn row_to_block(row: &SqliteRow) -> Result<ContentBlock, sqlx::Error> {
	let tags: &str = row.try_get("tags")?;
	Ok(ContentBlock {
		block_id: row.try_get("block_id")?,
		title: row.try_get("title")?,
		key: row.try_get("key")?,
		body_html: row.try_get("body_html")?,
		body_text: row.try_get("body_text")?,
		tags: parse_str_list(tags),
		status: parse_status(row.try_get("status")?)?,
		created_at: row.try_get("created_at").map(Timestamp)?,
		updated_at: row.try_get("updated_at").map(Timestamp)?,
	})
}

/// Only active blocks resolve; drafts stay literal in rendered bodies.
pub(crate) async fn read_block(db: &SqlitePool, key: &str) -> BfResult<Option<ContentBlock>> {
	let res = sqlx::query(
		"SELECT block_id, title, key, body_html, body_text, tags, status, created_at, updated_at
		FROM content_blocks WHERE key = ?1 AND status = 'active'",
	)
	.bind(key)
	.fetch_optional(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	res.map(|row| row_to_block(&row).inspect_err(inspect).map_err(|_| Error::DbError))
		.transpose()
}

fn row_to_link(row: &SqliteRow) -> Result<Link, sqlx::Error> {
	Ok(Link {
		link_id: row.try_get("link_id")?,
		key: row.try_get("key")?,
		target_url: row.try_get("target_url")?,
		org_id: row.try_get::<Option<i64>, _>("org_id")?.map(OrgId),
		status: parse_status(row.try_get("status")?)?,
	})
}

/// An organisation-specific row takes priority over the global default.
pub(crate) async fn read_link(
	db: &SqlitePool,
	key: &str,
	org_id: Option<OrgId>,
) -> BfResult<Option<Link>> {
	let res = match org_id {
		Some(org_id) => {
			sqlx::query(
				"SELECT link_id, key, target_url, org_id, status
				FROM links WHERE key = ?1 AND status = 'active' AND (org_id = ?2 OR org_id IS NULL)
				ORDER BY (org_id IS NULL) ASC LIMIT 1",
			)
			.bind(key)
			.bind(org_id.0)
			.fetch_optional(db)
			.await
		}
		None => {
			sqlx::query(
				"SELECT link_id, key, target_url, org_id, status
				FROM links WHERE key = ?1 AND status = 'active' AND org_id IS NULL",
			)
			.bind(key)
			.fetch_optional(db)
			.await
		}
	};
	let res = res.inspect_err(inspect).map_err(|_| Error::DbError)?;

	res.map(|row| row_to_link(&row).inspect_err(inspect).map_err(|_| Error::DbError))
		.transpose()
}

// vim: ts=4

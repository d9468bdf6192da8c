//! Newsletter, contact list and event queries

use sqlx::{Row, SqlitePool};

use belfry::marketing_adapter::{Contact, Newsletter, NewsletterStatus, UpcomingEvent};
use belfry::prelude::*;

use crate::utils::*;

pub(crate) async fn read(
	db: &SqlitePool,
	org_id: OrgId,
	newsletter_id: i64,
) -> BfResult<Newsletter> {
	let res = sqlx::query(
		"SELECT newsletter_id, org_id, subject, body_html, body_text, status, sent_at,
		created_at, updated_at
		FROM newsletters WHERE newsletter_id = ?1 AND org_id = ?2",
	)
	.bind(newsletter_id)
	.bind(org_id.0)
	.fetch_one(db)
	.await;

	map_res(res, |row| {
		let status: &str = row.try_get("status")?;
		let status = match status {
			"draft" => NewsletterStatus::Draft,
			"scheduled" => NewsletterStatus::Scheduled,
			"sent" => NewsletterStatus::Sent,
			_ => return Err(sqlx::Error::Decode(Box::from("invalid newsletter status"))),
		};
		Ok(Newsletter {
			newsletter_id: row.try_get("newsletter_id")?,
			org_id: OrgId(row.try_get("org_id")?),
			subject: row.try_get("subject")?,
			body_html: row.try_get("body_html")?,
			body_text: row.try_get("body_text")?,
			status,
			sent_at: row.try_get::<Option<i64>, _>("sent_at")?.map(Timestamp),
			created_at: row.try_get("created_at").map(Timestamp)?,
			updated_at: row.try_get("updated_at").map(Timestamp)?,
		})
	})
}

pub(crate) async fn list_members(
	db: &SqlitePool,
	org_id: OrgId,
	list_id: i64,
) -> BfResult<Vec<Contact>> {
	let res = sqlx::query(
		"SELECT c.contact_id, c.org_id, c.first_name, c.last_name, c.email, c.subscribed
		FROM contacts c
		JOIN contact_list_members m ON m.contact_id = c.contact_id
		WHERE m.list_id = ?1 AND c.org_id = ?2 ORDER BY c.contact_id",
	)
	.bind(list_id)
	.bind(org_id.0)
	.fetch_all(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	collect_res(res.iter().map(|row| {
		Ok(Contact {
			contact_id: row.try_get("contact_id")?,
			org_id: OrgId(row.try_get("org_id")?),
			first_name: row.try_get("first_name")?,
			last_name: row.try_get("last_name")?,
			email: row.try_get("email")?,
			subscribed: row.try_get("subscribed")?,
		})
	}))
}

pub(crate) async fn list_events(
	db: &SqlitePool,
	org_id: OrgId,
	contact_id: i64,
	after: Timestamp,
) -> BfResult<Vec<UpcomingEvent>> {
	let res = sqlx::query(
		"SELECT e.title, e.starts_at
		FROM events e
		JOIN event_attendees a ON a.event_id = e.event_id
		WHERE e.org_id = ?1 AND a.contact_id = ?2 AND e.starts_at > ?3
		ORDER BY e.starts_at ASC",
	)
	.bind(org_id.0)
	.bind(contact_id)
	.bind(after.0)
	.fetch_all(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	collect_res(res.iter().map(|row| {
		Ok(UpcomingEvent {
			title: row.try_get("title")?,
			starts_at: row.try_get("starts_at").map(Timestamp)?,
		})
	}))
}

pub(crate) async fn mark_sent(
	db: &SqlitePool,
	org_id: OrgId,
	newsletter_id: i64,
	at: Timestamp,
) -> BfResult<()> {
	let res = sqlx::query(
		"UPDATE newsletters SET status = 'sent', sent_at = ?1, updated_at = unixepoch()
		WHERE newsletter_id = ?2 AND org_id = ?3",
	)
	.bind(at.0)
	.bind(newsletter_id)
	.bind(org_id.0)
	.execute(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;
	if res.rows_affected() == 0 {
		return Err(Error::NotFound);
	}
	Ok(())
}

// vim: ts=4

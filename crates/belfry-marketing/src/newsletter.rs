//! Newsletter batch sending: render one newsletter for every subscribed
//! member of a contact list and deliver the batch.
//!
//! Rendering is the expensive part (per-contact event lookups), so it runs
//! with bounded concurrency; delivery then goes out sequentially through the
//! transport. Per-recipient failures are captured in the returned results
//! instead of aborting the batch, and the newsletter is stamped sent exactly
//! once after all attempts.

use futures::StreamExt;
use serde::Serialize;
use serde_with::skip_serializing_none;

use belfry_types::email_transport::OutgoingEmail;
use belfry_types::marketing_adapter::{Contact, Newsletter, Organisation, UpcomingEvent};

use crate::prelude::*;
use crate::template::{BodyKind, ResolveMode, Resolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientStatus {
	Sent,
	Error,
}

/// Per-recipient outcome of a batch send
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientResult {
	pub email: Box<str>,
	pub status: RecipientStatus,
	pub error: Option<Box<str>>,
}

struct Prepared {
	email: Box<str>,
	outcome: Result<OutgoingEmail, String>,
}

/// Send a newsletter to every subscribed member of a contact list.
///
/// Returns one result per attempted recipient. A missing newsletter or
/// organisation is an error; everything downstream of that is per-recipient.
pub async fn send_batch(
	app: &App,
	org_id: OrgId,
	newsletter_id: i64,
	list_id: i64,
) -> BfResult<Vec<RecipientResult>> {
	let newsletter = app.marketing_adapter.read_newsletter(org_id, newsletter_id).await?;
	let org = app.marketing_adapter.read_organisation(org_id).await?;
	let members = app.marketing_adapter.list_list_members(org_id, list_id).await?;

	let recipients: Vec<Contact> = members.into_iter().filter(|c| c.subscribed).collect();
	info!(
		"Newsletter {} batch for org {}: {} subscribed recipients",
		newsletter_id, org_id, recipients.len()
	);

	let prepared: Vec<Prepared> = futures::stream::iter(recipients)
		.map(|contact| prepare_recipient(app, &newsletter, &org, contact))
		.buffer_unordered(app.opts.prepare_concurrency)
		.collect()
		.await;

	let mut results = Vec::with_capacity(prepared.len());
	for prep in prepared {
		let result = match prep.outcome {
			Ok(message) => match app.email_transport.send(&message).await {
				Ok(()) => RecipientResult {
					email: prep.email,
					status: RecipientStatus::Sent,
					error: None,
				},
				Err(err) => RecipientResult {
					email: prep.email,
					status: RecipientStatus::Error,
					error: Some(format!("delivery failed: {err}").into()),
				},
			},
			Err(err) => RecipientResult {
				email: prep.email,
				status: RecipientStatus::Error,
				error: Some(err.into()),
			},
		};
		if let Some(err) = &result.error {
			warn!("Newsletter {} recipient {} failed: {}", newsletter_id, result.email, err);
		}
		results.push(result);
	}

	// Stamped once per batch, whatever the per-recipient outcomes were
	if let Err(err) = app
		.marketing_adapter
		.mark_newsletter_sent(org_id, newsletter_id, Timestamp::now())
		.await
	{
		warn!("Failed to mark newsletter {} sent: {}", newsletter_id, err);
	}

	Ok(results)
}

/// Render the newsletter for one contact. Errors are folded into the
/// prepared outcome so one bad contact never poisons the batch.
async fn prepare_recipient(
	app: &App,
	newsletter: &Newsletter,
	org: &Organisation,
	contact: Contact,
) -> Prepared {
	let email = contact.email.clone();
	let outcome = render_for_contact(app, newsletter, org, &contact).await;
	Prepared { email, outcome }
}

async fn render_for_contact(
	app: &App,
	newsletter: &Newsletter,
	org: &Organisation,
	contact: &Contact,
) -> Result<OutgoingEmail, String> {
	let events = app
		.marketing_adapter
		.list_upcoming_events(org.org_id, contact.contact_id, Timestamp::now())
		.await
		.map_err(|err| format!("event lookup failed: {err}"))?;

	let fields = serde_json::json!({
		"contact:first_name": contact.first_name.as_deref().unwrap_or(""),
		"contact:email": &*contact.email,
		"org:name": &*org.name,
		"events:upcoming": format_events(&events),
		"base:url": &*app.opts.base_url,
	});

	let resolver = Resolver::new(&*app.marketing_adapter, Some(org.org_id));
	let subject = resolver
		.resolve(&newsletter.subject, BodyKind::Text, &fields, ResolveMode::Full)
		.await
		.map_err(|err| format!("subject resolution failed: {err}"))?;
	let html_body = resolver
		.resolve(&newsletter.body_html, BodyKind::Html, &fields, ResolveMode::Full)
		.await
		.map_err(|err| format!("body resolution failed: {err}"))?;
	let text_body = match &newsletter.body_text {
		Some(text) => Some(
			resolver
				.resolve(text, BodyKind::Text, &fields, ResolveMode::Full)
				.await
				.map_err(|err| format!("body resolution failed: {err}"))?,
		),
		None => None,
	};

	Ok(OutgoingEmail {
		to: contact.email.to_string(),
		subject,
		html_body,
		text_body,
		from_name_override: Some(org.name.to_string()),
	})
}

/// "Title (7 Sep 2026), Title (21 Sep 2026)" summary for the
/// `{{events:upcoming}}` field; events with out-of-range timestamps are
/// dropped.
fn format_events(events: &[UpcomingEvent]) -> String {
	events
		.iter()
		.filter_map(|event| {
			let dt = chrono::DateTime::from_timestamp(event.starts_at.0, 0)?;
			Some(format!("{} ({})", event.title, dt.format("%-d %b %Y")))
		})
		.collect::<Vec<_>>()
		.join(", ")
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing;
	use std::sync::Arc;

	fn seeded() -> Arc<testing::InMemoryMarketing> {
		let store = testing::InMemoryMarketing::new();
		store.add_org(testing::org(7, Timestamp::now()));
		store.add_newsletter(testing::newsletter(
			5,
			7,
			"September news",
			"<p>Hi {{contact:first_name}}</p>",
		));
		store.add_contact_to_list(3, testing::contact(1, 7, "ann@example.org", true));
		store.add_contact_to_list(3, testing::contact(2, 7, "bob@example.org", true));
		store.add_contact_to_list(3, testing::contact(3, 7, "cyd@example.org", true));
		Arc::new(store)
	}

	fn result_for<'r>(results: &'r [RecipientResult], email: &str) -> &'r RecipientResult {
		results.iter().find(|r| &*r.email == email).unwrap()
	}

	#[tokio::test]
	async fn test_batch_sends_to_all_subscribed_members() {
		let store = seeded();
		let transport = Arc::new(testing::MockTransport::new());
		let app = testing::test_app(store.clone(), transport.clone());

		let results = send_batch(&app, OrgId(7), 5, 3).await.unwrap();
		assert_eq!(results.len(), 3);
		assert!(results.iter().all(|r| r.status == RecipientStatus::Sent));

		let mut sent = transport.sent_to();
		sent.sort();
		assert_eq!(sent, vec!["ann@example.org", "bob@example.org", "cyd@example.org"]);
		assert_eq!(*store.sent_marks.lock().unwrap(), vec![5]);
	}

	#[tokio::test]
	async fn test_preparation_failure_is_isolated_per_recipient() {
		let store = seeded();
		store.fail_events_for.lock().unwrap().insert(2);
		let transport = Arc::new(testing::MockTransport::new());
		let app = testing::test_app(store.clone(), transport.clone());

		let results = send_batch(&app, OrgId(7), 5, 3).await.unwrap();
		assert_eq!(results.len(), 3);
		assert_eq!(result_for(&results, "ann@example.org").status, RecipientStatus::Sent);
		assert_eq!(result_for(&results, "cyd@example.org").status, RecipientStatus::Sent);

		let failed = result_for(&results, "bob@example.org");
		assert_eq!(failed.status, RecipientStatus::Error);
		assert!(failed.error.as_deref().unwrap().contains("event lookup failed"));

		let sent = transport.sent_to();
		assert_eq!(sent.len(), 2);
		assert!(!sent.contains(&"bob@example.org".to_string()));
		// Marked sent exactly once despite the failure
		assert_eq!(*store.sent_marks.lock().unwrap(), vec![5]);
	}

	#[tokio::test]
	async fn test_unsubscribed_members_are_excluded() {
		let store = seeded();
		store.add_contact_to_list(3, testing::contact(4, 7, "out@example.org", false));
		let transport = Arc::new(testing::MockTransport::new());
		let app = testing::test_app(store.clone(), transport.clone());

		let results = send_batch(&app, OrgId(7), 5, 3).await.unwrap();
		assert_eq!(results.len(), 3);
		assert!(results.iter().all(|r| &*r.email != "out@example.org"));
		assert!(!transport.sent_to().contains(&"out@example.org".to_string()));
	}

	#[tokio::test]
	async fn test_missing_newsletter_is_an_error() {
		let store = seeded();
		let app = testing::test_app(store.clone(), Arc::new(testing::MockTransport::new()));

		let err = send_batch(&app, OrgId(7), 999, 3).await.unwrap_err();
		assert!(matches!(err, Error::NotFound));
		assert!(store.sent_marks.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_body_is_personalized_per_contact() {
		let store = seeded();
		let transport = Arc::new(testing::MockTransport::new());
		let app = testing::test_app(store.clone(), transport.clone());

		send_batch(&app, OrgId(7), 5, 3).await.unwrap();
		let messages = transport.sent.lock().unwrap();
		let ann = messages.iter().find(|m| m.to == "ann@example.org").unwrap();
		assert_eq!(ann.html_body, "<p>Hi Contact1</p>");
		assert_eq!(ann.from_name_override.as_deref(), Some("Org 7"));
	}

	#[tokio::test]
	async fn test_delivery_failure_recorded_and_batch_continues() {
		let store = seeded();
		let transport = Arc::new(testing::MockTransport::new());
		transport.fail_for("ann@example.org");
		let app = testing::test_app(store.clone(), transport.clone());

		let results = send_batch(&app, OrgId(7), 5, 3).await.unwrap();
		let failed = result_for(&results, "ann@example.org");
		assert_eq!(failed.status, RecipientStatus::Error);
		assert!(failed.error.as_deref().unwrap().contains("delivery failed"));
		assert_eq!(transport.sent_to().len(), 2);
		assert_eq!(*store.sent_marks.lock().unwrap(), vec![5]);
	}

	#[tokio::test]
	async fn test_upcoming_events_render_into_body() {
		let store = testing::InMemoryMarketing::new();
		store.add_org(testing::org(7, Timestamp::now()));
		store.add_newsletter(testing::newsletter(5, 7, "News", "Coming up: {{events:upcoming}}"));
		store.add_contact_to_list(3, testing::contact(1, 7, "ann@example.org", true));
		store.events.lock().unwrap().push((
			7,
			1,
			UpcomingEvent { title: "Harvest Fair".into(), starts_at: Timestamp::now().add_days(3) },
		));
		let store = Arc::new(store);
		let transport = Arc::new(testing::MockTransport::new());
		let app = testing::test_app(store, transport.clone());

		send_batch(&app, OrgId(7), 5, 3).await.unwrap();
		let messages = transport.sent.lock().unwrap();
		assert!(messages[0].html_body.starts_with("Coming up: Harvest Fair ("));
	}

	#[test]
	fn test_format_events() {
		let events = vec![
			UpcomingEvent { title: "Service".into(), starts_at: Timestamp(1_757_203_200) },
			UpcomingEvent { title: "Choir".into(), starts_at: Timestamp(1_758_412_800) },
		];
		assert_eq!(format_events(&events), "Service (7 Sep 2025), Choir (21 Sep 2025)");
		assert_eq!(format_events(&[]), "");
	}
}

// vim: ts=4

//! Send queue processing: claim due entries, resolve their templates and
//! deliver them, then record the outcome in the queue and the send log.
//!
//! Each entry is claimed with a conditional pending -> sending transition
//! before any work happens, so concurrent processor runs never deliver the
//! same entry twice. Per-entry failures mark that entry failed and move on;
//! one bad entry never stalls the rest of the queue.

use serde::Serialize;

use belfry_types::email_transport::OutgoingEmail;
use belfry_types::marketing_adapter::{CreateSendLog, QueueEntry, QueueStatus, SendStatus};

use crate::prelude::*;
use crate::template::{ResolveMode, Resolver};

/// Outcome of one queue processing pass
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendStats {
	pub sent: u32,
	pub failed: u32,
	/// Entries dropped without a delivery attempt (opt-out, deleted org)
	pub skipped: u32,
}

enum Disposition {
	Sent,
	Failed(String),
	Skipped(String),
}

/// Process all due pending queue entries.
pub async fn process_send_queue(app: &App) -> BfResult<SendStats> {
	let now = Timestamp::now();
	let mut stats = SendStats::default();

	let due = app.marketing_adapter.list_due_queue_entries(now).await?;
	debug!("Processing {} due queue entries", due.len());

	for entry in &due {
		// Lost the claim to a concurrent run
		if !app.marketing_adapter.claim_queue_entry(entry.entry_id).await? {
			continue;
		}

		let disposition = attempt_entry(app, entry).await;
		let (queue_status, send_status, error) = match &disposition {
			Disposition::Sent => {
				stats.sent += 1;
				(QueueStatus::Sent, SendStatus::Sent, None)
			}
			Disposition::Failed(msg) => {
				stats.failed += 1;
				warn!("Queue entry {} failed: {}", entry.entry_id, msg);
				(QueueStatus::Failed, SendStatus::Failed, Some(msg.as_str()))
			}
			Disposition::Skipped(msg) => {
				stats.skipped += 1;
				info!("Queue entry {} skipped: {}", entry.entry_id, msg);
				(QueueStatus::Failed, SendStatus::Failed, Some(msg.as_str()))
			}
		};

		app.marketing_adapter
			.update_queue_entry_result(entry.entry_id, queue_status, error)
			.await?;

		let log = CreateSendLog {
			template_id: entry.template_id,
			sequence_id: entry.sequence_id,
			step_id: entry.step_id,
			org_id: entry.org_id,
			recipient_email: &entry.recipient_email,
			sent_at: Timestamp::now(),
			status: send_status,
			error,
		};
		if let Err(err) = app.marketing_adapter.create_send_log(&log).await {
			warn!("Failed to write send log for entry {}: {}", entry.entry_id, err);
		}
	}

	info!(
		"Queue pass done: {} sent, {} failed, {} skipped",
		stats.sent, stats.failed, stats.skipped
	);
	Ok(stats)
}

/// Try to deliver one claimed entry. All errors are folded into the returned
/// disposition so the caller can uniformly record the outcome.
async fn attempt_entry(app: &App, entry: &QueueEntry) -> Disposition {
	if let Some(user_id) = entry.recipient_user_id {
		match app.marketing_adapter.read_user_preference(user_id).await {
			Ok(Some(pref)) if pref.opted_out_non_essential => {
				return Disposition::Skipped("skipped: recipient opted out".into());
			}
			Ok(_) => {}
			Err(err) => return Disposition::Failed(format!("preference lookup failed: {err}")),
		}
	}

	let org = match entry.org_id {
		Some(org_id) => match app.marketing_adapter.read_organisation(org_id).await {
			Ok(org) => Some(org),
			Err(Error::NotFound) => {
				return Disposition::Skipped("skipped: organisation deleted".into());
			}
			Err(err) => return Disposition::Failed(format!("organisation lookup failed: {err}")),
		},
		None => None,
	};

	let template = match app.marketing_adapter.read_template(entry.template_id).await {
		Ok(template) => template,
		Err(Error::NotFound) => {
			return Disposition::Failed(format!("template {} does not exist", entry.template_id));
		}
		Err(err) => return Disposition::Failed(format!("template lookup failed: {err}")),
	};

	let mut fields = serde_json::json!({
		"recipient:email": &*entry.recipient_email,
		"base:url": &*app.opts.base_url,
	});
	if let Some(org) = &org {
		fields["org:name"] = serde_json::Value::String(org.name.to_string());
		fields["org:email"] = serde_json::Value::String(org.email.to_string());
	}

	let resolver = Resolver::new(&*app.marketing_adapter, entry.org_id);
	let subject = match resolver
		.resolve(&template.subject, crate::template::BodyKind::Text, &fields, ResolveMode::Full)
		.await
	{
		Ok(subject) => subject,
		Err(err) => return Disposition::Failed(format!("subject resolution failed: {err}")),
	};
	let html_body = match resolver
		.resolve(&template.body_html, crate::template::BodyKind::Html, &fields, ResolveMode::Full)
		.await
	{
		Ok(body) => body,
		Err(err) => return Disposition::Failed(format!("body resolution failed: {err}")),
	};
	let text_body = match &template.body_text {
		Some(text) => match resolver
			.resolve(text, crate::template::BodyKind::Text, &fields, ResolveMode::Full)
			.await
		{
			Ok(body) => Some(body),
			Err(err) => return Disposition::Failed(format!("body resolution failed: {err}")),
		},
		None => None,
	};

	let message = OutgoingEmail {
		to: entry.recipient_email.to_string(),
		subject,
		html_body,
		text_body,
		from_name_override: None,
	};
	match app.email_transport.send(&message).await {
		Ok(()) => Disposition::Sent,
		Err(err) => Disposition::Failed(format!("delivery failed: {err}")),
	}
}


// vim: ts=4

//! Sequence evaluation: which organisations are due for the next step of an
//! active marketing sequence, and enqueuing of the resulting sends.
//!
//! Evaluation is idempotent at the enqueue level: existing non-failed queue
//! entries and `sent` log entries for a (sequence, step, organisation) triple
//! suppress re-enqueuing, so the external cron may re-run it freely. A
//! failure evaluating one sequence or organisation is logged and skipped,
//! never aborting the pass.

use serde::Serialize;
use std::collections::HashSet;

use belfry_types::marketing_adapter::{
	CreateQueueEntry, Organisation, Sequence, SequenceScope, SequenceStep,
};

use crate::prelude::*;

/// Outcome of one evaluation pass
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationStats {
	/// New queue entries created
	pub enqueued: u32,
	/// Organisation evaluation attempts, whether or not a step was due
	pub orgs_processed: u32,
}

/// Evaluate all active sequences and enqueue due sends.
pub async fn evaluate(app: &App) -> BfResult<EvaluationStats> {
	let now = Timestamp::now();
	let mut stats = EvaluationStats::default();

	let sequences = app.marketing_adapter.list_active_sequences().await?;
	debug!("Evaluating {} active sequences", sequences.len());

	for sequence in &sequences {
		let steps = match app.marketing_adapter.list_sequence_steps(sequence.sequence_id).await {
			Ok(steps) => steps,
			Err(err) => {
				warn!("Skipping sequence {}: failed to load steps: {}", sequence.sequence_id, err);
				continue;
			}
		};
		if steps.is_empty() {
			continue;
		}

		let orgs = match scope_organisations(app, sequence).await {
			Ok(orgs) => orgs,
			Err(err) => {
				warn!("Skipping sequence {}: failed to resolve scope: {}", sequence.sequence_id, err);
				continue;
			}
		};

		for org in &orgs {
			stats.orgs_processed += 1;
			match evaluate_org(app, sequence, &steps, org, now).await {
				Ok(true) => stats.enqueued += 1,
				Ok(false) => {}
				Err(err) => {
					warn!(
						"Evaluation failed for sequence {} / org {}: {}",
						sequence.sequence_id, org.org_id, err
					);
				}
			}
		}
	}

	info!("Sequence evaluation done: {} enqueued, {} orgs processed", stats.enqueued, stats.orgs_processed);
	Ok(stats)
}

/// Resolve the organisations a sequence applies to.
async fn scope_organisations(app: &App, sequence: &Sequence) -> BfResult<Vec<Organisation>> {
	match &sequence.scope {
		SequenceScope::Default => {
			let orgs = app.marketing_adapter.list_organisations().await?;
			Ok(orgs.into_iter().filter(|o| !o.marketing_excluded).collect())
		}
		SequenceScope::Organisation(org_id) => {
			Ok(vec![app.marketing_adapter.read_organisation(*org_id).await?])
		}
		SequenceScope::Group(group) => app.marketing_adapter.list_organisations_in_group(group).await,
	}
}

/// Evaluate one (sequence, organisation) pair; returns true when a new queue
/// entry was created.
async fn evaluate_org(
	app: &App,
	sequence: &Sequence,
	steps: &[SequenceStep],
	org: &Organisation,
	now: Timestamp,
) -> BfResult<bool> {
	if is_opted_out(app, org.owner_user_id).await? {
		debug!("Org {} opted out of non-essential email", org.org_id);
		return Ok(false);
	}

	let logged: HashSet<i64> = app
		.marketing_adapter
		.list_logged_steps(sequence.sequence_id, org.org_id)
		.await?
		.into_iter()
		.collect();

	let Some(step) = next_due_step(steps, org.signed_up_at, now, &logged) else {
		return Ok(false);
	};

	// Re-running evaluation must not duplicate entries for the same
	// (sequence, step, organisation) triple.
	if app
		.marketing_adapter
		.queue_entry_exists(sequence.sequence_id, step.step_id, org.org_id)
		.await?
	{
		return Ok(false);
	}

	app.marketing_adapter
		.create_queue_entry(&CreateQueueEntry {
			template_id: step.template_id,
			sequence_id: Some(sequence.sequence_id),
			step_id: Some(step.step_id),
			org_id: Some(org.org_id),
			recipient_user_id: org.owner_user_id,
			recipient_email: &org.email,
			send_at: now,
		})
		.await?;

	info!(
		"Enqueued sequence {} step {} for org {}",
		sequence.sequence_id, step.step_id, org.org_id
	);
	Ok(true)
}

/// The next due step: the lowest-order step that has no `sent` log entry yet
/// and whose cumulative delay relative to the enrollment anchor has elapsed.
///
/// `delay_days` is relative to the PREVIOUS step, not the anchor: a step's due
/// day is the sum of every delay up to and including its own. Delays `[0, 3, 7]`
/// therefore put the third step at day 10, not day 7.
///
/// Only the first unlogged step can be due - later steps carry a larger
/// cumulative delay, and steps are sent strictly in order.
fn next_due_step<'s>(
	steps: &'s [SequenceStep],
	anchor: Timestamp,
	now: Timestamp,
	logged: &HashSet<i64>,
) -> Option<&'s SequenceStep> {
	let mut cumulative_days: i64 = 0;
	for step in steps {
		cumulative_days += i64::from(step.delay_days);
		if logged.contains(&step.step_id) {
			continue;
		}
		if anchor.add_days(cumulative_days) <= now {
			return Some(step);
		}
		return None;
	}
	None
}

/// User Preference opt-out suppresses all non-essential enqueuing.
async fn is_opted_out(app: &App, user_id: Option<i64>) -> BfResult<bool> {
	let Some(user_id) = user_id else { return Ok(false) };
	let pref = app.marketing_adapter.read_user_preference(user_id).await?;
	Ok(pref.is_some_and(|p| p.opted_out_non_essential))
}


// vim: ts=4

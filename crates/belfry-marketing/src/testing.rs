//! In-memory test doubles for the marketing pipelines.

#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use belfry_core::app::{AppOpts, AppState};
use belfry_types::email_transport::{EmailTransport, OutgoingEmail};
use belfry_types::marketing_adapter::*;

use crate::prelude::*;

/// In-memory `MarketingAdapter` backed by mutex-guarded vectors.
#[derive(Debug, Default)]
pub(crate) struct InMemoryMarketing {
	pub orgs: Mutex<Vec<Organisation>>,
	pub sequences: Mutex<Vec<Sequence>>,
	pub steps: Mutex<Vec<SequenceStep>>,
	pub templates: Mutex<Vec<EmailTemplate>>,
	pub blocks: Mutex<Vec<ContentBlock>>,
	pub links: Mutex<Vec<Link>>,
	pub queue: Mutex<Vec<QueueEntry>>,
	pub log: Mutex<Vec<SendLogEntry>>,
	pub prefs: Mutex<Vec<UserPreference>>,
	pub newsletters: Mutex<Vec<Newsletter>>,
	pub contacts: Mutex<Vec<Contact>>,
	/// (org, list) -> contact ids
	pub list_members: Mutex<HashMap<(i64, i64), Vec<i64>>>,
	/// (org, contact, event)
	pub events: Mutex<Vec<(i64, i64, UpcomingEvent)>>,
	/// Contact ids whose event lookup fails, to exercise preparation errors
	pub fail_events_for: Mutex<HashSet<i64>>,
	/// Newsletter ids passed to `mark_newsletter_sent`, in call order
	pub sent_marks: Mutex<Vec<i64>>,
	next_id: Mutex<i64>,
}

impl InMemoryMarketing {
	pub fn new() -> Self {
		Self::default()
	}

	fn next_id(&self) -> i64 {
		let mut id = self.next_id.lock().unwrap();
		*id += 1;
		*id
	}

	pub fn add_org(&self, org: Organisation) {
		self.orgs.lock().unwrap().push(org);
	}

	pub fn add_sequence(&self, sequence: Sequence) {
		self.sequences.lock().unwrap().push(sequence);
	}

	pub fn add_step(&self, step: SequenceStep) {
		self.steps.lock().unwrap().push(step);
	}

	pub fn add_template(&self, template: EmailTemplate) {
		self.templates.lock().unwrap().push(template);
	}

	pub fn add_block(&self, key: &str, body_html: &str, body_text: Option<&str>) {
		let block_id = self.next_id();
		self.blocks.lock().unwrap().push(ContentBlock {
			block_id,
			title: key.into(),
			key: key.into(),
			body_html: body_html.into(),
			body_text: body_text.map(Into::into),
			tags: Box::new([]),
			status: TemplateStatus::Active,
			created_at: Timestamp(0),
			updated_at: Timestamp(0),
		});
	}

	pub fn add_link(&self, link: Link) {
		self.links.lock().unwrap().push(link);
	}

	pub fn add_newsletter(&self, newsletter: Newsletter) {
		self.newsletters.lock().unwrap().push(newsletter);
	}

	pub fn add_contact_to_list(&self, list_id: i64, contact: Contact) {
		let key = (contact.org_id.0, list_id);
		self.list_members.lock().unwrap().entry(key).or_default().push(contact.contact_id);
		self.contacts.lock().unwrap().push(contact);
	}

	pub fn queue_snapshot(&self) -> Vec<QueueEntry> {
		self.queue.lock().unwrap().clone()
	}

	pub fn log_snapshot(&self) -> Vec<SendLogEntry> {
		self.log.lock().unwrap().clone()
	}
}

#[async_trait]
impl MarketingAdapter for InMemoryMarketing {
	async fn read_organisation(&self, org_id: OrgId) -> BfResult<Organisation> {
		self.orgs
			.lock()
			.unwrap()
			.iter()
			.find(|o| o.org_id == org_id)
			.cloned()
			.ok_or(Error::NotFound)
	}

	async fn list_organisations(&self) -> BfResult<Vec<Organisation>> {
		Ok(self.orgs.lock().unwrap().clone())
	}

	async fn list_organisations_in_group(&self, group: &str) -> BfResult<Vec<Organisation>> {
		Ok(self
			.orgs
			.lock()
			.unwrap()
			.iter()
			.filter(|o| o.groups.iter().any(|g| &**g == group))
			.cloned()
			.collect())
	}

	async fn list_active_sequences(&self) -> BfResult<Vec<Sequence>> {
		Ok(self
			.sequences
			.lock()
			.unwrap()
			.iter()
			.filter(|s| s.status == SequenceStatus::Active)
			.cloned()
			.collect())
	}

	async fn list_sequence_steps(&self, sequence_id: i64) -> BfResult<Vec<SequenceStep>> {
		let mut steps: Vec<_> = self
			.steps
			.lock()
			.unwrap()
			.iter()
			.filter(|s| s.sequence_id == sequence_id)
			.cloned()
			.collect();
		steps.sort_by_key(|s| s.order);
		Ok(steps)
	}

	async fn read_template(&self, template_id: i64) -> BfResult<EmailTemplate> {
		self.templates
			.lock()
			.unwrap()
			.iter()
			.find(|t| t.template_id == template_id)
			.cloned()
			.ok_or(Error::NotFound)
	}

	async fn read_content_block(&self, key: &str) -> BfResult<Option<ContentBlock>> {
		Ok(self.blocks.lock().unwrap().iter().find(|b| &*b.key == key).cloned())
	}

	async fn read_link(&self, key: &str, org_id: Option<OrgId>) -> BfResult<Option<Link>> {
		let links = self.links.lock().unwrap();
		if let Some(org_id) = org_id {
			if let Some(link) =
				links.iter().find(|l| &*l.key == key && l.org_id == Some(org_id))
			{
				return Ok(Some(link.clone()));
			}
		}
		Ok(links.iter().find(|l| &*l.key == key && l.org_id.is_none()).cloned())
	}

	async fn create_queue_entry(&self, entry: &CreateQueueEntry<'_>) -> BfResult<i64> {
		let entry_id = self.next_id();
		self.queue.lock().unwrap().push(QueueEntry {
			entry_id,
			template_id: entry.template_id,
			sequence_id: entry.sequence_id,
			step_id: entry.step_id,
			org_id: entry.org_id,
			recipient_user_id: entry.recipient_user_id,
			recipient_email: entry.recipient_email.into(),
			send_at: entry.send_at,
			status: QueueStatus::Pending,
			attempts: 0,
			last_error: None,
			created_at: Timestamp::now(),
		});
		Ok(entry_id)
	}

	async fn list_due_queue_entries(&self, now: Timestamp) -> BfResult<Vec<QueueEntry>> {
		let mut due: Vec<_> = self
			.queue
			.lock()
			.unwrap()
			.iter()
			.filter(|e| e.status == QueueStatus::Pending && e.send_at <= now)
			.cloned()
			.collect();
		due.sort_by_key(|e| e.send_at);
		Ok(due)
	}

	async fn claim_queue_entry(&self, entry_id: i64) -> BfResult<bool> {
		let mut queue = self.queue.lock().unwrap();
		match queue.iter_mut().find(|e| e.entry_id == entry_id) {
			Some(entry) if entry.status == QueueStatus::Pending => {
				entry.status = QueueStatus::Sending;
				Ok(true)
			}
			_ => Ok(false),
		}
	}

	async fn update_queue_entry_result(
		&self,
		entry_id: i64,
		status: QueueStatus,
		error: Option<&str>,
	) -> BfResult<()> {
		let mut queue = self.queue.lock().unwrap();
		let entry =
			queue.iter_mut().find(|e| e.entry_id == entry_id).ok_or(Error::NotFound)?;
		entry.status = status;
		entry.attempts += 1;
		entry.last_error = error.map(Into::into);
		Ok(())
	}

	async fn queue_entry_exists(
		&self,
		sequence_id: i64,
		step_id: i64,
		org_id: OrgId,
	) -> BfResult<bool> {
		Ok(self.queue.lock().unwrap().iter().any(|e| {
			e.sequence_id == Some(sequence_id)
				&& e.step_id == Some(step_id)
				&& e.org_id == Some(org_id)
				&& e.status != QueueStatus::Failed
		}))
	}

	async fn read_queue_stats(&self) -> BfResult<QueueStats> {
		let mut stats = QueueStats::default();
		for entry in self.queue.lock().unwrap().iter() {
			match entry.status {
				QueueStatus::Pending => stats.pending += 1,
				QueueStatus::Sending => stats.sending += 1,
				QueueStatus::Sent => stats.sent += 1,
				QueueStatus::Failed => stats.failed += 1,
			}
		}
		Ok(stats)
	}

	async fn create_send_log(&self, entry: &CreateSendLog<'_>) -> BfResult<i64> {
		let log_id = self.next_id();
		self.log.lock().unwrap().push(SendLogEntry {
			log_id,
			template_id: entry.template_id,
			sequence_id: entry.sequence_id,
			step_id: entry.step_id,
			org_id: entry.org_id,
			recipient_email: entry.recipient_email.into(),
			sent_at: entry.sent_at,
			status: entry.status,
			error: entry.error.map(Into::into),
		});
		Ok(log_id)
	}

	async fn list_logged_steps(&self, sequence_id: i64, org_id: OrgId) -> BfResult<Vec<i64>> {
		Ok(self
			.log
			.lock()
			.unwrap()
			.iter()
			.filter(|l| {
				l.sequence_id == Some(sequence_id)
					&& l.org_id == Some(org_id)
					&& l.status == SendStatus::Sent
			})
			.filter_map(|l| l.step_id)
			.collect())
	}

	async fn read_user_preference(&self, user_id: i64) -> BfResult<Option<UserPreference>> {
		Ok(self.prefs.lock().unwrap().iter().find(|p| p.user_id == user_id).cloned())
	}

	async fn set_opted_out(&self, user_id: i64, opted_out: bool) -> BfResult<UserPreference> {
		let mut prefs = self.prefs.lock().unwrap();
		if let Some(pref) = prefs.iter_mut().find(|p| p.user_id == user_id) {
			pref.opted_out_non_essential = opted_out;
			pref.updated_at = Timestamp::now();
			return Ok(pref.clone());
		}
		let pref = UserPreference {
			pref_id: {
				let mut id = self.next_id.lock().unwrap();
				*id += 1;
				*id
			},
			user_id,
			opted_out_non_essential: opted_out,
			created_at: Timestamp::now(),
			updated_at: Timestamp::now(),
		};
		prefs.push(pref.clone());
		Ok(pref)
	}

	async fn read_newsletter(&self, org_id: OrgId, newsletter_id: i64) -> BfResult<Newsletter> {
		self.newsletters
			.lock()
			.unwrap()
			.iter()
			.find(|n| n.org_id == org_id && n.newsletter_id == newsletter_id)
			.cloned()
			.ok_or(Error::NotFound)
	}

	async fn list_list_members(&self, org_id: OrgId, list_id: i64) -> BfResult<Vec<Contact>> {
		let members = self.list_members.lock().unwrap();
		let Some(ids) = members.get(&(org_id.0, list_id)) else { return Ok(vec![]) };
		let contacts = self.contacts.lock().unwrap();
		Ok(ids.iter().filter_map(|id| contacts.iter().find(|c| c.contact_id == *id).cloned()).collect())
	}

	async fn list_upcoming_events(
		&self,
		org_id: OrgId,
		contact_id: i64,
		after: Timestamp,
	) -> BfResult<Vec<UpcomingEvent>> {
		if self.fail_events_for.lock().unwrap().contains(&contact_id) {
			return Err(Error::DbError);
		}
		let mut events: Vec<_> = self
			.events
			.lock()
			.unwrap()
			.iter()
			.filter(|(o, c, e)| *o == org_id.0 && *c == contact_id && e.starts_at > after)
			.map(|(_, _, e)| e.clone())
			.collect();
		events.sort_by_key(|e| e.starts_at);
		Ok(events)
	}

	async fn mark_newsletter_sent(
		&self,
		org_id: OrgId,
		newsletter_id: i64,
		at: Timestamp,
	) -> BfResult<()> {
		self.sent_marks.lock().unwrap().push(newsletter_id);
		let mut newsletters = self.newsletters.lock().unwrap();
		let newsletter = newsletters
			.iter_mut()
			.find(|n| n.org_id == org_id && n.newsletter_id == newsletter_id)
			.ok_or(Error::NotFound)?;
		newsletter.status = NewsletterStatus::Sent;
		newsletter.sent_at = Some(at);
		Ok(())
	}
}

/// Transport double that records every message and can fail per address.
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
	pub sent: Mutex<Vec<OutgoingEmail>>,
	pub fail_to: Mutex<HashSet<String>>,
}

impl MockTransport {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn fail_for(&self, address: &str) {
		self.fail_to.lock().unwrap().insert(address.to_string());
	}

	pub fn sent_to(&self) -> Vec<String> {
		self.sent.lock().unwrap().iter().map(|m| m.to.clone()).collect()
	}
}

#[async_trait]
impl EmailTransport for MockTransport {
	async fn send(&self, message: &OutgoingEmail) -> BfResult<()> {
		if self.fail_to.lock().unwrap().contains(&message.to) {
			return Err(Error::ServiceUnavailable("mock transport rejection".into()));
		}
		self.sent.lock().unwrap().push(message.clone());
		Ok(())
	}
}

/// Assemble an `App` over the given doubles with default options.
pub(crate) fn test_app(adapter: Arc<InMemoryMarketing>, transport: Arc<MockTransport>) -> App {
	Arc::new(AppState {
		opts: AppOpts::default(),
		marketing_adapter: adapter,
		email_transport: transport,
	})
}

// Record builders with sensible defaults
//****************************************

pub(crate) fn org(org_id: i64, signed_up_at: Timestamp) -> Organisation {
	Organisation {
		org_id: OrgId(org_id),
		name: format!("Org {}", org_id).into(),
		email: format!("office{}@example.org", org_id).into(),
		groups: Box::new([]),
		signed_up_at,
		marketing_excluded: false,
		owner_user_id: Some(org_id * 100),
	}
}

pub(crate) fn sequence(sequence_id: i64, scope: SequenceScope) -> Sequence {
	Sequence {
		sequence_id,
		name: format!("Sequence {}", sequence_id).into(),
		status: SequenceStatus::Active,
		scope,
		created_by: "admin".into(),
		created_at: Timestamp(0),
		updated_at: Timestamp(0),
	}
}

pub(crate) fn step(
	step_id: i64,
	sequence_id: i64,
	order: u32,
	delay_days: u32,
	template_id: i64,
) -> SequenceStep {
	SequenceStep { step_id, sequence_id, order, delay_days, template_id, condition: None }
}

pub(crate) fn template(template_id: i64, subject: &str, body_html: &str) -> EmailTemplate {
	EmailTemplate {
		template_id,
		name: format!("Template {}", template_id).into(),
		status: TemplateStatus::Active,
		subject: subject.into(),
		preview_text: None,
		body_html: body_html.into(),
		body_text: None,
		tags: Box::new([]),
		created_by: "admin".into(),
		created_at: Timestamp(0),
		updated_at: Timestamp(0),
	}
}

pub(crate) fn contact(contact_id: i64, org_id: i64, email: &str, subscribed: bool) -> Contact {
	Contact {
		contact_id,
		org_id: OrgId(org_id),
		first_name: Some(format!("Contact{}", contact_id).into()),
		last_name: None,
		email: email.into(),
		subscribed,
	}
}

pub(crate) fn newsletter(newsletter_id: i64, org_id: i64, subject: &str, body: &str) -> Newsletter {
	Newsletter {
		newsletter_id,
		org_id: OrgId(org_id),
		subject: subject.into(),
		body_html: body.into(),
		body_text: None,
		status: NewsletterStatus::Draft,
		sent_at: None,
		created_at: Timestamp(0),
		updated_at: Timestamp(0),
	}
}

// vim: ts=4

//! Adapter that stores and queries all marketing email records.
//!
//! The storage layer is an external collaborator behind this trait: the
//! evaluator, queue processor, and newsletter sender only ever see typed
//! records and never touch SQL. Lifecycle rules worth keeping in mind:
//!
//! - Queue entry `status` is owned by the evaluator (creation) and the queue
//!   processor (transitions); nothing else mutates it.
//! - The send log is append-only, one entry per delivery attempt.
//! - Templates, blocks, and links are owned by the admin UI layer and are
//!   read-only inputs here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt::Debug;

use crate::error::BfResult;
use crate::types::{OrgId, Timestamp};

// Organisations //
//***************//

/// A tenant organisation, as seen by the marketing subsystem.
#[skip_serializing_none]
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Organisation {
	pub org_id: OrgId,
	pub name: Box<str>,
	/// Primary contact address used for sequence mail
	pub email: Box<str>,
	/// Group tags, used by group-scoped sequences
	pub groups: Box<[Box<str>]>,
	/// Enrollment anchor for sequence delay computation
	pub signed_up_at: Timestamp,
	/// Excluded from default-scoped sequences
	pub marketing_excluded: bool,
	/// User whose preference row governs opt-out for this organisation
	pub owner_user_id: Option<i64>,
}

// Sequences //
//***********//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceStatus {
	Draft,
	Active,
	Paused,
	Archived,
}

/// Which organisations a sequence applies to.
///
/// Modelled as a tagged variant so scope resolution is exhaustive; the
/// `appliesTo` discriminant matches the wire format of the admin UI.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "appliesTo", content = "scope", rename_all = "lowercase")]
pub enum SequenceScope {
	/// All organisations except those excluded from marketing
	Default,
	/// One named organisation
	Organisation(OrgId),
	/// All organisations tagged with this group
	Group(Box<str>),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sequence {
	pub sequence_id: i64,
	pub name: Box<str>,
	pub status: SequenceStatus,
	#[serde(flatten)]
	pub scope: SequenceScope,
	pub created_by: Box<str>,
	pub created_at: Timestamp,
	pub updated_at: Timestamp,
}

/// One step of a sequence. Steps have unique, strictly increasing `order`
/// within their sequence; a step is due once the sum of `delay_days` up to
/// and including it has elapsed since the organisation's enrollment anchor.
#[skip_serializing_none]
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceStep {
	pub step_id: i64,
	pub sequence_id: i64,
	pub order: u32,
	pub delay_days: u32,
	pub template_id: i64,
	/// Opaque condition expression carried from the admin UI; not evaluated
	pub condition: Option<Box<str>>,
}

// Templates, blocks, links //
//**************************//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateStatus {
	Draft,
	Active,
	Archived,
}

/// An email template / mailshot. Immutable once referenced by a send log
/// entry; the admin UI duplicates under a new id instead of mutating history.
#[skip_serializing_none]
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailTemplate {
	pub template_id: i64,
	pub name: Box<str>,
	pub status: TemplateStatus,
	pub subject: Box<str>,
	pub preview_text: Option<Box<str>>,
	pub body_html: Box<str>,
	pub body_text: Option<Box<str>>,
	pub tags: Box<[Box<str>]>,
	pub created_by: Box<str>,
	pub created_at: Timestamp,
	pub updated_at: Timestamp,
}

/// A reusable content fragment, referenced from bodies as `{{block:KEY}}`.
#[skip_serializing_none]
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlock {
	pub block_id: i64,
	pub title: Box<str>,
	pub key: Box<str>,
	pub body_html: Box<str>,
	pub body_text: Option<Box<str>>,
	pub tags: Box<[Box<str>]>,
	pub status: TemplateStatus,
	pub created_at: Timestamp,
	pub updated_at: Timestamp,
}

/// A named link, referenced from bodies as `{{link:KEY}}`. An
/// organisation-specific row (org_id set) overrides the global default.
#[skip_serializing_none]
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
	pub link_id: i64,
	pub key: Box<str>,
	pub target_url: Box<str>,
	pub org_id: Option<OrgId>,
	pub status: TemplateStatus,
}

// Send queue //
//************//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
	Pending,
	Sending,
	Sent,
	Failed,
}

impl QueueStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			QueueStatus::Pending => "pending",
			QueueStatus::Sending => "sending",
			QueueStatus::Sent => "sent",
			QueueStatus::Failed => "failed",
		}
	}

	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"pending" => Some(QueueStatus::Pending),
			"sending" => Some(QueueStatus::Sending),
			"sent" => Some(QueueStatus::Sent),
			"failed" => Some(QueueStatus::Failed),
			_ => None,
		}
	}
}

#[skip_serializing_none]
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
	pub entry_id: i64,
	pub template_id: i64,
	pub sequence_id: Option<i64>,
	pub step_id: Option<i64>,
	pub org_id: Option<OrgId>,
	pub recipient_user_id: Option<i64>,
	pub recipient_email: Box<str>,
	pub send_at: Timestamp,
	pub status: QueueStatus,
	pub attempts: u32,
	pub last_error: Option<Box<str>>,
	pub created_at: Timestamp,
}

/// Data needed to enqueue a send
#[derive(Debug)]
pub struct CreateQueueEntry<'a> {
	pub template_id: i64,
	pub sequence_id: Option<i64>,
	pub step_id: Option<i64>,
	pub org_id: Option<OrgId>,
	pub recipient_user_id: Option<i64>,
	pub recipient_email: &'a str,
	pub send_at: Timestamp,
}

/// Queue entry counts by status, for the admin console
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
	pub pending: u32,
	pub sending: u32,
	pub sent: u32,
	pub failed: u32,
}

// Send log //
//**********//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
	Sent,
	Failed,
}

impl SendStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			SendStatus::Sent => "sent",
			SendStatus::Failed => "failed",
		}
	}
}

#[skip_serializing_none]
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendLogEntry {
	pub log_id: i64,
	pub template_id: i64,
	pub sequence_id: Option<i64>,
	pub step_id: Option<i64>,
	pub org_id: Option<OrgId>,
	pub recipient_email: Box<str>,
	pub sent_at: Timestamp,
	pub status: SendStatus,
	pub error: Option<Box<str>>,
}

/// Data needed to append a send log entry (one per attempt)
#[derive(Debug)]
pub struct CreateSendLog<'a> {
	pub template_id: i64,
	pub sequence_id: Option<i64>,
	pub step_id: Option<i64>,
	pub org_id: Option<OrgId>,
	pub recipient_email: &'a str,
	pub sent_at: Timestamp,
	pub status: SendStatus,
	pub error: Option<&'a str>,
}

// User preferences //
//******************//

/// One row per user, created lazily on first unsubscribe.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreference {
	pub pref_id: i64,
	pub user_id: i64,
	pub opted_out_non_essential: bool,
	pub created_at: Timestamp,
	pub updated_at: Timestamp,
}

// Newsletters //
//*************//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsletterStatus {
	Draft,
	Scheduled,
	Sent,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Newsletter {
	pub newsletter_id: i64,
	pub org_id: OrgId,
	pub subject: Box<str>,
	pub body_html: Box<str>,
	pub body_text: Option<Box<str>>,
	pub status: NewsletterStatus,
	pub sent_at: Option<Timestamp>,
	pub created_at: Timestamp,
	pub updated_at: Timestamp,
}

/// A contact in an organisation's Hub CRM.
#[skip_serializing_none]
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
	pub contact_id: i64,
	pub org_id: OrgId,
	pub first_name: Option<Box<str>>,
	pub last_name: Option<Box<str>>,
	pub email: Box<str>,
	/// `false` is the only implicit opt-out signal on a contact
	pub subscribed: bool,
}

/// An upcoming event/rota entry for a contact, rendered into newsletters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingEvent {
	pub title: Box<str>,
	pub starts_at: Timestamp,
}

// Adapter trait //
//***************//

/// A Belfry marketing store adapter.
///
/// Implementations provide CRUD-plus-query access over the marketing record
/// collections; each method is tenant-scoped where the record family demands
/// it. The store exposes no transaction primitive to the pipelines - the only
/// atomic guard is `claim_queue_entry`.
#[async_trait]
pub trait MarketingAdapter: Debug + Send + Sync {
	// Organisations
	async fn read_organisation(&self, org_id: OrgId) -> BfResult<Organisation>;
	async fn list_organisations(&self) -> BfResult<Vec<Organisation>>;
	async fn list_organisations_in_group(&self, group: &str) -> BfResult<Vec<Organisation>>;

	// Sequences
	async fn list_active_sequences(&self) -> BfResult<Vec<Sequence>>;
	/// Steps of a sequence, ordered by `order` ascending
	async fn list_sequence_steps(&self, sequence_id: i64) -> BfResult<Vec<SequenceStep>>;

	// Templates, blocks, links
	async fn read_template(&self, template_id: i64) -> BfResult<EmailTemplate>;
	async fn read_content_block(&self, key: &str) -> BfResult<Option<ContentBlock>>;
	/// Resolves a link key; an organisation-specific override takes priority
	/// over the global default when `org_id` is given.
	async fn read_link(&self, key: &str, org_id: Option<OrgId>) -> BfResult<Option<Link>>;

	// Send queue
	async fn create_queue_entry(&self, entry: &CreateQueueEntry<'_>) -> BfResult<i64>;
	/// All entries with `status = pending` and `send_at <= now`, ordered by
	/// `send_at` ascending (oldest due first)
	async fn list_due_queue_entries(&self, now: Timestamp) -> BfResult<Vec<QueueEntry>>;
	/// Atomically transitions the entry from `pending` to `sending`.
	/// Returns false when the entry was already claimed or is not pending.
	async fn claim_queue_entry(&self, entry_id: i64) -> BfResult<bool>;
	/// Records the outcome of a delivery attempt: sets the terminal status,
	/// increments `attempts`, and stores the error message if any.
	async fn update_queue_entry_result(
		&self,
		entry_id: i64,
		status: QueueStatus,
		error: Option<&str>,
	) -> BfResult<()>;
	/// True when a non-failed entry already exists for this
	/// (sequence, step, organisation) triple. Failed entries do not count,
	/// so a later evaluation pass may re-enqueue them.
	async fn queue_entry_exists(
		&self,
		sequence_id: i64,
		step_id: i64,
		org_id: OrgId,
	) -> BfResult<bool>;
	async fn read_queue_stats(&self) -> BfResult<QueueStats>;

	// Send log
	async fn create_send_log(&self, entry: &CreateSendLog<'_>) -> BfResult<i64>;
	/// Step ids of this sequence with a `sent` log entry for the organisation
	async fn list_logged_steps(&self, sequence_id: i64, org_id: OrgId) -> BfResult<Vec<i64>>;

	// User preferences
	async fn read_user_preference(&self, user_id: i64) -> BfResult<Option<UserPreference>>;
	/// Creates the preference row on first use, updates it afterwards
	async fn set_opted_out(&self, user_id: i64, opted_out: bool) -> BfResult<UserPreference>;

	// Newsletters
	async fn read_newsletter(&self, org_id: OrgId, newsletter_id: i64) -> BfResult<Newsletter>;
	async fn list_list_members(&self, org_id: OrgId, list_id: i64) -> BfResult<Vec<Contact>>;
	async fn list_upcoming_events(
		&self,
		org_id: OrgId,
		contact_id: i64,
		after: Timestamp,
	) -> BfResult<Vec<UpcomingEvent>>;
	/// Stamps the newsletter as sent; called exactly once per batch send
	async fn mark_newsletter_sent(
		&self,
		org_id: OrgId,
		newsletter_id: i64,
		at: Timestamp,
	) -> BfResult<()>;
}


// vim: ts=4

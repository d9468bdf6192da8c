//! SQLite-backed marketing store adapter for Belfry
//!
//! One pool, WAL journal, schema created on startup. The domain modules hold
//! the queries; this file wires them into the `MarketingAdapter` trait.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{self, SqlitePool};

use belfry::marketing_adapter::{
	Contact, ContentBlock, CreateQueueEntry, CreateSendLog, EmailTemplate, Link, MarketingAdapter,
	Newsletter, Organisation, QueueEntry, QueueStats, QueueStatus, Sequence, SequenceStep,
	UpcomingEvent, UserPreference,
};
use belfry::prelude::*;

mod log;
mod newsletter;
mod organisation;
mod preference;
mod queue;
mod schema;
mod sequence;
mod template;
mod utils;

use schema::init_db;

#[derive(Debug)]
pub struct MarketingAdapterSqlite {
	db: SqlitePool,
}

impl MarketingAdapterSqlite {
	pub async fn new(path: impl AsRef<Path>) -> BfResult<Self> {
		let opts = sqlite::SqliteConnectOptions::new()
			.filename(path.as_ref())
			.create_if_missing(true)
			.journal_mode(sqlite::SqliteJournalMode::Wal);
		let db = sqlite::SqlitePoolOptions::new()
			.max_connections(5)
			.connect_with(opts)
			.await
			.inspect_err(|err| error!("DbError: {:#?}", err))
			.or(Err(Error::DbError))?;

		init_db(&db)
			.await
			.inspect_err(|err| error!("DbError: {:#?}", err))
			.or(Err(Error::DbError))?;

		Ok(Self { db })
	}

	/// The underlying pool, for seeding in tests and tooling
	pub fn pool(&self) -> &SqlitePool {
		&self.db
	}
}

#[async_trait]
impl MarketingAdapter for MarketingAdapterSqlite {
	// Organisations
	//***************
	async fn read_organisation(&self, org_id: OrgId) -> BfResult<Organisation> {
		organisation::read(&self.db, org_id).await
	}

	async fn list_organisations(&self) -> BfResult<Vec<Organisation>> {
		organisation::list(&self.db).await
	}

	async fn list_organisations_in_group(&self, group: &str) -> BfResult<Vec<Organisation>> {
		organisation::list_in_group(&self.db, group).await
	}

	// Sequences
	//***********
	async fn list_active_sequences(&self) -> BfResult<Vec<Sequence>> {
		sequence::list_active(&self.db).await
	}

	async fn list_sequence_steps(&self, sequence_id: i64) -> BfResult<Vec<SequenceStep>> {
		sequence::list_steps(&self.db, sequence_id).await
	}

	// Templates, blocks, links
	//**************************
	async fn read_template(&self, template_id: i64) -> BfResult<EmailTemplate> {
		template::read(&self.db, template_id).await
	}

	async fn read_content_block(&self, key: &str) -> BfResult<Option<ContentBlock>> {
		template::read_block(&self.db, key).await
	}

	async fn read_link(&self, key: &str, org_id: Option<OrgId>) -> BfResult<Option<Link>> {
		template::read_link(&self.db, key, org_id).await
	}

	// Send queue
	//************
	async fn create_queue_entry(&self, entry: &CreateQueueEntry<'_>) -> BfResult<i64> {
		queue::create(&self.db, entry).await
	}

	async fn list_due_queue_entries(&self, now: Timestamp) -> BfResult<Vec<QueueEntry>> {
		queue::list_due(&self.db, now).await
	}

	async fn claim_queue_entry(&self, entry_id: i64) -> BfResult<bool> {
		queue::claim(&self.db, entry_id).await
	}

	async fn update_queue_entry_result(
		&self,
		entry_id: i64,
		status: QueueStatus,
		error: Option<&str>,
	) -> BfResult<()> {
		queue::update_result(&self.db, entry_id, status, error).await
	}

	async fn queue_entry_exists(
		&self,
		sequence_id: i64,
		step_id: i64,
		org_id: OrgId,
	) -> BfResult<bool> {
		queue::exists(&self.db, sequence_id, step_id, org_id).await
	}

	async fn read_queue_stats(&self) -> BfResult<QueueStats> {
		queue::stats(&self.db).await
	}

	// Send log
	//**********
	async fn create_send_log(&self, entry: &CreateSendLog<'_>) -> BfResult<i64> {
		log::create(&self.db, entry).await
	}

	async fn list_logged_steps(&self, sequence_id: i64, org_id: OrgId) -> BfResult<Vec<i64>> {
		log::list_logged_steps(&self.db, sequence_id, org_id).await
	}

	// User preferences
	//******************
	async fn read_user_preference(&self, user_id: i64) -> BfResult<Option<UserPreference>> {
		preference::read(&self.db, user_id).await
	}

	async fn set_opted_out(&self, user_id: i64, opted_out: bool) -> BfResult<UserPreference> {
		preference::set_opted_out(&self.db, user_id, opted_out).await
	}

	// Newsletters
	//*************
	async fn read_newsletter(&self, org_id: OrgId, newsletter_id: i64) -> BfResult<Newsletter> {
		newsletter::read(&self.db, org_id, newsletter_id).await
	}

	async fn list_list_members(&self, org_id: OrgId, list_id: i64) -> BfResult<Vec<Contact>> {
		newsletter::list_members(&self.db, org_id, list_id).await
	}

	async fn list_upcoming_events(
		&self,
		org_id: OrgId,
		contact_id: i64,
		after: Timestamp,
	) -> BfResult<Vec<UpcomingEvent>> {
		newsletter::list_events(&self.db, org_id, contact_id, after).await
	}

	async fn mark_newsletter_sent(
		&self,
		org_id: OrgId,
		newsletter_id: i64,
		at: Timestamp,
	) -> BfResult<()> {
		newsletter::mark_sent(&self.db, org_id, newsletter_id, at).await
	}
}

// vim: ts=4

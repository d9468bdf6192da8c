//! Database schema initialization
//!
//! Creates the marketing tables and indexes. All statements are idempotent
//! so startup can run them unconditionally.

use sqlx::SqlitePool;

pub(crate) async fn init_db(db: &SqlitePool) -> Result<(), sqlx::Error> {
	let mut tx = db.begin().await?;

	// Organisations
	//***************
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS organisations (
		org_id integer NOT NULL,
		name text NOT NULL,
		email text NOT NULL,
		groups text NOT NULL DEFAULT '',
		signed_up_at datetime NOT NULL DEFAULT (unixepoch()),
		marketing_excluded integer NOT NULL DEFAULT 0,
		owner_user_id integer,
		PRIMARY KEY(org_id)
	)",
	)
	.execute(&mut *tx)
	.await?;

	// Sequences
	//***********
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS marketing_sequences (
		sequence_id integer NOT NULL,
		name text NOT NULL,
		status text NOT NULL DEFAULT 'draft',
		applies_to text NOT NULL DEFAULT 'default',
		scope text,
		created_by text NOT NULL DEFAULT '',
		created_at datetime NOT NULL DEFAULT (unixepoch()),
		updated_at datetime NOT NULL DEFAULT (unixepoch()),
		PRIMARY KEY(sequence_id)
	)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS sequence_steps (
		step_id integer NOT NULL,
		sequence_id integer NOT NULL,
		step_order integer NOT NULL,
		delay_days integer NOT NULL DEFAULT 0,
		template_id integer NOT NULL,
		condition text,
		PRIMARY KEY(step_id),
		UNIQUE(sequence_id, step_order)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_sequence_steps_seq ON sequence_steps(sequence_id)")
		.execute(&mut *tx)
		.await?;

	// Templates, blocks, links
	//**************************
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS email_templates (
		template_id integer NOT NULL,
		name text NOT NULL,
		status text NOT NULL DEFAULT 'draft',
		subject text NOT NULL,
		preview_text text,
		body_html text NOT NULL,
		body_text text,
		tags text NOT NULL DEFAULT '',
		created_by text NOT NULL DEFAULT '',
		created_at datetime NOT NULL DEFAULT (unixepoch()),
		updated_at datetime NOT NULL DEFAULT (unixepoch()),
		PRIMARY KEY(template_id)
	)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS content_blocks (
		block_id integer NOT NULL,
		title text NOT NULL,
		key text NOT NULL,
		body_html text NOT NULL,
		body_text text,
		tags text NOT NULL DEFAULT '',
		status text NOT NULL DEFAULT 'active',
		created_at datetime NOT NULL DEFAULT (unixepoch()),
		updated_at datetime NOT NULL DEFAULT (unixepoch()),
		PRIMARY KEY(block_id),
		UNIQUE(key)
	)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS links (
		link_id integer NOT NULL,
		key text NOT NULL,
		target_url text NOT NULL,
		org_id integer,
		status text NOT NULL DEFAULT 'active',
		PRIMARY KEY(link_id)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_key ON links(key)")
		.execute(&mut *tx)
		.await?;

	// Send queue
	//************
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS send_queue (
		entry_id integer NOT NULL,
		template_id integer NOT NULL,
		sequence_id integer,
		step_id integer,
		org_id integer,
		recipient_user_id integer,
		recipient_email text NOT NULL,
		send_at datetime NOT NULL,
		status text NOT NULL DEFAULT 'pending',
		attempts integer NOT NULL DEFAULT 0,
		last_error text,
		created_at datetime NOT NULL DEFAULT (unixepoch()),
		PRIMARY KEY(entry_id)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_send_queue_due ON send_queue(status, send_at)")
		.execute(&mut *tx)
		.await?;
	sqlx::query(
		"CREATE INDEX IF NOT EXISTS idx_send_queue_step ON send_queue(sequence_id, step_id, org_id)",
	)
	.execute(&mut *tx)
	.await?;

	// Send log
	//**********
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS send_log (
		log_id integer NOT NULL,
		template_id integer NOT NULL,
		sequence_id integer,
		step_id integer,
		org_id integer,
		recipient_email text NOT NULL,
		sent_at datetime NOT NULL,
		status text NOT NULL,
		error text,
		PRIMARY KEY(log_id)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_send_log_seq ON send_log(sequence_id, org_id)")
		.execute(&mut *tx)
		.await?;

	// User preferences
	//******************
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS user_preferences (
		pref_id integer NOT NULL,
		user_id integer NOT NULL,
		opted_out_non_essential integer NOT NULL DEFAULT 0,
		created_at datetime NOT NULL DEFAULT (unixepoch()),
		updated_at datetime NOT NULL DEFAULT (unixepoch()),
		PRIMARY KEY(pref_id),
		UNIQUE(user_id)
	)",
	)
	.execute(&mut *tx)
	.await?;

	// Newsletters and contacts
	//**************************
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS newsletters (
		newsletter_id integer NOT NULL,
		org_id integer NOT NULL,
		subject text NOT NULL,
		body_html text NOT NULL,
		body_text text,
		status text NOT NULL DEFAULT 'draft',
		sent_at datetime,
		created_at datetime NOT NULL DEFAULT (unixepoch()),
		updated_at datetime NOT NULL DEFAULT (unixepoch()),
		PRIMARY KEY(newsletter_id)
	)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS contacts (
		contact_id integer NOT NULL,
		org_id integer NOT NULL,
		first_name text,
		last_name text,
		email text NOT NULL,
		subscribed integer NOT NULL DEFAULT 1,
		PRIMARY KEY(contact_id)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_contacts_org ON contacts(org_id)")
		.execute(&mut *tx)
		.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS contact_list_members (
		list_id integer NOT NULL,
		contact_id integer NOT NULL,
		PRIMARY KEY(list_id, contact_id)
	)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS events (
		event_id integer NOT NULL,
		org_id integer NOT NULL,
		title text NOT NULL,
		starts_at datetime NOT NULL,
		PRIMARY KEY(event_id)
	)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS event_attendees (
		event_id integer NOT NULL,
		contact_id integer NOT NULL,
		PRIMARY KEY(event_id, contact_id)
	)",
	)
	.execute(&mut *tx)
	.await?;

	tx.commit().await?;

	Ok(())
}

// vim: ts=4

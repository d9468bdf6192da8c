//! Email transport trait - the external delivery collaborator.
//!
//! The marketing pipelines only orchestrate calls into this trait; actual
//! delivery (SMTP, API provider, ...) lives in an adapter crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::error::BfResult;

/// A fully rendered message, ready for delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingEmail {
	pub to: String,
	pub subject: String,
	pub html_body: String,
	pub text_body: Option<String>,
	/// Optional sender name override (e.g. the organisation's display name)
	#[serde(default)]
	pub from_name_override: Option<String>,
}

/// A Belfry email transport adapter.
///
/// `send` returns per-message success/failure; callers treat failures as
/// per-recipient outcomes and never let one rejection abort a batch.
#[async_trait]
pub trait EmailTransport: Debug + Send + Sync {
	async fn send(&self, message: &OutgoingEmail) -> BfResult<()>;
}

// vim: ts=4

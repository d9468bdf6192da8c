//! App state type

use std::sync::Arc;

use belfry_types::email_transport::EmailTransport;
use belfry_types::marketing_adapter::MarketingAdapter;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runtime options, loaded from the environment by the server binary.
#[derive(Debug)]
pub struct AppOpts {
	pub listen: Box<str>,
	/// Public base URL of the instance, used when rendering link fields
	pub base_url: Box<str>,
	/// Shared secret for the cron trigger endpoint; None disables the trigger
	pub cron_secret: Option<Box<str>>,
	/// Bearer token for the multi-org admin endpoints
	pub admin_token: Option<Box<str>>,
	/// Concurrency cap for newsletter preparation fan-out
	pub prepare_concurrency: usize,
}

impl Default for AppOpts {
	fn default() -> Self {
		Self {
			listen: "127.0.0.1:3000".into(),
			base_url: "http://localhost:3000".into(),
			cron_secret: None,
			admin_token: None,
			prepare_concurrency: 10,
		}
	}
}

pub struct AppState {
	pub opts: AppOpts,
	pub marketing_adapter: Arc<dyn MarketingAdapter>,
	pub email_transport: Arc<dyn EmailTransport>,
}

pub type App = Arc<AppState>;

// vim: ts=4

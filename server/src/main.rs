//! Belfry marketing email server
//!
//! Configuration comes from the environment; missing SMTP settings fail
//! startup rather than surfacing later as delivery errors.

use std::{env, path::PathBuf, sync::Arc};

use belfry_core::app::{App, AppOpts, AppState, VERSION};
use belfry_email_adapter_smtp::{EmailTransportSmtp, SmtpConfig};
use belfry_marketing_adapter_sqlite::MarketingAdapterSqlite;
use belfry_types::prelude::*;

mod routes;

struct Config {
	opts: AppOpts,
	db_dir: PathBuf,
	smtp: SmtpConfig,
}

fn env_required(name: &str) -> BfResult<String> {
	env::var(name).map_err(|_| Error::ConfigError(format!("{name} is not set")))
}

fn env_or(name: &str, default: &str) -> String {
	env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> BfResult<T> {
	match env::var(name) {
		Ok(value) => {
			value.parse().map_err(|_| Error::ConfigError(format!("{name} is not a valid value")))
		}
		Err(_) => Ok(default),
	}
}

impl Config {
	fn load() -> BfResult<Self> {
		let defaults = AppOpts::default();
		let opts = AppOpts {
			listen: env_or("LISTEN", &defaults.listen).into(),
			base_url: env_or("BASE_URL", &defaults.base_url).into(),
			cron_secret: env::var("CRON_SECRET").ok().map(Into::into),
			admin_token: env::var("ADMIN_TOKEN").ok().map(Into::into),
			prepare_concurrency: env_parsed(
				"PREPARE_CONCURRENCY",
				defaults.prepare_concurrency,
			)?,
		};

		let smtp = SmtpConfig {
			host: env_required("SMTP_HOST")?,
			port: env_parsed("SMTP_PORT", 587)?,
			username: env_required("SMTP_USERNAME")?,
			password: env_required("SMTP_PASSWORD")?,
			from_address: env_required("EMAIL_FROM_ADDRESS")?,
			from_name: env_or("EMAIL_FROM_NAME", "Belfry"),
			tls_mode: env_or("SMTP_TLS_MODE", "starttls"),
			timeout_seconds: env_parsed("SMTP_TIMEOUT_SECONDS", 30)?,
		};

		Ok(Self { opts, db_dir: PathBuf::from(env_or("DB_DIR", "./data")), smtp })
	}
}

#[tokio::main]
async fn main() -> BfResult<()> {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_target(false)
		.init();
	info!("Belfry v{}", VERSION);

	let config = Config::load()?;

	let marketing_adapter =
		Arc::new(MarketingAdapterSqlite::new(config.db_dir.join("marketing.db")).await?);
	let email_transport = Arc::new(EmailTransportSmtp::new(&config.smtp)?);

	if config.opts.cron_secret.is_none() {
		warn!("CRON_SECRET is not set; the cron trigger endpoint is disabled");
	}
	if config.opts.admin_token.is_none() {
		warn!("ADMIN_TOKEN is not set; the admin endpoints are disabled");
	}

	let listen = config.opts.listen.clone();
	let app: App = Arc::new(AppState {
		opts: config.opts,
		marketing_adapter,
		email_transport,
	});

	let router = routes::init(app);
	let listener = tokio::net::TcpListener::bind(&*listen)
		.await
		.map_err(Error::Io)?;
	info!("Listening on {}", listen);
	axum::serve(listener, router).await.map_err(Error::Io)?;

	Ok(())
}

// vim: ts=4

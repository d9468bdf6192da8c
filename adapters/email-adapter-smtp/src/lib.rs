//! SMTP email transport for Belfry, built on lettre
//!
//! The transport is configured once at startup; per-message state is limited
//! to an optional from-name override for tenant-branded newsletters.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use belfry::email_transport::{EmailTransport, OutgoingEmail};
use belfry::prelude::*;

#[derive(Debug, Clone)]
pub struct SmtpConfig {
	pub host: String,
	pub port: u16,
	pub username: String,
	pub password: String,
	pub from_address: String,
	pub from_name: String,
	/// "none", "starttls" or "tls"
	pub tls_mode: String,
	pub timeout_seconds: u64,
}

pub struct EmailTransportSmtp {
	mailer: AsyncSmtpTransport<Tokio1Executor>,
	from_address: String,
	from_name: String,
}

impl std::fmt::Debug for EmailTransportSmtp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EmailTransportSmtp")
			.field("from_address", &self.from_address)
			.field("from_name", &self.from_name)
			.finish_non_exhaustive()
	}
}

impl EmailTransportSmtp {
	pub fn new(config: &SmtpConfig) -> BfResult<Self> {
		if !config.from_address.contains('@') {
			return Err(Error::ValidationError("Invalid from email address".into()));
		}

		let tls = match config.tls_mode.as_str() {
			"tls" => Tls::Wrapper(
				TlsParameters::builder(config.host.clone())
					.build()
					.map_err(|e| Error::ConfigError(format!("TLS configuration error: {e}")))?,
			),
			"starttls" => Tls::Opportunistic(
				TlsParameters::builder(config.host.clone())
					.build()
					.map_err(|e| Error::ConfigError(format!("TLS configuration error: {e}")))?,
			),
			"none" => Tls::None,
			mode => {
				return Err(Error::ConfigError(format!(
					"Invalid TLS mode: {mode}. Must be 'none', 'starttls', or 'tls'"
				)));
			}
		};

		let credentials = Credentials::new(config.username.clone(), config.password.clone());
		let mailer = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
			.port(config.port)
			.timeout(Some(Duration::from_secs(config.timeout_seconds)))
			.tls(tls)
			.credentials(credentials)
			.build();

		Ok(Self {
			mailer,
			from_address: config.from_address.clone(),
			from_name: config.from_name.clone(),
		})
	}

	fn from_mailbox(&self, name_override: Option<&str>) -> BfResult<Mailbox> {
		let name = name_override.unwrap_or(&self.from_name);
		format!("{} <{}>", name, self.from_address)
			.parse()
			.map_err(|_| Error::ValidationError("Invalid from email format".into()))
	}
}

#[async_trait]
impl EmailTransport for EmailTransportSmtp {
	async fn send(&self, message: &OutgoingEmail) -> BfResult<()> {
		if !message.to.contains('@') {
			return Err(Error::ValidationError("Invalid recipient email address".into()));
		}

		let builder = Message::builder()
			.from(self.from_mailbox(message.from_name_override.as_deref())?)
			.to(message
				.to
				.parse()
				.map_err(|_| Error::ValidationError("Invalid recipient email format".into()))?)
			.subject(&message.subject);

		let email = if let Some(text_body) = &message.text_body {
			builder
				.multipart(
					MultiPart::alternative()
						.singlepart(SinglePart::plain(text_body.clone()))
						.singlepart(SinglePart::html(message.html_body.clone())),
				)
				.map_err(|e| Error::ValidationError(format!("Failed to build email: {e}")))?
		} else {
			builder
				.singlepart(SinglePart::html(message.html_body.clone()))
				.map_err(|e| Error::ValidationError(format!("Failed to build email: {e}")))?
		};

		match self.mailer.send(email).await {
			Ok(response) => {
				debug!("Email sent to {} (response: {:?})", message.to, response);
				Ok(())
			}
			Err(e) => {
				warn!("Failed to send email to {}: {}", message.to, e);
				Err(Error::ServiceUnavailable(format!("SMTP send failed: {e}")))
			}
		}
	}
}


// vim: ts=4

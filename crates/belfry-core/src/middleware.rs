//! Request middleware for the admin surface.

use axum::{
	extract::{Request, State},
	middleware::Next,
	response::Response,
};

use crate::app::App;
use crate::extract::AdminAuth;
use crate::prelude::*;

/// Requires a multi-org admin bearer token.
///
/// A missing server-side token is a configuration error (the admin surface
/// must never silently open up); a missing or wrong client token is an
/// authorization failure that leaks nothing about the resource.
pub async fn require_admin(
	State(app): State<App>,
	mut req: Request,
	next: Next,
) -> Result<Response, Error> {
	let Some(expected) = app.opts.admin_token.as_deref() else {
		return Err(Error::ConfigError("admin token not configured".into()));
	};

	let presented = req
		.headers()
		.get(axum::http::header::AUTHORIZATION)
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.strip_prefix("Bearer "));

	match presented {
		Some(token) if token == expected => {
			req.extensions_mut().insert(AdminAuth);
			Ok(next.run(req).await)
		}
		Some(_) => {
			debug!("Admin auth rejected: token mismatch");
			Err(Error::Unauthorized)
		}
		None => Err(Error::Unauthorized),
	}
}

// vim: ts=4

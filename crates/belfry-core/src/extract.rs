//! Custom Axum extractors for Belfry-specific types.
//!
//! Provides a `FromRequestParts` implementation for `AdminAuth` that works
//! with any state; the marker is placed in request extensions by the
//! `require_admin` middleware.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use belfry_types::error::Error;

/// Marker for an authenticated multi-org admin session.
#[derive(Clone, Copy, Debug)]
pub struct AdminAuth;

impl<S> FromRequestParts<S> for AdminAuth
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		if parts.extensions.get::<AdminAuth>().is_some() {
			Ok(AdminAuth)
		} else {
			Err(Error::PermissionDenied)
		}
	}
}

// vim: ts=4

//! Error type shared across the Belfry crates.
//!
//! Top-level HTTP handlers convert every internal failure into a structured
//! JSON error response; pipeline stages catch per-item failures locally and
//! continue, so most of these variants only surface at the endpoint boundary.

use axum::{http::StatusCode, response::IntoResponse, Json};

pub type BfResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	/// Referenced record does not exist (404)
	NotFound,
	/// Missing or invalid credentials (401)
	Unauthorized,
	/// Authenticated but not allowed (403)
	PermissionDenied,
	/// Malformed input (400)
	ValidationError(String),
	/// Server-side misconfiguration (500), fail fast
	ConfigError(String),
	/// Upstream transport unavailable (503)
	ServiceUnavailable(String),
	/// Storage layer failure (500)
	DbError,
	/// Anything else (500)
	Internal(String),

	// externals
	Io(std::io::Error),
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Self::ValidationError(format!("JSON error: {}", err))
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Error::NotFound => write!(f, "not found"),
			Error::Unauthorized => write!(f, "unauthorized"),
			Error::PermissionDenied => write!(f, "permission denied"),
			Error::ValidationError(msg) => write!(f, "validation error: {}", msg),
			Error::ConfigError(msg) => write!(f, "configuration error: {}", msg),
			Error::ServiceUnavailable(msg) => write!(f, "service unavailable: {}", msg),
			Error::DbError => write!(f, "database error"),
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::Io(err) => write!(f, "I/O error: {}", err),
		}
	}
}

impl std::error::Error for Error {}

impl IntoResponse for Error {
	fn into_response(self) -> axum::response::Response {
		let (status, message) = match &self {
			Error::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
			Error::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
			Error::PermissionDenied => (StatusCode::FORBIDDEN, "permission denied".to_string()),
			Error::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
			Error::ConfigError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
			Error::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
			// Storage / internal details are not leaked to clients
			_ => (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string()),
		};
		(status, Json(serde_json::json!({ "success": false, "error": message }))).into_response()
	}
}


// vim: ts=4

//! Core infrastructure for the Belfry platform.
//!
//! This crate contains shared infrastructure used by the feature crates and
//! the server binary: the application state type, runtime options, and the
//! admin authentication middleware/extractor.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod app;
pub mod extract;
pub mod middleware;
pub mod prelude;

pub use app::{App, AppOpts, AppState};
pub use extract::AdminAuth;

// vim: ts=4

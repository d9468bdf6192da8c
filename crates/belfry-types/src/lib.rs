//! Shared types, adapter traits, and error types for the Belfry platform.
//!
//! This crate contains the foundational types shared between the server
//! crate, the feature crates, and all adapter implementations. Extracting
//! these into a separate crate allows adapter crates to compile in parallel
//! with the feature modules.

pub mod email_transport;
pub mod error;
pub mod marketing_adapter;
pub mod prelude;
pub mod types;

// vim: ts=4

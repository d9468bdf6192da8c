//! Marketing email engine for the Belfry platform.
//!
//! This crate implements the full marketing pipeline:
//! - Template resolution with `{{field}}`, `{{block:key}}`, and `{{link:key}}`
//!   tokens, including a preview mode for the multi-org admin console
//! - Sequence evaluation: which organisations are due for the next step of an
//!   active onboarding/marketing sequence
//! - Send queue processing: claim, render, dispatch, and record due entries
//! - Newsletter batch sending with bounded-concurrency preparation
//!
//! Storage and delivery stay behind the `MarketingAdapter` and
//! `EmailTransport` traits; a scheduled external trigger drives the sequence
//! and queue pipelines through the cron endpoint in `handler`.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod handler;
pub mod newsletter;
pub mod queue;
pub mod sequence;
pub mod template;

mod prelude;

#[cfg(test)]
pub(crate) mod testing;

pub use newsletter::{send_batch, RecipientResult, RecipientStatus};
pub use queue::{process_send_queue, SendStats};
pub use sequence::{evaluate, EvaluationStats};
pub use template::{BodyKind, ResolveMode, Resolver};

// vim: ts=4

//! HTTP handlers for the marketing pipeline endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use belfry_core::extract::AdminAuth;
use belfry_types::marketing_adapter::QueueStats;

use crate::newsletter::{self, RecipientResult, RecipientStatus};
use crate::prelude::*;
use crate::queue::{self, SendStats};
use crate::sequence::{self, EvaluationStats};
use crate::template::{BodyKind, ResolveMode, Resolver};

#[derive(Deserialize)]
pub struct CronQuery {
	secret: Option<String>,
}

#[derive(Deserialize)]
pub struct CronBody {
	secret: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CronResponse {
	success: bool,
	evaluation: EvaluationStats,
	sending: SendStats,
	timestamp: Timestamp,
}

/// Cron-triggered pipeline run: evaluate sequences, then drain the due queue.
///
/// Accepts the shared secret in the `secret` query parameter or the JSON
/// body; an unconfigured secret disables the endpoint entirely.
pub async fn run_marketing_cron(
	State(app): State<App>,
	Query(query): Query<CronQuery>,
	body: Option<Json<CronBody>>,
) -> BfResult<Json<CronResponse>> {
	let presented = query.secret.or_else(|| body.and_then(|Json(b)| b.secret));
	check_cron_secret(app.opts.cron_secret.as_deref(), presented.as_deref())?;

	info!("Marketing cron triggered");
	let evaluation = sequence::evaluate(&app).await?;
	let sending = queue::process_send_queue(&app).await?;

	Ok(Json(CronResponse { success: true, evaluation, sending, timestamp: Timestamp::now() }))
}

fn check_cron_secret(configured: Option<&str>, presented: Option<&str>) -> BfResult<()> {
	let Some(configured) = configured else {
		return Err(Error::ConfigError("cron secret is not configured".into()));
	};
	if presented != Some(configured) {
		return Err(Error::Unauthorized);
	}
	Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewReq {
	html: String,
	organisation_id: Option<OrgId>,
}

#[derive(Serialize)]
pub struct PreviewRes {
	html: String,
}

/// Render template markup in preview mode: blocks and links are expanded,
/// personalization tokens stay literal.
pub async fn post_preview(
	State(app): State<App>,
	_auth: AdminAuth,
	Json(req): Json<PreviewReq>,
) -> BfResult<Json<PreviewRes>> {
	let resolver = Resolver::new(&*app.marketing_adapter, req.organisation_id);
	let fields = serde_json::json!({});
	let html = resolver.resolve(&req.html, BodyKind::Html, &fields, ResolveMode::Preview).await?;
	Ok(Json(PreviewRes { html }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeReq {
	user_id: i64,
}

#[derive(Serialize)]
pub struct UnsubscribeRes {
	success: bool,
}

/// Public opt-out endpoint, linked from email footers.
pub async fn post_unsubscribe(
	State(app): State<App>,
	Json(req): Json<UnsubscribeReq>,
) -> BfResult<Json<UnsubscribeRes>> {
	let pref = app.marketing_adapter.set_opted_out(req.user_id, true).await?;
	info!("User {} opted out of non-essential email", pref.user_id);
	Ok(Json(UnsubscribeRes { success: true }))
}

pub async fn get_queue_stats(
	State(app): State<App>,
	_auth: AdminAuth,
) -> BfResult<Json<QueueStats>> {
	Ok(Json(app.marketing_adapter.read_queue_stats().await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNewsletterReq {
	organisation_id: OrgId,
	list_id: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNewsletterRes {
	sent: u32,
	errors: u32,
	results: Vec<RecipientResult>,
}

pub async fn post_send_newsletter(
	State(app): State<App>,
	_auth: AdminAuth,
	Path(newsletter_id): Path<i64>,
	Json(req): Json<SendNewsletterReq>,
) -> BfResult<Json<SendNewsletterRes>> {
	let results =
		newsletter::send_batch(&app, req.organisation_id, newsletter_id, req.list_id).await?;
	let sent = results.iter().filter(|r| r.status == RecipientStatus::Sent).count() as u32;
	let errors = results.len() as u32 - sent;
	Ok(Json(SendNewsletterRes { sent, errors, results }))
}


// vim: ts=4

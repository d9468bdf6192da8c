use axum::{middleware, routing::{get, post}, Router};

use belfry_core::app::App;
use belfry_core::middleware::require_admin;
use belfry_marketing::handler;

pub fn init(state: App) -> Router {
	let admin_router = Router::new()
		.route("/api/marketing/preview", post(handler::post_preview))
		.route("/api/marketing/queue/stats", get(handler::get_queue_stats))
		.route(
			"/api/marketing/newsletters/{newsletter_id}/send",
			post(handler::post_send_newsletter),
		)
		.layer(middleware::from_fn_with_state(state.clone(), require_admin));

	let public_router = Router::new()
		.route(
			"/api/cron/marketing-emails",
			get(handler::run_marketing_cron).post(handler::run_marketing_cron),
		)
		.route("/api/marketing/unsubscribe", post(handler::post_unsubscribe));

	Router::new().merge(public_router).merge(admin_router).with_state(state)
}

// vim: ts=4

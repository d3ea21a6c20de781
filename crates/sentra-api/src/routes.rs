//! API routes

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::{auth_middleware, AppState};
use crate::handlers::{ai, auth, campaigns, health, provider_events, segments, tracking};

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    // Health routes (no auth required)
    let health_routes = Router::new()
        .route("/", get(health::health))
        .route("/ready", get(health::readiness))
        .with_state(state.clone());

    // Segment routes
    let segment_routes = Router::new()
        .route("/", get(segments::list_segments))
        .route("/", post(segments::create_segment))
        .route("/refresh-counts", post(segments::refresh_counts))
        .route("/:id", get(segments::get_segment))
        .route("/:id", put(segments::update_segment))
        .route("/:id", delete(segments::delete_segment))
        .route("/:id/emails", post(segments::add_segment_emails))
        .route("/:id/emails", delete(segments::remove_segment_emails));

    // Campaign routes
    let campaign_routes = Router::new()
        .route("/", get(campaigns::list_campaigns))
        .route("/", post(campaigns::create_campaign))
        .route("/stats", get(campaigns::campaign_stats))
        .route("/:id", get(campaigns::get_campaign))
        .route("/:id", put(campaigns::update_campaign))
        .route("/:id", delete(campaigns::delete_campaign))
        .route("/:id/send", post(campaigns::send_campaign))
        .route("/:id/events", get(campaigns::campaign_events));

    // Content assist routes
    let ai_routes = Router::new()
        .route("/generate-email", post(ai::generate_email))
        .route("/subject-lines", post(ai::subject_lines))
        .route("/insights", post(ai::campaign_insights));

    // The API surface. Routes added before the auth layer require a key;
    // register and login are added after it and stay public.
    let api_v1 = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/regenerate-key", post(auth::regenerate_key))
        .nest("/segments", segment_routes)
        .nest("/campaigns", campaign_routes)
        .nest("/ai", ai_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    // Public tracking surface; authenticated by construction (unguessable
    // ids and signed tokens), never by API key
    let tracking_routes = Router::new()
        .route("/track/open/:tracking_id", get(tracking::track_open))
        .route("/track/click/:token", get(tracking::track_click))
        .route("/unsubscribe/:token", get(tracking::unsubscribe))
        .route("/hooks/email-events", post(provider_events::email_events))
        .with_state(state);

    Router::new()
        .nest("/health", health_routes)
        .nest("/api/v1", api_v1)
        .merge(tracking_routes)
        .layer(TraceLayer::new_for_http())
}

//! HTTP surface: JSON API, health check and Prometheus endpoint.

pub mod extract;
pub mod handlers;
mod middleware;

use crate::config::Config;
use crate::services::Services;
use axum::extract::State;
use axum::http::HeaderName;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use handlers::{admin, catalog, forms, responses, session, social, templates};
use serde_json::{Value, json};
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    pub user_header: HeaderName,
    pub server_name: Arc<str>,
}

impl AppState {
    pub fn new(services: Services, config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            services: Arc::new(services),
            user_header: HeaderName::from_bytes(
                config.auth.user_header.to_ascii_lowercase().as_bytes(),
            )?,
            server_name: Arc::from(config.server.name.as_str()),
        })
    }
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "name": &*state.server_name }))
}

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

/// Build the application router.
pub fn router(state: AppState, metrics: bool) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/api/session/sync", post(session::sync))
        .route("/api/me", get(session::me))
        .route("/api/templates", post(templates::create))
        .route("/api/templates/latest", get(templates::latest))
        .route("/api/templates/popular", get(templates::popular))
        .route("/api/templates/mine", get(templates::mine))
        .route(
            "/api/templates/:id",
            get(templates::get).put(templates::update).delete(templates::delete),
        )
        .route("/api/templates/:id/cleanup", post(templates::cleanup))
        .route("/api/templates/:id/results", get(templates::results))
        .route("/api/templates/:id/form", get(templates::form))
        .route(
            "/api/templates/:id/comments",
            get(social::list_comments).post(social::add_comment),
        )
        .route(
            "/api/templates/:id/likes",
            get(social::like_state).post(social::toggle_like),
        )
        .route(
            "/api/templates/:id/responses",
            get(responses::list_for_template).post(responses::submit),
        )
        .route("/api/comments/:id", delete(social::delete_comment))
        .route("/api/responses/mine", get(responses::mine))
        .route("/api/responses/:id", get(responses::get))
        .route("/api/forms", post(forms::create))
        .route("/api/forms/mine", get(forms::mine))
        .route("/api/forms/:id", get(forms::get).delete(forms::delete))
        .route("/api/search", get(catalog::search))
        .route("/api/tags", get(catalog::tags))
        .route("/api/tags/:name/templates", get(catalog::by_tag))
        .route("/api/topics", get(catalog::topics))
        .route("/api/admin/stats", get(admin::stats))
        .route("/api/admin/diagnostics", get(admin::diagnostics))
        .route("/api/admin/topics", post(admin::create_topic))
        .route("/api/admin/topics/:id", delete(admin::delete_topic))
        .route("/api/admin/templates", get(admin::templates))
        .route("/api/admin/templates/:id", delete(admin::delete_template))
        .route("/api/admin/templates/:id/restore", post(admin::restore_template))
        .route("/api/admin/responses", get(admin::responses))
        .route("/api/admin/responses/:id", delete(admin::delete_response))
        .route("/api/admin/users", get(admin::users))
        .route("/api/admin/users/sync", post(admin::sync_users))
        .route("/api/admin/users/:id/admin", put(admin::set_admin))
        .route("/api/admin/users/:id/block", put(admin::set_blocked))
        .route("/api/admin/users/:id", delete(admin::delete_user));

    if metrics {
        app = app.route("/metrics", get(metrics_handler));
    }

    app.route_layer(axum::middleware::from_fn(middleware::track))
        .with_state(state)
}

use crate::state;

use axum::Router;
use axum::middleware;
use axum::routing::{delete, get, post};

mod alerts;
mod auth;
mod debug;
mod stream;

pub fn app(state: state::AppState) -> Router {
    Router::new()
        .route("/notifications/subscribe", get(stream::subscribe))
        .route("/api/notifications", get(alerts::list_alerts))
        .route("/api/notifications/unread-count", get(alerts::unread_count))
        .route("/api/notifications/read-all", post(alerts::mark_all_read))
        .route("/api/notifications/{id}/read", post(alerts::mark_read))
        .route("/api/notifications/{id}", delete(alerts::delete_alert))
        .route("/api/debug/alerts/run", post(debug::run_alerts))
        .route("/api/debug/alerts/sweep", post(debug::sweep_alerts))
        .route("/api/debug/connections", get(debug::connections))
        .route("/api/debug/jobs", get(debug::jobs))
        .route("/health", get(health))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}

pub(crate) async fn health() -> &'static str {
    "ok"
}

use crate::error::AppError;
use crate::state;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

/// Rejects `/api/` requests without a valid identity and hands the caller's
/// `UserId` to handlers as a request extension.
pub(crate) async fn auth_middleware(
    State(state): State<state::AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if !req.uri().path().starts_with("/api/") {
        return next.run(req).await;
    }

    match state.auth.identify(req.headers()) {
        Some(user_id) => {
            req.extensions_mut().insert(user_id);
            next.run(req).await
        }
        None => {
            debug!(path = %req.uri().path(), "rejecting request without identity");
            AppError::Unauthorized.into_response()
        }
    }
}

use crate::error::AppError;
use crate::state;
use crate::types::alert::{AlertId, AlertList, UserId};

use axum::Extension;
use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

#[derive(Serialize)]
pub(crate) struct UnreadCountResponse {
    pub(crate) count: u64,
}

#[derive(Serialize)]
pub(crate) struct UpdatedResponse {
    pub(crate) updated: u64,
}

pub(crate) async fn list_alerts(
    State(state): State<state::AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<AlertList>, AppError> {
    Ok(Json(state.alerts.list(user_id).await?))
}

pub(crate) async fn unread_count(
    State(state): State<state::AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let count = state.alerts.unread_count(user_id).await?;
    Ok(Json(UnreadCountResponse { count }))
}

pub(crate) async fn mark_read(
    State(state): State<state::AppState>,
    Extension(user_id): Extension<UserId>,
    Path(alert_id): Path<AlertId>,
) -> Result<StatusCode, AppError> {
    if !state.alerts.mark_read(user_id, alert_id).await? {
        return Err(AppError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn mark_all_read(
    State(state): State<state::AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<UpdatedResponse>, AppError> {
    let updated = state.alerts.mark_all_read(user_id).await?;
    Ok(Json(UpdatedResponse { updated }))
}

pub(crate) async fn delete_alert(
    State(state): State<state::AppState>,
    Extension(user_id): Extension<UserId>,
    Path(alert_id): Path<AlertId>,
) -> Result<StatusCode, AppError> {
    if !state.alerts.delete(user_id, alert_id).await? {
        return Err(AppError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

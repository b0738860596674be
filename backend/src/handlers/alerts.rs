//! HTTP handlers for proactive alerts

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::{Alert, AlertKind};

use crate::error::{AppError, AppResult};
use crate::AppState;

/// Alerts currently showing
pub async fn list_alerts(State(state): State<AppState>) -> Json<Vec<Alert>> {
    Json(state.controller.visible_alerts().await)
}

/// Hide an alert until the next evaluation
pub async fn dismiss_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
) -> AppResult<StatusCode> {
    let kind = AlertKind::from_id(&alert_id)
        .ok_or_else(|| AppError::NotFound(format!("Unknown alert: {}", alert_id)))?;

    state.controller.dismiss_alert(kind).await?;
    Ok(StatusCode::NO_CONTENT)
}

//! HTTP handlers for summary and history export

use axum::{extract::State, http::header, response::IntoResponse, Json};

use crate::error::AppResult;
use crate::services::export::ExportReceipt;
use crate::AppState;

/// Write the daily farm summary document
pub async fn export_summary(State(state): State<AppState>) -> AppResult<Json<ExportReceipt>> {
    let receipt = state.exporter.export_summary().await?;
    Ok(Json(receipt))
}

/// Download the history window as CSV
pub async fn export_history_csv(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let csv = state.exporter.history_csv().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"farm_history.csv\"",
            ),
        ],
        csv,
    ))
}

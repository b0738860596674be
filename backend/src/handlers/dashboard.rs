//! HTTP handlers for the dashboard view

use axum::{extract::State, Json};
use shared::SensorReading;

use crate::services::dashboard::{DashboardView, RecommendationsView};
use crate::AppState;

/// Full dashboard view
pub async fn get_dashboard(State(state): State<AppState>) -> Json<DashboardView> {
    Json(state.controller.view().await)
}

/// History window, oldest first
pub async fn get_history(State(state): State<AppState>) -> Json<Vec<SensorReading>> {
    Json(state.controller.history().await)
}

/// Current recommendation batch with its loading flag and error
pub async fn get_recommendations(State(state): State<AppState>) -> Json<RecommendationsView> {
    Json(state.controller.recommendations().await)
}

//! Route definitions for the AgriSuggest dashboard API

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/dashboard", dashboard_routes())
        .nest("/alerts", alert_routes())
        .nest("/chat", chat_routes())
        .nest("/export", export_routes())
}

/// Dashboard view routes (read-only)
fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_dashboard))
        .route("/history", get(handlers::get_history))
        .route("/recommendations", get(handlers::get_recommendations))
}

fn alert_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_alerts))
        .route("/:id/dismiss", post(handlers::dismiss_alert))
}

fn chat_routes() -> Router<AppState> {
    Router::new().route("/", get(handlers::get_chat).post(handlers::send_message))
}

fn export_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::export_summary))
        .route("/history.csv", get(handlers::export_history_csv))
}

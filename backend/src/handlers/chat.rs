//! HTTP handlers for the Agri-AI chat assistant

use axum::{extract::State, Json};
use serde::Deserialize;
use shared::ChatMessage;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::chat::{ChatContext, ChatView};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageInput {
    #[validate(length(min = 1, max = 2000, message = "Message must be 1-2000 characters"))]
    pub message: String,
}

/// Transcript plus any reply still streaming
pub async fn get_chat(State(state): State<AppState>) -> Json<ChatView> {
    Json(state.chat.view().await)
}

/// Ask the assistant a question about the current farm data
pub async fn send_message(
    State(state): State<AppState>,
    Json(input): Json<SendMessageInput>,
) -> AppResult<Json<ChatMessage>> {
    input.validate()?;

    let snapshot = state.controller.snapshot().await;
    let context = ChatContext {
        current_farm_data: snapshot.latest,
        seven_day_weather_forecast: snapshot.weather,
        current_crop_recommendations: snapshot.recommendations,
    };

    // Run detached so a dropped request cannot leave the reply pending
    let chat = state.chat.clone();
    let reply = tokio::spawn(async move { chat.send_message(&input.message, &context).await })
        .await
        .map_err(|e| AppError::Internal(format!("Chat task failed: {}", e)))??;

    Ok(Json(reply))
}

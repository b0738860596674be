//! Agri-AI chat service
//!
//! One process-wide session: a committed transcript, an optional pending
//! reply that grows as chunks stream in, and the turns already sent to the
//! model.

use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use shared::{
    ChatMessage, ChatTranscript, CropRecommendation, PendingMessage, SensorReading,
    WeatherSnapshot, CHAT_APOLOGY,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::ChatModel;

/// Longest accepted user message, in characters
pub const MAX_MESSAGE_CHARS: usize = 2000;

pub const SYSTEM_PROMPT: &str = "You are 'Agri-AI', a helpful and friendly agricultural assistant for a farmer in Punjab, India. Your goal is to answer questions based on the real-time sensor data, weather forecast and crop recommendations provided in the context of each message.

**Multilingual Support:** You are fluent in English, Hindi, and Telugu. You MUST respond in the same language the user uses. For example, if the user asks a question in Telugu, you must provide the answer in Telugu.

**Core Instructions:**
- Be concise and clear.
- Use simple, easy-to-understand language.
- If a question is outside the scope of farming or the provided data, politely state that you can't answer it.
- Do not make up data. If the data isn't in the context, say so.
- You can provide general agricultural knowledge relevant to the Punjab region.";

/// Dashboard data attached to every question
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatContext {
    pub current_farm_data: Option<SensorReading>,
    pub seven_day_weather_forecast: Option<WeatherSnapshot>,
    pub current_crop_recommendations: Vec<CropRecommendation>,
}

impl ChatContext {
    /// `CONTEXT: {json}\n\nUSER QUESTION: {message}`
    pub fn prompt(&self, message: &str) -> AppResult<String> {
        let context = serde_json::to_string(self)
            .map_err(|e| AppError::Internal(format!("Failed to serialize chat context: {}", e)))?;
        Ok(format!("CONTEXT: {}\n\nUSER QUESTION: {}", context, message))
    }
}

/// Transcript plus the reply currently streaming in
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    pub session_id: Uuid,
    pub messages: ChatTranscript,
    pub pending: Option<String>,
}

#[derive(Debug)]
struct SessionState {
    transcript: ChatTranscript,
    pending: Option<PendingMessage>,
    /// Turns as the model saw them, context included
    model_history: Vec<ChatMessage>,
}

/// Chat session shared by all requests
#[derive(Clone)]
pub struct ChatService {
    model: Arc<dyn ChatModel>,
    session_id: Uuid,
    state: Arc<Mutex<SessionState>>,
}

impl ChatService {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            session_id: Uuid::new_v4(),
            state: Arc::new(Mutex::new(SessionState {
                transcript: ChatTranscript::with_greeting(),
                pending: None,
                model_history: Vec::new(),
            })),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub async fn view(&self) -> ChatView {
        let state = self.state.lock().await;
        ChatView {
            session_id: self.session_id,
            messages: state.transcript.clone(),
            pending: state.pending.as_ref().map(|p| p.text().to_string()),
        }
    }

    /// Send a question and stream the reply into the transcript.
    ///
    /// Returns the committed assistant message. A failed stream commits
    /// [`CHAT_APOLOGY`] instead of an error.
    pub async fn send_message(&self, message: &str, context: &ChatContext) -> AppResult<ChatMessage> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AppError::ValidationError("Message must not be empty".into()));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(AppError::ValidationError(format!(
                "Message must be at most {} characters",
                MAX_MESSAGE_CHARS
            )));
        }

        let prompt = context.prompt(message)?;

        let history = {
            let mut state = self.state.lock().await;
            if state.pending.is_some() {
                return Err(AppError::Conflict(
                    "The assistant is still answering the previous message".into(),
                ));
            }
            state.transcript.push(ChatMessage::user(message));
            state.pending = Some(PendingMessage::new());
            state.model_history.clone()
        };

        debug!("Chat session {}: streaming reply", self.session_id);
        let outcome = self.stream_into_pending(&history, &prompt).await;

        let mut state = self.state.lock().await;
        let pending = state.pending.take().unwrap_or_default();
        let reply = match outcome {
            Ok(()) => {
                info!(
                    "Chat reply committed ({} chunks, {} chars)",
                    pending.chunks(),
                    pending.text().chars().count()
                );
                let reply = pending.commit();
                state.model_history.push(ChatMessage::user(prompt));
                state.model_history.push(reply.clone());
                reply
            }
            Err(e) => {
                warn!("AI agent failed to respond: {}", e);
                ChatMessage::assistant(CHAT_APOLOGY)
            }
        };
        state.transcript.push(reply.clone());
        Ok(reply)
    }

    async fn stream_into_pending(&self, history: &[ChatMessage], prompt: &str) -> AppResult<()> {
        let mut chunks = self.model.stream_reply(SYSTEM_PROMPT, history, prompt).await?;

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            let mut state = self.state.lock().await;
            if let Some(pending) = state.pending.as_mut() {
                pending.append(&chunk);
            }
        }
        Ok(())
    }
}

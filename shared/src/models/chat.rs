//! Assistant chat transcript models

use serde::{Deserialize, Serialize};

/// First message shown when a session starts
pub const CHAT_GREETING: &str =
    "Hi! I'm your Agri-AI assistant. Ask me anything about your farm data or crop recommendations!";

/// Committed in place of a reply when the model stream fails
pub const CHAT_APOLOGY: &str =
    "Sorry, I'm having trouble connecting to my brain right now. Please try again in a moment.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
        }
    }
}

/// Committed conversation entries, append-only
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(transparent)]
pub struct ChatTranscript {
    messages: Vec<ChatMessage>,
}

impl ChatTranscript {
    /// A transcript opened with the assistant greeting
    pub fn with_greeting() -> Self {
        Self {
            messages: vec![ChatMessage::assistant(CHAT_GREETING)],
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for ChatTranscript {
    fn default() -> Self {
        Self::with_greeting()
    }
}

/// Assistant text still arriving from a stream.
///
/// Kept apart from the transcript so readers can tell partial from final output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingMessage {
    text: String,
    chunks: usize,
}

impl PendingMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, chunk: &str) {
        self.text.push_str(chunk);
        self.chunks += 1;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Finish the stream and turn the accumulated text into an assistant message
    pub fn commit(self) -> ChatMessage {
        ChatMessage::assistant(self.text)
    }
}

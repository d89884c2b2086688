use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

/// Current wall-clock time in unix milliseconds, the unit every
/// persisted timestamp column uses.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// A conversation thread. The title stays `None` until the first user
/// message arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub chat_id: i64,
    pub role: String,
    pub content: Option<String>,
    /// Marks an in-flight streamed response that has not finished yet.
    pub generating: bool,
    pub time: i64,
}

impl ChatMessage {
    pub fn new_user(chat_id: i64, content: &str) -> Self {
        Self {
            id: 0,
            chat_id,
            role: ROLE_USER.to_string(),
            content: Some(content.to_string()),
            generating: false,
            time: now_millis(),
        }
    }

    pub fn new_assistant(chat_id: i64, content: &str) -> Self {
        Self {
            id: 0,
            chat_id,
            role: ROLE_ASSISTANT.to_string(),
            content: Some(content.to_string()),
            generating: false,
            time: now_millis(),
        }
    }

    pub fn from_user(&self) -> bool {
        self.role == ROLE_USER
    }

    pub fn from_assistant(&self) -> bool {
        self.role == ROLE_ASSISTANT
    }
}

/// A chat together with its messages in ascending time order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatWithMessages {
    pub chat: Chat,
    pub messages: Vec<ChatMessage>,
}

/// Free-text summary of a past conversation, optionally tied to the chat
/// it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: i64,
    pub content: String,
    pub chat_id: Option<i64>,
    pub created_time: i64,
    pub updated_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub id: i64,
    pub prompt: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedAudio {
    pub id: i64,
    pub input: String,
    pub file_path: String,
    pub file_mime_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_helpers() {
        let message = ChatMessage {
            id: 1,
            chat_id: 1,
            role: ROLE_USER.to_string(),
            content: Some("hi".to_string()),
            generating: false,
            time: 0,
        };
        assert!(message.from_user());
        assert!(!message.from_assistant());
    }
}

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::domains::chat::ChatMessage;
use crate::domains::chat::Memory;
use crate::error::Result;

/// One streamed fragment of an assistant reply. `index` is the response
/// choice it belongs to; `content` is the delta text, not the
/// accumulated message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatDelta {
    pub index: u32,
    pub content: String,
}

/// Everything a completion call needs: the conversation so far plus the
/// memory context to fold into the system message.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub memories: Vec<Memory>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            memories: Vec::new(),
        }
    }

    pub fn with_memories(mut self, memories: Vec<Memory>) -> Self {
        self.memories = memories;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SpeechAudio {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Streams an assistant reply for the conversation.
    fn chat_stream(&self, request: ChatRequest) -> BoxStream<'static, Result<ChatDelta>>;

    /// One-shot, non-streamed completion.
    async fn generate_text(&self, prompt: &str, system_prompt: &str) -> Result<String>;

    async fn synthesize_speech(
        &self,
        input: &str,
        voice: &str,
        response_format: &str,
    ) -> Result<SpeechAudio>;

    /// Returns the URL of a generated image.
    async fn generate_image(&self, prompt: &str) -> Result<String>;
}

#![allow(dead_code)]

use std::sync::Mutex;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::stream::BoxStream;

use blitz_chat::error::{BlitzChatError, Result};
use blitz_chat::interfaces::providers::{ChatDelta, ChatRequest, LlmProvider, SpeechAudio};

/// Provider that replays a scripted list of deltas, optionally failing
/// partway through, and records the last request it saw.
pub struct ScriptedLlmProvider {
    deltas: Vec<ChatDelta>,
    fail_after: Option<usize>,
    pub last_request: Mutex<Option<ChatRequest>>,
}

impl ScriptedLlmProvider {
    pub fn new(deltas: Vec<(u32, &str)>) -> Self {
        Self {
            deltas: deltas
                .into_iter()
                .map(|(index, content)| ChatDelta {
                    index,
                    content: content.to_string(),
                })
                .collect(),
            fail_after: None,
            last_request: Mutex::new(None),
        }
    }

    /// Fails with an http error after yielding `count` deltas.
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlmProvider {
    fn chat_stream(&self, request: ChatRequest) -> BoxStream<'static, Result<ChatDelta>> {
        if let Ok(mut guard) = self.last_request.lock() {
            *guard = Some(request);
        }
        let deltas = self.deltas.clone();
        let fail_after = self.fail_after;
        Box::pin(try_stream! {
            let total = deltas.len();
            for (emitted, delta) in deltas.into_iter().enumerate() {
                if fail_after == Some(emitted) {
                    Err::<(), BlitzChatError>(BlitzChatError::Http("stream broke".to_string()))?;
                }
                yield delta;
            }
            if fail_after.is_some_and(|count| count >= total) {
                Err::<(), BlitzChatError>(BlitzChatError::Http("stream broke".to_string()))?;
            }
        })
    }

    async fn generate_text(&self, _prompt: &str, _system_prompt: &str) -> Result<String> {
        Ok("mock text".to_string())
    }

    async fn synthesize_speech(
        &self,
        _input: &str,
        _voice: &str,
        _response_format: &str,
    ) -> Result<SpeechAudio> {
        Ok(SpeechAudio {
            bytes: b"audio".to_vec(),
            mime_type: "audio/mpeg".to_string(),
        })
    }

    async fn generate_image(&self, _prompt: &str) -> Result<String> {
        Ok("https://example.com/generated.png".to_string())
    }
}

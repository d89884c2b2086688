use async_stream::try_stream;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::json;

use async_openai::{
    config::OpenAIConfig,
    types::{
        audio::{CreateSpeechRequestArgs, SpeechModel, SpeechResponseFormat, Voice},
        chat::{
            ChatCompletionRequestAssistantMessageArgs,
            ChatCompletionRequestAssistantMessageContent, ChatCompletionRequestMessage,
            ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
            ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs,
        },
    },
    Client,
};

use crate::config::Settings;
use crate::domains::chat::{ChatMessage, Memory};
use crate::error::{BlitzChatError, Result};
use crate::interfaces::providers::{ChatDelta, ChatRequest, LlmProvider, SpeechAudio};

/// Client for any OpenAI-compatible chat-completions endpoint, built
/// from the user settings.
#[derive(Clone)]
pub struct OpenAiProvider {
    model: String,
    temperature: f32,
    endpoint: String,
    api_key: String,
    instructions: Option<String>,
    client: Client<OpenAIConfig>,
    http: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(
        api_key: String,
        model: String,
        endpoint: String,
        temperature: f32,
        instructions: Option<String>,
    ) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key.clone())
            .with_api_base(endpoint.clone());
        Self {
            model,
            temperature,
            endpoint,
            api_key,
            instructions,
            client: Client::with_config(config),
            http: reqwest::Client::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.api_key().unwrap_or_default().to_string(),
            settings.model().to_string(),
            settings.endpoint().to_string(),
            settings.temperature(),
            settings.instructions().map(str::to_string),
        )
    }

    fn build_system_message(
        &self,
        memories: &[Memory],
    ) -> Result<Option<ChatCompletionRequestMessage>> {
        let prompt = build_system_prompt(self.instructions.as_deref(), memories);
        if prompt.is_empty() {
            return Ok(None);
        }
        let message = ChatCompletionRequestSystemMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| BlitzChatError::Runtime(e.to_string()))?;
        Ok(Some(ChatCompletionRequestMessage::System(message)))
    }

    fn build_history_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
        let content = message.content.clone().unwrap_or_default();
        if message.from_assistant() {
            let built = ChatCompletionRequestAssistantMessageArgs::default()
                .content(ChatCompletionRequestAssistantMessageContent::Text(content))
                .build()
                .map_err(|e| BlitzChatError::Runtime(e.to_string()))?;
            Ok(ChatCompletionRequestMessage::Assistant(built))
        } else {
            let built = ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Text(content))
                .build()
                .map_err(|e| BlitzChatError::Runtime(e.to_string()))?;
            Ok(ChatCompletionRequestMessage::User(built))
        }
    }

    fn build_request_messages(
        &self,
        request: &ChatRequest,
    ) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = self.build_system_message(&request.memories)? {
            messages.push(system);
        }
        for message in &request.messages {
            messages.push(Self::build_history_message(message)?);
        }
        Ok(messages)
    }

    fn voice_from_str(voice: &str) -> Voice {
        match voice.to_lowercase().as_str() {
            "alloy" => Voice::Alloy,
            "ash" => Voice::Ash,
            "ballad" => Voice::Ballad,
            "coral" => Voice::Coral,
            "echo" => Voice::Echo,
            "fable" => Voice::Fable,
            "onyx" => Voice::Onyx,
            "nova" => Voice::Nova,
            "sage" => Voice::Sage,
            "shimmer" => Voice::Shimmer,
            "verse" => Voice::Verse,
            other => Voice::Other(other.to_string()),
        }
    }

    fn speech_format_from_str(format: &str) -> SpeechResponseFormat {
        match format.to_lowercase().as_str() {
            "opus" => SpeechResponseFormat::Opus,
            "aac" => SpeechResponseFormat::Aac,
            "flac" => SpeechResponseFormat::Flac,
            "wav" => SpeechResponseFormat::Wav,
            "pcm" | "pcm16" => SpeechResponseFormat::Pcm,
            _ => SpeechResponseFormat::Mp3,
        }
    }

    fn mime_type_for_format(format: &str) -> &'static str {
        match format.to_lowercase().as_str() {
            "opus" => "audio/ogg",
            "aac" => "audio/aac",
            "flac" => "audio/flac",
            "wav" => "audio/wav",
            "pcm" | "pcm16" => "audio/pcm",
            _ => "audio/mpeg",
        }
    }
}

fn build_system_prompt(instructions: Option<&str>, memories: &[Memory]) -> String {
    let mut prompt = instructions.unwrap_or_default().to_string();
    if !memories.is_empty() {
        if !prompt.is_empty() {
            prompt.push_str("\n\n");
        }
        prompt.push_str(
            "RELEVANT MEMORY (unverified; use only if clearly applicable to the user's request):\n",
        );
        for memory in memories {
            prompt.push_str("- ");
            prompt.push_str(&memory.content);
            prompt.push('\n');
        }
    }
    prompt
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn chat_stream(&self, request: ChatRequest) -> BoxStream<'static, Result<ChatDelta>> {
        let provider = self.clone();
        Box::pin(try_stream! {
            let messages = provider.build_request_messages(&request)?;
            let completion_request = CreateChatCompletionRequestArgs::default()
                .model(provider.model.clone())
                .temperature(provider.temperature)
                .messages(messages)
                .build()
                .map_err(|e| BlitzChatError::Runtime(e.to_string()))?;

            let mut stream = provider
                .client
                .chat()
                .create_stream(completion_request)
                .await
                .map_err(|e| BlitzChatError::Http(e.to_string()))?;

            while let Some(part) = stream.next().await {
                let part = part.map_err(|e| BlitzChatError::Http(e.to_string()))?;
                for choice in part.choices {
                    if let Some(content) = choice.delta.content {
                        if !content.is_empty() {
                            yield ChatDelta {
                                index: choice.index,
                                content,
                            };
                        }
                    }
                }
            }
        })
    }

    async fn generate_text(&self, prompt: &str, system_prompt: &str) -> Result<String> {
        let mut messages = Vec::new();
        if !system_prompt.is_empty() {
            let system = ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt)
                .build()
                .map_err(|e| BlitzChatError::Runtime(e.to_string()))?;
            messages.push(ChatCompletionRequestMessage::System(system));
        }
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Text(
                prompt.to_string(),
            ))
            .build()
            .map_err(|e| BlitzChatError::Runtime(e.to_string()))?;
        messages.push(ChatCompletionRequestMessage::User(user));

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .temperature(self.temperature)
            .messages(messages)
            .build()
            .map_err(|e| BlitzChatError::Runtime(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| BlitzChatError::Http(e.to_string()))?;

        let text = response
            .choices
            .first()
            .ok_or_else(|| BlitzChatError::Runtime("no choices returned".to_string()))?
            .message
            .content
            .clone()
            .unwrap_or_default();
        Ok(text)
    }

    async fn synthesize_speech(
        &self,
        input: &str,
        voice: &str,
        response_format: &str,
    ) -> Result<SpeechAudio> {
        let request = CreateSpeechRequestArgs::default()
            .model(SpeechModel::Tts1)
            .input(input)
            .voice(Self::voice_from_str(voice))
            .response_format(Self::speech_format_from_str(response_format))
            .build()
            .map_err(|e| BlitzChatError::Runtime(e.to_string()))?;

        let response = self
            .client
            .audio()
            .speech()
            .create(request)
            .await
            .map_err(|e| BlitzChatError::Http(e.to_string()))?;

        Ok(SpeechAudio {
            bytes: response.bytes.to_vec(),
            mime_type: Self::mime_type_for_format(response_format).to_string(),
        })
    }

    async fn generate_image(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/images/generations", self.endpoint.trim_end_matches('/'));
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "prompt": prompt,
                "n": 1,
                "response_format": "url",
            }))
            .send()
            .await
            .map_err(|e| BlitzChatError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BlitzChatError::Http(format!(
                "image generation failed with status {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BlitzChatError::Serialization(e.to_string()))?;
        body.get("data")
            .and_then(|data| data.get(0))
            .and_then(|item| item.get("url"))
            .and_then(|url| url.as_str())
            .map(str::to_string)
            .ok_or_else(|| BlitzChatError::Http("no image url in response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::chat::now_millis;

    fn memory(content: &str) -> Memory {
        Memory {
            id: 1,
            content: content.to_string(),
            chat_id: None,
            created_time: now_millis(),
            updated_time: now_millis(),
        }
    }

    #[test]
    fn system_prompt_combines_instructions_and_memories() {
        let prompt = build_system_prompt(Some("Be brief."), &[memory("User likes Rust")]);
        assert!(prompt.starts_with("Be brief."));
        assert!(prompt.contains("RELEVANT MEMORY"));
        assert!(prompt.contains("- User likes Rust"));
    }

    #[test]
    fn system_prompt_empty_without_input() {
        assert!(build_system_prompt(None, &[]).is_empty());
        assert!(!build_system_prompt(None, &[memory("x")]).is_empty());
    }

    #[test]
    fn speech_format_mime_types_line_up() {
        assert_eq!(OpenAiProvider::mime_type_for_format("mp3"), "audio/mpeg");
        assert_eq!(OpenAiProvider::mime_type_for_format("wav"), "audio/wav");
        assert_eq!(OpenAiProvider::mime_type_for_format("unknown"), "audio/mpeg");
    }
}

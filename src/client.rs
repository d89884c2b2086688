use std::path::Path;
use std::sync::Arc;

use futures::stream::BoxStream;

use crate::config::Settings;
use crate::domains::chat::{Chat, ChatWithMessages, GeneratedAudio, GeneratedImage, Memory};
use crate::error::{BlitzChatError, Result};
use crate::interfaces::providers::{ChatDelta, LlmProvider};
use crate::providers::openai::OpenAiProvider;
use crate::services::chat::ChatService;
use crate::services::memory::MemoryService;
use crate::store::ChatStore;

/// The application facade: one store, one provider, and the services
/// wired over them.
pub struct BlitzChat {
    store: ChatStore,
    provider: Arc<dyn LlmProvider>,
    chat_service: ChatService,
    memory_service: MemoryService,
}

impl BlitzChat {
    pub async fn open(settings: Settings, db_path: &str) -> Result<Self> {
        let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::from_settings(&settings));
        Self::with_provider(settings, db_path, provider).await
    }

    /// Same wiring with a caller-supplied provider; tests use this with
    /// mock providers.
    pub async fn with_provider(
        settings: Settings,
        db_path: &str,
        provider: Arc<dyn LlmProvider>,
    ) -> Result<Self> {
        let store = ChatStore::open(db_path).await?;
        let memory_service = MemoryService::new(store.clone());
        let chat_service = ChatService::new(
            store.clone(),
            memory_service.clone(),
            Arc::clone(&provider),
            settings.memory_enabled(),
        );
        Ok(Self {
            store,
            provider,
            chat_service,
            memory_service,
        })
    }

    pub async fn open_with_settings_file<P: AsRef<Path>>(
        settings_path: P,
        db_path: &str,
    ) -> Result<Self> {
        let settings = Settings::from_file(settings_path)?;
        Self::open(settings, db_path).await
    }

    // --- chats ---

    pub async fn create_chat(&self) -> Result<Chat> {
        self.store.create_chat().await
    }

    pub async fn list_chats(&self) -> Result<Vec<Chat>> {
        self.store.list_chats().await
    }

    pub async fn delete_chat(&self, chat_id: i64) -> Result<()> {
        self.store.delete_chat(chat_id).await
    }

    pub async fn chat_with_messages(&self, chat_id: i64) -> Result<ChatWithMessages> {
        self.store
            .get_chat_with_messages(chat_id)
            .await?
            .ok_or_else(|| BlitzChatError::Runtime(format!("no such chat: {chat_id}")))
    }

    pub async fn delete_message(&self, message_id: i64) -> Result<()> {
        self.store.delete_message(message_id).await
    }

    /// Sends a message into the chat, streaming assistant deltas.
    pub fn send_stream(&self, chat_id: i64, text: &str) -> BoxStream<'static, Result<ChatDelta>> {
        self.chat_service.send_stream(chat_id, text)
    }

    // --- memories ---

    pub fn memory(&self) -> &MemoryService {
        &self.memory_service
    }

    pub async fn memories(&self) -> Result<Vec<Memory>> {
        self.memory_service.all_memories().await
    }

    pub async fn search_memories(&self, query: &str, limit: i64) -> Result<Vec<Memory>> {
        self.memory_service.search_memories(query, limit).await
    }

    pub async fn save_memory(&self, content: &str, chat_id: Option<i64>) -> Result<i64> {
        self.memory_service.save_memory(content, chat_id).await
    }

    pub async fn delete_memory(&self, memory_id: i64) -> Result<()> {
        self.memory_service.delete_memory(memory_id).await
    }

    pub async fn delete_all_memories(&self) -> Result<()> {
        self.memory_service.delete_all_memories().await
    }

    // --- generated media ---

    /// Generates an image and records it; returns the stored record.
    pub async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage> {
        let url = self.provider.generate_image(prompt).await?;
        let id = self
            .store
            .insert_generated_image(Some(prompt), Some(&url))
            .await?;
        Ok(GeneratedImage {
            id,
            prompt: Some(prompt.to_string()),
            url: Some(url),
        })
    }

    pub async fn list_generated_images(&self) -> Result<Vec<GeneratedImage>> {
        self.store.list_generated_images().await
    }

    /// Synthesizes speech for `input`, writes the audio next to the
    /// database, and records it.
    pub async fn synthesize_speech(
        &self,
        input: &str,
        voice: &str,
        format: &str,
        output_path: &str,
    ) -> Result<GeneratedAudio> {
        let audio = self.provider.synthesize_speech(input, voice, format).await?;
        tokio::fs::write(output_path, &audio.bytes)
            .await
            .map_err(|e| BlitzChatError::Runtime(e.to_string()))?;
        let id = self
            .store
            .insert_generated_audio(input, output_path, &audio.mime_type)
            .await?;
        Ok(GeneratedAudio {
            id,
            input: input.to_string(),
            file_path: output_path.to_string(),
            file_mime_type: audio.mime_type,
        })
    }

    pub async fn list_generated_audios(&self) -> Result<Vec<GeneratedAudio>> {
        self.store.list_generated_audios().await
    }
}

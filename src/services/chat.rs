use std::collections::HashMap;
use std::sync::Arc;

use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;

use crate::domains::chat::{now_millis, ChatMessage, ROLE_ASSISTANT, ROLE_USER};
use crate::error::{BlitzChatError, Result};
use crate::interfaces::providers::{ChatDelta, ChatRequest, LlmProvider};
use crate::services::memory::MemoryService;
use crate::store::ChatStore;

/// Streaming send flow: writes the user message and a generating
/// placeholder, streams the completion into message rows chunk by
/// chunk, and cleans up after itself on failure.
#[derive(Clone)]
pub struct ChatService {
    store: ChatStore,
    memory: MemoryService,
    provider: Arc<dyn LlmProvider>,
    memory_enabled: bool,
}

impl ChatService {
    pub fn new(
        store: ChatStore,
        memory: MemoryService,
        provider: Arc<dyn LlmProvider>,
        memory_enabled: bool,
    ) -> Self {
        Self {
            store,
            memory,
            provider,
            memory_enabled,
        }
    }

    /// Sends `text` into the chat and yields assistant deltas as they
    /// arrive. Every delta has already been written to the database
    /// when it is yielded.
    pub fn send_stream(&self, chat_id: i64, text: &str) -> BoxStream<'static, Result<ChatDelta>> {
        let service = self.clone();
        let text = text.trim().to_string();

        Box::pin(try_stream! {
            if text.is_empty() {
                Err::<(), BlitzChatError>(BlitzChatError::Runtime(
                    "cannot send an empty message".to_string(),
                ))?;
            }
            if service.store.count_generating_in_chat(chat_id).await? > 0 {
                Err::<(), BlitzChatError>(BlitzChatError::Runtime(
                    "a response is still generating in this chat".to_string(),
                ))?;
            }

            let chat_with_messages = service
                .store
                .get_chat_with_messages(chat_id)
                .await?
                .ok_or_else(|| BlitzChatError::Runtime(format!("no such chat: {chat_id}")))?;

            let memories = if service.memory_enabled {
                service.memory.default_relevant_memories(&text).await?
            } else {
                Vec::new()
            };

            if chat_with_messages.chat.title.is_none() {
                service.store.set_chat_title(chat_id, &text).await?;
            }

            let user_message_id = service
                .store
                .insert_message(chat_id, ROLE_USER, Some(&text), false)
                .await?;
            let placeholder_id = service
                .store
                .insert_message(chat_id, ROLE_ASSISTANT, None, true)
                .await?;

            let user_message = ChatMessage {
                id: user_message_id,
                chat_id,
                role: ROLE_USER.to_string(),
                content: Some(text.clone()),
                generating: false,
                time: now_millis(),
            };
            let mut history = chat_with_messages.messages.clone();
            history.push(user_message.clone());

            let request = ChatRequest::new(history.clone()).with_memories(memories);
            let mut upstream = service.provider.chat_stream(request);

            // Accumulated content per response choice; choice 0 owns the
            // placeholder row, later choices get rows on first delta.
            let mut rows: HashMap<u32, (i64, String)> = HashMap::new();
            rows.insert(0, (placeholder_id, String::new()));

            while let Some(item) = upstream.next().await {
                let step = match item {
                    Ok(delta) => service
                        .apply_delta(chat_id, &mut rows, &delta)
                        .await
                        .map(|()| delta),
                    Err(e) => Err(e),
                };
                match step {
                    Ok(delta) => yield delta,
                    Err(e) => {
                        service.cleanup_failed_send(chat_id).await;
                        Err::<(), BlitzChatError>(e)?;
                    }
                }
            }

            match service.finalize_rows(chat_id, &rows).await {
                Ok(finals) => {
                    if service.memory_enabled {
                        service.spawn_memory_save(chat_id, history, finals);
                    }
                }
                Err(e) => {
                    service.cleanup_failed_send(chat_id).await;
                    Err::<(), BlitzChatError>(e)?;
                }
            }
        })
    }

    async fn apply_delta(
        &self,
        chat_id: i64,
        rows: &mut HashMap<u32, (i64, String)>,
        delta: &ChatDelta,
    ) -> Result<()> {
        if !rows.contains_key(&delta.index) {
            let id = self
                .store
                .insert_message(chat_id, ROLE_ASSISTANT, None, true)
                .await?;
            rows.insert(delta.index, (id, String::new()));
        }
        let (row_id, accumulated) = rows
            .get_mut(&delta.index)
            .ok_or_else(|| BlitzChatError::Runtime("missing response row".to_string()))?;
        accumulated.push_str(&delta.content);
        self.store
            .update_message_content(*row_id, accumulated)
            .await
    }

    /// Clears generating flags and trims content on every produced row,
    /// returning the finished assistant messages.
    async fn finalize_rows(
        &self,
        chat_id: i64,
        rows: &HashMap<u32, (i64, String)>,
    ) -> Result<Vec<ChatMessage>> {
        let mut finals = Vec::with_capacity(rows.len());
        for (row_id, accumulated) in rows.values() {
            let content = accumulated.trim();
            self.store.finalize_message(*row_id, content).await?;
            finals.push(ChatMessage {
                id: *row_id,
                chat_id,
                role: ROLE_ASSISTANT.to_string(),
                content: Some(content.to_string()),
                generating: false,
                time: now_millis(),
            });
        }
        Ok(finals)
    }

    fn spawn_memory_save(
        &self,
        chat_id: i64,
        mut conversation: Vec<ChatMessage>,
        finals: Vec<ChatMessage>,
    ) {
        let memory = self.memory.clone();
        conversation.extend(finals);
        tokio::spawn(async move {
            if let Err(e) = memory.save_conversation_memory(&conversation, chat_id).await {
                tracing::debug!("skipping conversation memory: {e}");
            }
        });
    }

    async fn cleanup_failed_send(&self, chat_id: i64) {
        if let Err(e) = self.store.mark_all_not_generating_in_chat(chat_id).await {
            tracing::warn!("failed to clear generating flags: {e}");
        }
        if let Err(e) = self.store.delete_empty_messages_in_chat(chat_id).await {
            tracing::warn!("failed to delete empty messages: {e}");
        }
    }
}

use std::collections::HashMap;

use regex::Regex;

use crate::domains::chat::{ChatMessage, Memory};
use crate::error::Result;
use crate::store::ChatStore;

const RELEVANT_LIMIT: usize = 3;
const TOPIC_COUNT: usize = 5;
const MIN_WORD_LEN: usize = 4;
const SUMMARY_SNIPPET_LEN: usize = 100;

const STOPWORDS: &[&str] = &[
    "the", "be", "to", "of", "and", "a", "in", "that", "have", "i", "it", "for", "not", "on",
    "with", "he", "as", "you", "do", "at", "this", "but", "his", "by", "from", "they", "we", "say",
    "her", "she", "or", "an", "will", "my", "one", "all", "would", "there", "their", "what", "so",
    "up", "out", "if", "about", "who", "get", "which", "go", "me", "when", "make", "can", "like",
    "time", "no", "just", "him", "know", "take", "people", "into", "year", "your", "good", "some",
    "could", "them", "see", "other", "than", "then", "now", "look", "only", "come", "its", "over",
    "think", "also", "back", "after", "use", "two", "how", "our", "work", "first", "well", "way",
    "even", "new", "want", "because", "any", "these", "give", "day", "most", "us", "is", "was",
    "are", "were", "been", "has", "had", "did", "does", "doing", "done",
];

/// Long-term memory over the store: saving conversation summaries and
/// surfacing the ones relevant to a new message.
#[derive(Clone)]
pub struct MemoryService {
    store: ChatStore,
}

impl MemoryService {
    pub fn new(store: ChatStore) -> Self {
        Self { store }
    }

    pub async fn all_memories(&self) -> Result<Vec<Memory>> {
        self.store.all_memories().await
    }

    pub async fn latest_memories(&self, limit: i64) -> Result<Vec<Memory>> {
        self.store.latest_memories(limit).await
    }

    pub async fn search_memories(&self, query: &str, limit: i64) -> Result<Vec<Memory>> {
        self.store.search_memories(query, limit).await
    }

    pub async fn save_memory(&self, content: &str, chat_id: Option<i64>) -> Result<i64> {
        self.store.insert_memory(content, chat_id).await
    }

    pub async fn update_memory(&self, memory_id: i64, content: &str) -> Result<()> {
        self.store.update_memory_content(memory_id, content).await
    }

    pub async fn delete_memory(&self, memory_id: i64) -> Result<()> {
        self.store.delete_memory(memory_id).await
    }

    pub async fn delete_all_memories(&self) -> Result<()> {
        self.store.delete_all_memories().await
    }

    pub async fn count_memories(&self) -> Result<i64> {
        self.store.count_memories().await
    }

    /// Memories relevant to the message being sent: substring matches
    /// first, then the most recently updated ones, deduplicated by id
    /// and truncated to `limit`.
    pub async fn relevant_memories(&self, current_message: &str, limit: usize) -> Result<Vec<Memory>> {
        let search_results = self
            .store
            .search_memories(current_message, limit as i64)
            .await?;
        let latest = self.store.latest_memories(limit as i64).await?;

        let mut seen = Vec::with_capacity(limit);
        let mut combined = Vec::with_capacity(limit);
        for memory in search_results.into_iter().chain(latest) {
            if seen.contains(&memory.id) {
                continue;
            }
            seen.push(memory.id);
            combined.push(memory);
            if combined.len() == limit {
                break;
            }
        }
        Ok(combined)
    }

    pub async fn default_relevant_memories(&self, current_message: &str) -> Result<Vec<Memory>> {
        self.relevant_memories(current_message, RELEVANT_LIMIT).await
    }

    /// Summarizes a finished conversation and stores it; returns the new
    /// memory id, or `None` when there is nothing worth keeping.
    pub async fn save_conversation_memory(
        &self,
        messages: &[ChatMessage],
        chat_id: i64,
    ) -> Result<Option<i64>> {
        let summary = conversation_summary(messages);
        if summary.is_empty() {
            return Ok(None);
        }
        let id = self.store.insert_memory(&summary, Some(chat_id)).await?;
        Ok(Some(id))
    }
}

/// Builds a one-line summary of what a conversation was about: the top
/// keywords across all messages plus the tail of the last user message.
pub fn conversation_summary(messages: &[ChatMessage]) -> String {
    if messages.is_empty() {
        return String::new();
    }

    let user_messages: Vec<&str> = messages
        .iter()
        .filter(|m| m.from_user())
        .filter_map(|m| m.content.as_deref())
        .collect();
    let assistant_messages: Vec<&str> = messages
        .iter()
        .filter(|m| m.from_assistant())
        .filter_map(|m| m.content.as_deref())
        .collect();

    if user_messages.is_empty() {
        return String::new();
    }

    let mut texts = user_messages.clone();
    texts.extend(assistant_messages);
    let topics = extract_topics(&texts);

    let mut summary = String::from("Conversation about: ");
    summary.push_str(&topics.join(", "));

    let last = user_messages[user_messages.len() - 1];
    summary.push_str(". User asked about: ");
    summary.extend(last.chars().take(SUMMARY_SNIPPET_LEN));
    if last.chars().count() > SUMMARY_SNIPPET_LEN {
        summary.push_str("...");
    }

    summary
}

/// Keyword-frequency topic extraction: lowercase, strip everything but
/// letters and whitespace, drop short words and stopwords, rank by
/// frequency (ties keep first-seen order).
fn extract_topics(texts: &[&str]) -> Vec<String> {
    let non_letters = Regex::new(r"[^a-zA-Z\s]").unwrap();

    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for text in texts {
        let lowered = text.to_lowercase();
        let cleaned = non_letters.replace_all(&lowered, "");
        for word in cleaned.split_whitespace() {
            if word.len() < MIN_WORD_LEN || STOPWORDS.contains(&word) {
                continue;
            }
            let entry = counts.entry(word.to_string()).or_insert(0);
            if *entry == 0 {
                order.push(word.to_string());
            }
            *entry += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = order
        .into_iter()
        .map(|word| {
            let count = counts[&word];
            (word, count)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
        .into_iter()
        .take(TOPIC_COUNT)
        .map(|(word, _)| word)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::chat::{ROLE_ASSISTANT, ROLE_USER};

    fn message(role: &str, content: &str) -> ChatMessage {
        ChatMessage {
            id: 0,
            chat_id: 1,
            role: role.to_string(),
            content: Some(content.to_string()),
            generating: false,
            time: 0,
        }
    }

    #[test]
    fn summary_empty_without_user_messages() {
        assert_eq!(conversation_summary(&[]), "");
        let only_assistant = [message(ROLE_ASSISTANT, "hello there")];
        assert_eq!(conversation_summary(&only_assistant), "");
    }

    #[test]
    fn summary_names_topics_and_last_question() {
        let messages = [
            message(ROLE_USER, "Tell me about rust lifetimes"),
            message(ROLE_ASSISTANT, "Lifetimes tie borrows to scopes in rust."),
            message(ROLE_USER, "How do lifetimes interact with closures?"),
        ];
        let summary = conversation_summary(&messages);
        assert!(summary.starts_with("Conversation about: "));
        assert!(summary.contains("lifetimes"));
        assert!(summary.contains("User asked about: How do lifetimes interact with closures?"));
        assert!(!summary.ends_with("..."));
    }

    #[test]
    fn summary_truncates_long_questions() {
        let long = "a".repeat(150);
        let messages = [message(ROLE_USER, &long)];
        let summary = conversation_summary(&messages);
        assert!(summary.ends_with("..."));
        let snippet = summary.split("User asked about: ").nth(1).unwrap();
        assert_eq!(snippet.len(), SUMMARY_SNIPPET_LEN + 3);
    }

    #[test]
    fn topics_drop_stopwords_and_short_words() {
        let topics = extract_topics(&["the cat sat on the mat with rust rust rust"]);
        assert_eq!(topics.first().map(String::as_str), Some("rust"));
        assert!(!topics.iter().any(|t| t == "the"));
        assert!(!topics.iter().any(|t| t == "cat"));
    }

    #[test]
    fn topics_strip_punctuation_and_rank_by_frequency() {
        let topics = extract_topics(&[
            "Deploy! deploy, DEPLOY kubernetes",
            "kubernetes cluster cluster",
        ]);
        assert_eq!(topics[0], "deploy");
        assert_eq!(topics[1], "kubernetes");
        assert_eq!(topics[2], "cluster");
    }
}

pub mod client;
pub mod config;
pub mod domains;
pub mod error;
pub mod interfaces;
pub mod markdown;
pub mod models;
pub mod providers;
pub mod services;
pub mod store;

pub use crate::client::BlitzChat;
pub use crate::config::Settings;
pub use crate::error::{BlitzChatError, Result};
pub use crate::interfaces::providers::{ChatDelta, ChatRequest, LlmProvider, SpeechAudio};
pub use crate::markdown::{parse_blocks, Block, Span, SpanStyle};

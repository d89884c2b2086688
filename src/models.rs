//! Catalog of model identifiers known to work against the default
//! endpoint. The settings accept any model string; this list only feeds
//! the `models` subcommand.

pub const CHAT_MODELS: &[&str] = &[
    // Stable
    "llama-3.1-8b-instant",
    "llama-3.3-70b-versatile",
    "meta-llama/llama-guard-4-12b",
    "openai/gpt-oss-120b",
    "openai/gpt-oss-20b",
    // Preview
    "deepseek-r1-distill-llama-70b",
    "meta-llama/llama-4-maverick-17b-128e-instruct",
    "meta-llama/llama-4-scout-17b-16e-instruct",
    "meta-llama/llama-prompt-guard-2-22m",
    "meta-llama/llama-prompt-guard-2-86m",
    "moonshotai/kimi-k2-instruct",
    "qwen/qwen3-32b",
];

// Not usable for chat completion; listed for the speech pipeline.
pub const SPEECH_MODELS: &[&str] = &["whisper-large-v3", "whisper-large-v3-turbo"];

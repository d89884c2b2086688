use futures::StreamExt;
use httpmock::Method::POST;
use httpmock::MockServer;
use serde_json::json;

use blitz_chat::domains::chat::ChatMessage;
use blitz_chat::error::BlitzChatError;
use blitz_chat::interfaces::providers::{ChatRequest, LlmProvider};
use blitz_chat::providers::openai::OpenAiProvider;

fn provider_for(server: &MockServer) -> OpenAiProvider {
    OpenAiProvider::new(
        "key".to_string(),
        "gpt-4o-mini".to_string(),
        server.base_url(),
        0.7,
        Some("Be helpful.".to_string()),
    )
}

fn stream_chunk(index: u32, content: &str) -> String {
    json!({
        "id": "chatcmpl-stream",
        "object": "chat.completion.chunk",
        "created": 1,
        "model": "gpt-4o-mini",
        "choices": [{
            "index": index,
            "delta": {"content": content},
            "finish_reason": null
        }]
    })
    .to_string()
}

#[tokio::test]
async fn generate_text_via_httpmock() {
    let server = MockServer::start_async().await;
    let chat_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "created": 1,
                "model": "gpt-4o-mini",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "hello"},
                    "finish_reason": "stop"
                }]
            }));
        })
        .await;

    let provider = provider_for(&server);
    let text = provider.generate_text("hi", "sys").await.unwrap();
    assert_eq!(text, "hello");
    chat_mock.assert_hits(1);
}

#[tokio::test]
async fn generate_text_without_choices_is_an_error() {
    let server = MockServer::start_async().await;
    let empty_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({
                "id": "chatcmpl-err",
                "object": "chat.completion",
                "created": 1,
                "model": "gpt-4o-mini",
                "choices": []
            }));
        })
        .await;

    let provider = provider_for(&server);
    let err = provider.generate_text("hi", "").await.unwrap_err();
    assert!(matches!(err, BlitzChatError::Runtime(_)));
    empty_mock.assert_hits(1);
}

#[tokio::test]
async fn chat_stream_yields_deltas_per_choice() {
    let server = MockServer::start_async().await;
    let body = format!(
        "data: {}\n\ndata: {}\n\ndata: {}\n\ndata: {}\n\ndata: [DONE]\n\n",
        stream_chunk(0, "Hel"),
        stream_chunk(0, ""),
        stream_chunk(1, "alt"),
        stream_chunk(0, "lo"),
    );
    let stream_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(body);
        })
        .await;

    let provider = provider_for(&server);
    let request = ChatRequest::new(vec![ChatMessage::new_user(1, "hi")]);
    let deltas: Vec<_> = provider
        .chat_stream(request)
        .map(|item| item.unwrap())
        .collect()
        .await;

    // Empty deltas are dropped; the rest keep arrival order and indices.
    let pairs: Vec<(u32, &str)> = deltas
        .iter()
        .map(|d| (d.index, d.content.as_str()))
        .collect();
    assert_eq!(pairs, vec![(0, "Hel"), (1, "alt"), (0, "lo")]);
    stream_mock.assert_hits(1);
}

#[tokio::test]
async fn chat_stream_sends_memories_in_system_prompt() {
    let server = MockServer::start_async().await;
    let body = format!("data: {}\n\ndata: [DONE]\n\n", stream_chunk(0, "ok"));
    let stream_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .body_contains("RELEVANT MEMORY")
                .body_contains("User likes Rust");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(body);
        })
        .await;

    let provider = provider_for(&server);
    let memory = blitz_chat::domains::chat::Memory {
        id: 1,
        content: "User likes Rust".to_string(),
        chat_id: None,
        created_time: 0,
        updated_time: 0,
    };
    let request =
        ChatRequest::new(vec![ChatMessage::new_user(1, "hi")]).with_memories(vec![memory]);
    let deltas: Vec<_> = provider.chat_stream(request).collect().await;
    assert_eq!(deltas.len(), 1);
    stream_mock.assert_hits(1);
}

#[tokio::test]
async fn synthesize_speech_returns_bytes_and_mime() {
    let server = MockServer::start_async().await;
    let speech_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/audio/speech");
            then.status(200).body("AUDIO");
        })
        .await;

    let provider = provider_for(&server);
    let audio = provider.synthesize_speech("hello", "alloy", "mp3").await.unwrap();
    assert_eq!(audio.bytes, b"AUDIO".to_vec());
    assert_eq!(audio.mime_type, "audio/mpeg");

    let wav = provider.synthesize_speech("hello", "nova", "wav").await.unwrap();
    assert_eq!(wav.mime_type, "audio/wav");
    speech_mock.assert_hits(2);
}

#[tokio::test]
async fn generate_image_parses_url_from_response() {
    let server = MockServer::start_async().await;
    let image_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/images/generations");
            then.status(200).json_body(json!({
                "created": 1,
                "data": [{"url": "https://img.example/cat.png"}]
            }));
        })
        .await;

    let provider = provider_for(&server);
    let url = provider.generate_image("a cat").await.unwrap();
    assert_eq!(url, "https://img.example/cat.png");
    image_mock.assert_hits(1);
}

#[tokio::test]
async fn generate_image_surfaces_http_failures() {
    let server = MockServer::start_async().await;
    let image_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/images/generations");
            then.status(500).body("boom");
        })
        .await;

    let provider = provider_for(&server);
    let err = provider.generate_image("a cat").await.unwrap_err();
    assert!(matches!(err, BlitzChatError::Http(_)));
    image_mock.assert_hits(1);
}

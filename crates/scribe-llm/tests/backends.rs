//! Backend wire-format tests against a mock provider.

use std::sync::Arc;

use scribe_common::SandboxClient;
use scribe_llm::{
    CompletionOptions, GeminiBackend, LlmBackend, LlmClient, LlmError, LlmRequest, Message, OllamaBackend,
    OpenAiCompatibleBackend,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gemini_reply(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }],
        "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 7 }
    })
}

fn gemini(server: &MockServer) -> GeminiBackend {
    GeminiBackend::new(SandboxClient::new().unwrap(), "test-key", "gemini-2.0-flash").with_base_url(server.uri())
}

#[tokio::test]
async fn test_gemini_sends_system_instruction_and_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "systemInstruction": { "parts": [{ "text": "be brief" }] },
            "contents": [{ "role": "user", "parts": [{ "text": "hello" }] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("hi there")))
        .expect(1)
        .mount(&server)
        .await;

    let resp = gemini(&server)
        .complete(LlmRequest {
            messages: vec![Message::system("be brief"), Message::user("hello")],
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(resp.content, "hi there");
    assert_eq!(resp.prompt_tokens, 12);
    assert_eq!(resp.completion_tokens, 7);
}

#[tokio::test]
async fn test_gemini_api_error_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": 403, "message": "API key not valid" }
        })))
        .mount(&server)
        .await;

    let err = gemini(&server)
        .complete(LlmRequest { messages: vec![Message::user("x")], ..Default::default() })
        .await
        .unwrap_err();

    match err {
        LlmError::ApiError { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "API key not valid");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_json_mode_strips_fences_and_sets_mime_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "generationConfig": { "responseMimeType": "application/json" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("```json\n{\"conditions\": [\"asthma\"]}\n```")))
        .expect(1)
        .mount(&server)
        .await;

    let client = LlmClient::new(Arc::new(gemini(&server)));
    let value = client
        .complete_json("test", "extract", CompletionOptions::default())
        .await
        .unwrap();
    assert_eq!(value, json!({ "conditions": ["asthma"] }));
}

#[tokio::test]
async fn test_invalid_json_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("definitely not json")))
        .mount(&server)
        .await;

    let client = LlmClient::new(Arc::new(gemini(&server)));
    let err = client
        .complete_json("test", "extract", CompletionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::InvalidJson(_)));
}

#[tokio::test]
async fn test_empty_completion_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let client = LlmClient::new(Arc::new(gemini(&server)));
    let err = client
        .complete_text("test", "hello", CompletionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::EmptyResponse));
    assert!(!client.health_check().await);
}

#[tokio::test]
async fn test_openai_compatible_uses_bearer_and_chat_completions() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(wiremock::matchers::header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o-mini",
            "choices": [{ "message": { "role": "assistant", "content": "pong" } }],
            "usage": { "prompt_tokens": 3, "completion_tokens": 1 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAiCompatibleBackend::new(
        SandboxClient::new().unwrap(),
        format!("{}/v1", server.uri()),
        "gpt-4o-mini",
        Some("sk-test".into()),
    );
    let resp = backend
        .complete(LlmRequest { messages: vec![Message::user("ping")], ..Default::default() })
        .await
        .unwrap();
    assert_eq!(resp.content, "pong");
    assert_eq!(resp.model, "gpt-4o-mini");
}

#[tokio::test]
async fn test_ollama_hits_openai_shim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "local answer" } }]
        })))
        .mount(&server)
        .await;

    let backend = OllamaBackend::new(SandboxClient::new().unwrap(), server.uri(), "llama3:8b");
    let resp = backend
        .complete(LlmRequest { messages: vec![Message::user("q")], ..Default::default() })
        .await
        .unwrap();
    assert_eq!(resp.content, "local answer");
    assert_eq!(resp.model, "llama3:8b");
    assert_eq!(resp.prompt_tokens, 0);
}

#[tokio::test]
async fn test_disallowed_host_is_blocked() {
    let backend = OpenAiCompatibleBackend::new(
        SandboxClient::new().unwrap(),
        "https://llm.untrusted.example/v1",
        "m",
        None,
    );
    let err = backend
        .complete(LlmRequest { messages: vec![Message::user("q")], ..Default::default() })
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Blocked(_)));
}

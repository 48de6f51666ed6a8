//! Tests for the OpenAI-compatible HTTP adapter against a mock server.

use grimnir::{ChatProvider, ChatRequest, FinishReason, GrimnirError, Message, OpenAiCompatProvider};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request() -> ChatRequest {
    ChatRequest::new("gpt-3.5-turbo", vec![Message::user("Hello")]).max_tokens(50)
}

#[tokio::test]
async fn successful_call_maps_the_wire_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-3.5-turbo",
            "messages": [{"role": "user", "content": "Hello"}],
            "max_tokens": 50,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-123",
            "model": "gpt-3.5-turbo-0125",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hi there!"},
                "finish_reason": "stop",
            }],
            "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12},
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiCompatProvider::new("openai", server.uri(), "sk-test");
    let response = provider.call(&request()).await.unwrap();

    // The requested model is echoed even though upstream renamed it.
    assert_eq!(response.model, "gpt-3.5-turbo");
    assert_eq!(response.content, "Hi there!");
    assert_eq!(response.finish_reason, FinishReason::Stop);
    assert_eq!(response.usage.unwrap().total_tokens, 12);
}

#[tokio::test]
async fn length_finish_reason_is_mapped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {"role": "assistant", "content": "truncated…"},
                "finish_reason": "length",
            }],
        })))
        .mount(&server)
        .await;

    let provider = OpenAiCompatProvider::new("openai", server.uri(), "sk-test");
    let response = provider.call(&request()).await.unwrap();
    assert_eq!(response.finish_reason, FinishReason::Length);
    assert!(response.usage.is_none());
}

#[tokio::test]
async fn server_errors_are_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let provider = OpenAiCompatProvider::new("openai", server.uri(), "sk-test");
    match provider.call(&request()).await {
        Err(GrimnirError::Upstream {
            provider,
            status,
            transient,
            ..
        }) => {
            assert_eq!(provider, "openai");
            assert_eq!(status, Some(500));
            assert!(transient);
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn upstream_rate_limiting_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let provider = OpenAiCompatProvider::new("openai", server.uri(), "sk-test");
    match provider.call(&request()).await {
        Err(GrimnirError::Upstream { transient, .. }) => assert!(transient),
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn client_errors_are_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string("model parameter is malformed"),
        )
        .mount(&server)
        .await;

    let provider = OpenAiCompatProvider::new("openai", server.uri(), "sk-test");
    match provider.call(&request()).await {
        Err(GrimnirError::Upstream {
            status,
            message,
            transient,
            ..
        }) => {
            assert_eq!(status, Some(400));
            assert!(message.contains("malformed"));
            assert!(!transient);
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_choices_is_a_permanent_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let provider = OpenAiCompatProvider::new("openai", server.uri(), "sk-test");
    match provider.call(&request()).await {
        Err(GrimnirError::Upstream { transient, .. }) => assert!(!transient),
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn trailing_slash_in_base_url_is_tolerated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "ok"}}],
        })))
        .mount(&server)
        .await;

    let base = format!("{}/v1/", server.uri());
    let provider = OpenAiCompatProvider::new("openai", base, "sk-test");
    let response = provider.call(&request()).await.unwrap();
    assert_eq!(response.content, "ok");
}

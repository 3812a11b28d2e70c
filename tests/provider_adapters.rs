//! Provider adapter integration tests
//!
//! Stubs the upstream vendor HTTP endpoint with `wiremock` and drives each
//! adapter's real `chat`/`chat_stream` methods against it, exercising the
//! wire translation end to end rather than just the request-body builder.

use model_gateway::core::providers::anthropic::AnthropicProvider;
use model_gateway::core::providers::gemini::GeminiProvider;
use model_gateway::core::providers::openai::OpenAiProvider;
use model_gateway::core::types::chat::ChatRequest;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn openai_chat_translates_vendor_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-abc",
            "object": "chat.completion",
            "created": 1,
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "hi there"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
        })))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(server.uri(), "sk-test".to_string()).unwrap();
    let request = ChatRequest::new("gpt-4o").add_user_message("hello");
    let response = provider.chat(&request, None).await.unwrap();

    assert_eq!(response.choices[0].message.text_content(), "hi there");
    assert_eq!(response.provider, "openai");
    assert_eq!(response.usage.unwrap().total_tokens, 7);
}

#[tokio::test]
async fn openai_chat_classifies_429_as_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(server.uri(), "sk-test".to_string()).unwrap();
    let request = ChatRequest::new("gpt-4o").add_user_message("hello");
    let err = provider.chat(&request, None).await.unwrap_err();

    assert!(err.is_retryable());
}

#[tokio::test]
async fn anthropic_chat_maps_model_alias_and_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_1",
            "content": [{"type": "text", "text": "hello back"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 11, "output_tokens": 3}
        })))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new(server.uri(), "key".to_string()).unwrap();
    let request = ChatRequest::new("claude-3-opus").add_user_message("hi");
    let response = provider.chat(&request, None).await.unwrap();

    assert_eq!(response.choices[0].message.text_content(), "hello back");
    assert_eq!(response.usage.unwrap().prompt_tokens, 11);
}

#[tokio::test]
async fn gemini_chat_translates_candidate_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [{"text": "bonjour"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2}
        })))
        .mount(&server)
        .await;

    let provider = GeminiProvider::new(server.uri(), "key".to_string()).unwrap();
    let request = ChatRequest::new("gemini-1.5-pro").add_user_message("salut");
    let response = provider.chat(&request, None).await.unwrap();

    assert_eq!(response.choices[0].message.text_content(), "bonjour");
    assert_eq!(response.usage.unwrap().prompt_tokens, 4);
}

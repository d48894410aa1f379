use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gemstream::options::{GeminiConfig, GenerateOptions, TransportOptions};
use gemstream::providers::GeminiClient;
use gemstream::{ClientError, FramingMode, TransportError};

fn make_client(server: &MockServer) -> GeminiClient {
    let config = GeminiConfig::new("test-key").with_base_url(format!("{}/v1beta/models", server.uri()));
    let options = TransportOptions::default()
        .with_timeout(Duration::from_secs(5))
        .with_header("x-goog-user-project".to_string(), "demo".to_string());
    GeminiClient::from_config(config, &options).unwrap()
}

#[tokio::test]
async fn test_generate_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .and(query_param("key", "test-key"))
        .and(header("content-type", "application/json"))
        .and(header("x-goog-user-project", "demo"))
        .and(body_partial_json(json!({"contents": [{"parts": [{"text": "hi"}]}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "hello"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 1, "candidatesTokenCount": 1, "totalTokenCount": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = make_client(&server)
        .prompt("gemini-pro", "hi", &GenerateOptions::default())
        .await
        .unwrap();

    assert_eq!(response.text().as_deref(), Some("hello"));
    assert_eq!(response.usage_metadata.and_then(|u| u.total_token_count), Some(2));
}

#[tokio::test]
async fn test_stream_json_array_over_http() {
    let server = MockServer::start().await;
    let body = "[{\"candidates\": [{\"content\": {\"parts\": [{\"text\": \"one\"}]}}]}\n,\r\n{\"candidates\": [{\"content\": {\"parts\": [{\"text\": \"two\"}]}}]}\n]";
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:streamGenerateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .mount(&server)
        .await;

    let mut texts = Vec::new();
    let delivered = make_client(&server)
        .stream_prompt(
            "gemini-pro",
            "count",
            &GenerateOptions::default(),
            FramingMode::JsonArray,
            |event| {
                let value = event.into_value();
                texts.push(value["candidates"][0]["content"]["parts"][0]["text"].clone());
            },
        )
        .await
        .unwrap();

    assert_eq!(delivered, 2);
    assert_eq!(texts, vec![json!("one"), json!("two")]);
}

#[tokio::test]
async fn test_stream_sse_over_http() {
    let server = MockServer::start().await;
    let body = "data: {\"candidates\": [{\"content\": {\"parts\": [{\"text\": \"Hel\"}]}}]}\r\n\r\n\
                data: {\"candidates\": [{\"content\": {\"parts\": [{\"text\": \"lo\"}]}}]}\r\n\r\n";
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:streamGenerateContent"))
        .and(query_param("alt", "sse"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let mut text = String::new();
    make_client(&server)
        .stream_prompt(
            "models/gemini-pro",
            "greet",
            &GenerateOptions::default(),
            FramingMode::Sse,
            |event| {
                let response: gemstream::GenerateContentResponse = event.deserialize().unwrap();
                text.push_str(&response.text().unwrap_or_default());
            },
        )
        .await
        .unwrap();

    assert_eq!(text, "Hello");
}

#[tokio::test]
async fn test_error_envelope_maps_to_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT"
            }
        })))
        .mount(&server)
        .await;

    let err = make_client(&server)
        .count_tokens("gemini-pro", "hi", &GenerateOptions::default())
        .await
        .unwrap_err();

    match err {
        ClientError::Transport(TransportError::Api { code, message }) => {
            assert_eq!(code, 400);
            assert!(message.starts_with("API key not valid"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_plain_error_body_maps_to_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let err = make_client(&server).list_models().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Transport(TransportError::Status { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_streaming_error_status_fails_before_any_value() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"code": 429, "message": "Resource has been exhausted"}
        })))
        .mount(&server)
        .await;

    let mut calls = 0;
    let err = make_client(&server)
        .stream_prompt(
            "gemini-pro",
            "hi",
            &GenerateOptions::default(),
            FramingMode::Sse,
            |_| calls += 1,
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::Transport(TransportError::Api { code: 429, .. })
    ));
    assert_eq!(calls, 0);
}

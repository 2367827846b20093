//! Integration tests for `OpenAi` against a wiremock chat-completions endpoint.

use std::time::Duration;

use ai_client::{Agent, OpenAi, PromptBuilder};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
    })
}

fn agent(server: &MockServer) -> OpenAi {
    OpenAi::new("sk-test", "gpt-4o").with_base_url(server.uri())
}

#[tokio::test]
async fn prompt_sends_user_message_with_temperature() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-4o",
            "messages": [{ "role": "user", "content": "iPhone 16 Pro, 128GB" }],
            "temperature": 0.5
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("iPhone 16 Pro 128GB")))
        .expect(1)
        .mount(&server)
        .await;

    let text = agent(&server)
        .prompt("iPhone 16 Pro, 128GB")
        .temperature(0.5)
        .send()
        .await
        .unwrap();

    assert_eq!(text, "iPhone 16 Pro 128GB");
}

#[tokio::test]
async fn structured_output_requests_strict_schema() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "response_format": {
                "type": "json_schema",
                "json_schema": { "name": "structured_response", "strict": true }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(r#"{"price":"$999.00"}"#)))
        .expect(1)
        .mount(&server)
        .await;

    let schema = serde_json::json!({
        "type": "object",
        "properties": { "price": { "type": "string" } },
        "required": ["price"],
        "additionalProperties": false
    });
    let json = agent(&server)
        .structured_output("Extract the price.", "Page text", schema)
        .await
        .unwrap();

    assert_eq!(json, r#"{"price":"$999.00"}"#);
}

#[tokio::test]
async fn refusal_is_an_error() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "choices": [{
            "message": { "role": "assistant", "content": null, "refusal": "I can't help with that." }
        }]
    });
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let err = agent(&server)
        .structured_output("sys", "user", serde_json::json!({ "type": "object" }))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("refused"), "got: {err}");
}

#[tokio::test]
async fn api_error_carries_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let err = agent(&server).prompt("hi").send().await.unwrap_err();

    let message = err.to_string();
    assert!(message.contains("429"), "got: {message}");
    assert!(message.contains("rate limited"), "got: {message}");
}

#[tokio::test]
async fn slow_responses_time_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("late"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = agent(&server)
        .with_timeout(Duration::from_millis(200))
        .prompt("hi")
        .send()
        .await
        .unwrap_err();

    assert!(err.to_string().contains("timed out"), "got: {err}");
}

#[tokio::test]
async fn empty_choices_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
        .mount(&server)
        .await;

    let err = agent(&server).prompt("hi").send().await.unwrap_err();
    assert!(err.to_string().contains("Empty response"), "got: {err}");
}

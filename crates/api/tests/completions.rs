//! Integration tests for `/v1/models` and `/v1/chat/completions`.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, get, post_json, post_raw};
use infergate_core::readiness::NOT_READY_MESSAGE;
use serde_json::json;

fn hello() -> serde_json::Value {
    json!({ "messages": [{ "role": "user", "content": "hello" }] })
}

#[tokio::test]
async fn models_lists_the_configured_alias() {
    let app = common::ready_app();
    let response = get(&app, "/v1/models").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["object"], "list");
    assert_eq!(json["data"][0]["id"], common::TEST_MODEL_ALIAS);
    assert_eq!(json["data"][0]["object"], "model");
    assert_eq!(json["data"][0]["owned_by"], "acme");
}

#[tokio::test]
async fn completion_returns_openai_shape() {
    let app = common::ready_app();
    let response = post_json(&app, "/v1/chat/completions", hello()).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    assert!(json["id"].as_str().unwrap().starts_with("chatcmpl-"));
    assert_eq!(json["object"], "chat.completion");
    assert!(json["created"].is_i64());
    assert_eq!(json["model"], common::TEST_MODEL_ALIAS);
    assert_eq!(json["choices"][0]["index"], 0);
    assert_eq!(json["choices"][0]["message"]["role"], "assistant");
    assert_eq!(json["choices"][0]["message"]["content"], "echo: hello");
    assert_eq!(json["choices"][0]["finish_reason"], "stop");
    assert_eq!(json["usage"]["prompt_tokens"], 1);
    assert_eq!(json["usage"]["completion_tokens"], 2);
    assert_eq!(json["usage"]["total_tokens"], 3);

    assert_eq!(app.workspaces_on_disk(), 0);
}

#[tokio::test]
async fn requested_model_is_echoed() {
    let app = common::ready_app();
    let response = post_json(
        &app,
        "/v1/chat/completions",
        json!({ "model": "custom", "messages": [{ "role": "user", "content": "x" }] }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["model"], "custom");
}

#[tokio::test]
async fn token_limit_reports_length() {
    let app = common::ready_app();
    let response = post_json(
        &app,
        "/v1/chat/completions",
        json!({ "max_tokens": 1, "messages": [{ "role": "user", "content": "x" }] }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["choices"][0]["finish_reason"], "length");
}

#[tokio::test]
async fn empty_messages_is_400() {
    let app = common::ready_app();
    let response = post_json(&app, "/v1/chat/completions", json!({ "messages": [] })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["type"], "invalid_request_error");
    assert_eq!(json["error"]["message"], "No messages provided");
    assert!(app.backend.calls().is_empty());
}

#[tokio::test]
async fn out_of_range_temperature_is_400() {
    let app = common::ready_app();
    let response = post_json(
        &app,
        "/v1/chat/completions",
        json!({ "temperature": 3.5, "messages": [{ "role": "user", "content": "x" }] }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn malformed_json_is_400_envelope() {
    let app = common::ready_app();
    let response = post_raw(
        &app,
        "/v1/chat/completions",
        "application/json",
        b"{not json".to_vec(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["type"], "invalid_request_error");
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Invalid JSON"));
}

#[tokio::test]
async fn not_ready_is_503_and_runs_nothing() {
    let app = common::build_test_app(common::EchoBackend::default(), 2, Duration::from_secs(5));
    let response = post_json(&app, "/v1/chat/completions", hello()).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["error"]["type"], "service_unavailable");
    assert_eq!(json["error"]["message"], NOT_READY_MESSAGE);
    assert!(app.backend.calls().is_empty());
    assert_eq!(app.workspaces_on_disk(), 0);
}

#[tokio::test]
async fn slow_completion_is_504() {
    let app = common::build_test_app(
        common::EchoBackend::with_delay(Duration::from_millis(300)),
        2,
        Duration::from_millis(50),
    );
    app.mark_ready();

    let response = post_json(&app, "/v1/chat/completions", hello()).await;

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let json = body_json(response).await;
    assert_eq!(json["error"]["type"], "timeout_error");
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Timed out after"));
}

#[tokio::test]
async fn http_backstop_timeout_uses_error_envelope() {
    let app = common::build_test_app_with_request_timeout(
        common::EchoBackend::with_delay(Duration::from_secs(3)),
        2,
        Duration::from_secs(10),
        1,
    );
    app.mark_ready();

    let response = post_json(&app, "/v1/chat/completions", hello()).await;

    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    let json = body_json(response).await;
    assert_eq!(json["error"]["type"], "timeout_error");
    assert_eq!(json["error"]["message"], "Request timed out after 1s");
}

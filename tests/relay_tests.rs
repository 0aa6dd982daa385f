//! Relay behavior against a mock Gemini upstream.

mod common;

use common::*;
use reqwest::StatusCode;
use serde_json::{json, Value};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn conversation() -> Value {
    json!({
        "messages": [
            {"role": "assistant", "content": "Hello! I'm your AI health assistant. How can I help you today?"},
            {"role": "user", "content": "How much water should I drink?"}
        ]
    })
}

async fn post_chat(relay: &str, body: &Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}/", relay))
        .json(body)
        .send()
        .await
        .unwrap()
}

fn sse_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

#[tokio::test]
async fn test_streams_fragments_then_done() {
    let upstream = MockServer::start().await;
    stream_endpoint()
        .respond_with(sse_response(gemini_sse(&["Hel", "lo", " world"])))
        .expect(1)
        .mount(&upstream)
        .await;
    generate_endpoint()
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let relay = start_relay(&upstream, Some("test-key")).await;
    let response = post_chat(&relay, &conversation()).await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/event-stream"));
    assert_eq!(
        response.headers()["access-control-allow-origin"].to_str().unwrap(),
        "*"
    );
    assert_eq!(response.text().await.unwrap(), relay_sse(&["Hel", "lo", " world"]));
}

#[tokio::test]
async fn test_upstream_request_shape() {
    let upstream = MockServer::start().await;
    stream_endpoint()
        .respond_with(sse_response(gemini_sse(&["ok"])))
        .mount(&upstream)
        .await;

    let relay = start_relay(&upstream, Some("test-key")).await;
    post_chat(&relay, &conversation()).await.text().await.unwrap();

    let requests = upstream.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].url.query().unwrap().contains("key=test-key"));

    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["contents"][0]["role"], "model");
    assert_eq!(body["contents"][1]["role"], "user");
    assert_eq!(body["contents"][1]["parts"][0]["text"], "How much water should I drink?");
    assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
    assert!(body["systemInstruction"]["parts"][0]["text"]
        .as_str()
        .unwrap()
        .contains("health assistant"));
}

#[tokio::test]
async fn test_skips_malformed_and_empty_frames() {
    let upstream = MockServer::start().await;
    let body = format!(
        ": keep-alive\n\ndata: {{broken\n\n{}data: {}\n\n{}",
        gemini_sse(&["a"]),
        json!({"candidates": [{"finishReason": "STOP"}]}),
        gemini_sse(&["b"])
    );
    stream_endpoint()
        .respond_with(sse_response(body))
        .mount(&upstream)
        .await;

    let relay = start_relay(&upstream, Some("test-key")).await;
    let response = post_chat(&relay, &conversation()).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), relay_sse(&["a", "b"]));
}

#[tokio::test]
async fn test_empty_upstream_stream_still_terminates() {
    let upstream = MockServer::start().await;
    stream_endpoint()
        .respond_with(sse_response(String::new()))
        .mount(&upstream)
        .await;

    let relay = start_relay(&upstream, Some("test-key")).await;
    let body = post_chat(&relay, &conversation()).await.text().await.unwrap();

    assert_eq!(body, "data: [DONE]\n\n");
}

#[tokio::test]
async fn test_rate_limit_is_not_retried_and_keeps_headers() {
    let upstream = MockServer::start().await;
    stream_endpoint()
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", "17s")
                .set_body_string("Resource has been exhausted"),
        )
        .expect(1)
        .mount(&upstream)
        .await;
    generate_endpoint()
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let relay = start_relay(&upstream, Some("test-key")).await;
    let response = post_chat(&relay, &conversation()).await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Rate limits exceeded (Gemini upstream).");
    assert_eq!(body["details"], "Resource has been exhausted");
    assert_eq!(body["source"], "gemini");
    assert_eq!(body["rateHeaders"]["x-ratelimit-remaining"], "0");
    assert_eq!(body["rateHeaders"]["x-ratelimit-reset"], "17s");
    assert!(body["rateHeaders"]["x-ratelimit-limit"].is_null());
}

#[tokio::test]
async fn test_truncated_upstream_error_body_still_maps_status() {
    let upstream = start_truncating_server(
        "HTTP/1.1 429 Too Many Requests\r\nx-ratelimit-remaining: 0",
        "application/json",
        r#"{"error": {"code": 429, "mess"#.to_string(),
    )
    .await;

    let relay = start_relay_at(&upstream, Some("test-key")).await;
    let response = post_chat(&relay, &conversation()).await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Rate limits exceeded (Gemini upstream).");
    assert_eq!(body["details"], "");
    assert_eq!(body["rateHeaders"]["x-ratelimit-remaining"], "0");
}

#[tokio::test]
async fn test_forbidden_maps_to_402_without_fallback() {
    let upstream = MockServer::start().await;
    stream_endpoint()
        .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
        .expect(1)
        .mount(&upstream)
        .await;
    generate_endpoint()
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let relay = start_relay(&upstream, Some("bad-key")).await;
    let response = post_chat(&relay, &conversation()).await;

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["error"],
        "API quota exceeded or invalid API key. Please check your Gemini API configuration."
    );
    assert_eq!(body["details"], "API key not valid");
    assert!(body.get("rateHeaders").is_none());
}

#[tokio::test]
async fn test_unauthorized_maps_to_500_without_fallback() {
    let upstream = MockServer::start().await;
    stream_endpoint()
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthenticated"))
        .expect(1)
        .mount(&upstream)
        .await;
    generate_endpoint()
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let relay = start_relay(&upstream, Some("test-key")).await;
    let response = post_chat(&relay, &conversation()).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Gemini API error");
}

#[tokio::test]
async fn test_transient_failure_falls_back_once() {
    let upstream = MockServer::start().await;
    stream_endpoint()
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&upstream)
        .await;
    generate_endpoint()
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_chunk("Drink about 2 litres.")))
        .expect(1)
        .mount(&upstream)
        .await;

    let relay = start_relay(&upstream, Some("test-key")).await;
    let response = post_chat(&relay, &conversation()).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.text().await.unwrap(),
        relay_sse(&["Drink about 2 litres."])
    );

    let requests = upstream.received_requests().await.unwrap();
    let fallback = requests
        .iter()
        .find(|r| r.url.path().ends_with(":generateContent"))
        .unwrap();
    let body: Value = serde_json::from_slice(&fallback.body).unwrap();
    assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
}

#[tokio::test]
async fn test_fallback_failure_maps_to_500() {
    let upstream = MockServer::start().await;
    stream_endpoint()
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&upstream)
        .await;
    generate_endpoint()
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({"error": {"code": 500, "message": "Internal error"}})),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let relay = start_relay(&upstream, Some("test-key")).await;
    let response = post_chat(&relay, &conversation()).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Gemini API error");
    assert_eq!(body["source"], "gemini");
    assert!(body["details"].as_str().unwrap().contains("Internal error"));
}

#[tokio::test]
async fn test_fallback_quota_failure_maps_to_402() {
    let upstream = MockServer::start().await;
    stream_endpoint()
        .respond_with(ResponseTemplate::new(500))
        .mount(&upstream)
        .await;
    generate_endpoint()
        .respond_with(ResponseTemplate::new(402).set_body_string("billing"))
        .expect(1)
        .mount(&upstream)
        .await;

    let relay = start_relay(&upstream, Some("test-key")).await;
    let response = post_chat(&relay, &conversation()).await;

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn test_fallback_rate_limit_maps_to_429() {
    let upstream = MockServer::start().await;
    stream_endpoint()
        .respond_with(ResponseTemplate::new(500))
        .mount(&upstream)
        .await;
    generate_endpoint()
        .respond_with(ResponseTemplate::new(429).insert_header("x-ratelimit-limit", "60"))
        .expect(1)
        .mount(&upstream)
        .await;

    let relay = start_relay(&upstream, Some("test-key")).await;
    let response = post_chat(&relay, &conversation()).await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["rateHeaders"]["x-ratelimit-limit"], "60");
}

#[tokio::test]
async fn test_missing_api_key_fails_without_upstream_call() {
    let upstream = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let relay = start_relay(&upstream, None).await;
    let response = post_chat(&relay, &conversation()).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"error": "GEMINI_API_KEY is not configured"}));
}

#[tokio::test]
async fn test_invalid_request_bodies_are_rejected() {
    let upstream = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let relay = start_relay(&upstream, Some("test-key")).await;
    for body in [
        json!({"messages": []}),
        json!({"messages": [{"role": "system", "content": "x"}]}),
        json!({}),
    ] {
        let response = post_chat(&relay, &body).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().starts_with("Invalid chat request"));
    }
}

#[tokio::test]
async fn test_preflight_returns_cors_headers() {
    let upstream = MockServer::start().await;
    let relay = start_relay(&upstream, Some("test-key")).await;

    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, format!("{}/", relay))
        .header("origin", "http://localhost:5173")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type, apikey")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"].to_str().unwrap(), "*");
    let allowed = headers["access-control-allow-headers"]
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    for name in ["authorization", "x-client-info", "apikey", "content-type"] {
        assert!(allowed.contains(name), "missing {}", name);
    }
    assert!(response.text().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_function_path_and_health() {
    let upstream = MockServer::start().await;
    stream_endpoint()
        .respond_with(sse_response(gemini_sse(&["hi"])))
        .mount(&upstream)
        .await;

    let relay = start_relay(&upstream, Some("test-key")).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/functions/v1/health-ai-chat", relay))
        .json(&conversation())
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), relay_sse(&["hi"]));

    let health: Value = client
        .get(format!("{}/health", relay))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health, json!({"status": "ok"}));
}

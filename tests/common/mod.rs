//! Shared fixtures: a real relay on an ephemeral port in front of a mock Gemini,
//! and a raw server that hangs up mid-body.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use vitals_chat::options::{HttpTransport, ModelOptions, TransportOptions};
use vitals_chat::providers::GeminiClient;
use vitals_chat::relay::Relay;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockBuilder, MockServer};

pub const TEST_MODEL: &str = "gemini-test";

pub fn stream_endpoint() -> MockBuilder {
    Mock::given(method("POST"))
        .and(path(format!("/v1beta/models/{}:streamGenerateContent", TEST_MODEL)))
        .and(query_param("alt", "sse"))
}

pub fn generate_endpoint() -> MockBuilder {
    Mock::given(method("POST")).and(path(format!("/v1beta/models/{}:generateContent", TEST_MODEL)))
}

/// One Gemini response chunk carrying `text`.
pub fn gemini_chunk(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] }
        }]
    })
}

/// Gemini-style SSE body (CRLF framed) for the given fragments.
pub fn gemini_sse(fragments: &[&str]) -> String {
    fragments
        .iter()
        .map(|text| format!("data: {}\r\n\r\n", gemini_chunk(text)))
        .collect()
}

/// Downstream SSE body the relay should produce for the given fragments.
pub fn relay_sse(fragments: &[&str]) -> String {
    let mut body: String = fragments
        .iter()
        .map(|text| format!("data: {}\n\n", json!({"choices": [{"delta": {"content": text}}]})))
        .collect();
    body.push_str("data: [DONE]\n\n");
    body
}

/// Start a relay against `upstream` and return its base URL (no trailing slash).
pub async fn start_relay(upstream: &MockServer, api_key: Option<&str>) -> String {
    start_relay_at(&upstream.uri(), api_key).await
}

/// Start a relay against an arbitrary upstream base URL.
pub async fn start_relay_at(upstream: &str, api_key: Option<&str>) -> String {
    let mut transport = HttpTransport::default().with_base_url(upstream);
    transport.api_key = api_key.map(Into::into);

    let provider = GeminiClient::new(
        ModelOptions::health_assistant().with_model(TEST_MODEL),
        TransportOptions::new(transport),
    )
    .unwrap();
    let app = vitals_chat::server::router(Relay::new(Arc::new(provider)));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

/// Serve one connection with a raw HTTP response head and a partial body,
/// then hang up. `content-length` is set past the bytes actually sent, so the
/// client sees the body end early.
pub async fn start_truncating_server(status_line: &str, content_type: &str, partial_body: String) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let head = format!(
        "{}\r\ncontent-type: {}\r\ncontent-length: {}\r\n\r\n",
        status_line,
        content_type,
        partial_body.len() + 1000
    );

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(partial_body.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
    });

    format!("http://{}", addr)
}

/// Read one request (head and body) so the client finishes sending it.
async fn read_request(socket: &mut TcpStream) {
    let mut request = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            return;
        }
        request.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&request).to_ascii_lowercase();
        if let Some(end) = text.find("\r\n\r\n") {
            let content_length = text[..end]
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if request.len() >= end + 4 + content_length {
                return;
            }
        }
    }
}

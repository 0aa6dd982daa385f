//! Upstream provider seam.
//!
//! The relay only depends on this trait: it opens a streaming call, falls back
//! to a non-streaming call, and asks the provider to pull text out of the
//! provider-specific payloads.

use async_trait::async_trait;

use crate::error::ClientError;
use crate::model::Message;

pub mod gemini;

pub use gemini::GeminiClient;

/// A generative-AI provider the relay can forward conversations to.
///
/// The call methods return the raw HTTP response whatever its status, so the
/// relay can classify failures and echo status, headers and body.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Tag identifying this provider in error bodies (e.g. `"gemini"`).
    fn source(&self) -> &'static str;

    /// Human-readable provider name used in error messages.
    fn name(&self) -> &'static str;

    /// Streaming call. Fails without touching the network when the provider
    /// is not configured.
    async fn stream(&self, messages: &[Message]) -> Result<reqwest::Response, ClientError>;

    /// Non-streaming fallback call, with the reduced output budget.
    async fn generate(&self, messages: &[Message]) -> Result<reqwest::Response, ClientError>;

    /// Text fragment carried by one streaming frame payload.
    ///
    /// `Ok(None)` means the frame was well formed but carried no text.
    fn stream_fragment(&self, payload: &str) -> Result<Option<String>, ClientError>;

    /// Full reply text of a non-streaming response body.
    fn response_text(&self, body: &str) -> Result<String, ClientError>;

    /// Short description of a failed call for logs.
    fn describe_failure(&self, status: reqwest::StatusCode, body: &str) -> String {
        format!("HTTP {}: {}", status, body)
    }
}

//! Google Gemini upstream implementation.
//!
//! See: <https://ai.google.dev/api/rest>

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use super::Provider;
use crate::error::ClientError;
use crate::http::build_http_client;
use crate::model::{Message, Role};
use crate::options::{
    GeminiModel, HttpTransport, ModelOptions, TransportOptions, DEFAULT_API_BASE, DEFAULT_MODEL,
};

pub const SOURCE: &str = "gemini";

/// Gemini client using HTTP transport.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    model_options: ModelOptions<GeminiModel>,
    transport_options: TransportOptions<HttpTransport>,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(
        model_options: ModelOptions<GeminiModel>,
        transport_options: TransportOptions<HttpTransport>,
    ) -> Result<Self, ClientError> {
        let http = build_http_client(&transport_options)?;
        Ok(Self {
            model_options,
            transport_options,
            http,
        })
    }

    pub fn model(&self) -> &str {
        self.model_options.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    fn url(&self, stream: bool) -> Result<String, ClientError> {
        let api_key = self
            .transport_options
            .provider
            .api_key
            .as_ref()
            .ok_or_else(|| ClientError::Config("GEMINI_API_KEY is not configured".to_string()))?;

        let api_base = self
            .transport_options
            .provider
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/');

        // alt=sse switches the streaming endpoint from a JSON array to SSE frames
        let method = if stream {
            "streamGenerateContent?alt=sse&"
        } else {
            "generateContent?"
        };

        Ok(format!(
            "{}/v1beta/models/{}:{}key={}",
            api_base,
            self.model(),
            method,
            api_key.expose_secret()
        ))
    }

    async fn post(&self, stream: bool, messages: &[Message]) -> Result<reqwest::Response, ClientError> {
        let url = self.url(stream)?;

        let max_tokens = if stream {
            self.model_options.max_tokens
        } else {
            self.model_options
                .provider
                .fallback_max_tokens
                .or(self.model_options.max_tokens)
        };
        let request_body = GeminiRequest::new(messages, &self.model_options, max_tokens);

        tracing::info!(model = self.model(), stream, "Calling Gemini");

        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(&request_body)
            .send()
            .await?;
        tracing::info!(
            status = %response.status(),
            headers = ?response.headers(),
            stream,
            "Gemini responded"
        );
        Ok(response)
    }
}

#[async_trait]
impl Provider for GeminiClient {
    fn source(&self) -> &'static str {
        SOURCE
    }

    fn name(&self) -> &'static str {
        "Gemini"
    }

    async fn stream(&self, messages: &[Message]) -> Result<reqwest::Response, ClientError> {
        self.post(true, messages).await
    }

    async fn generate(&self, messages: &[Message]) -> Result<reqwest::Response, ClientError> {
        self.post(false, messages).await
    }

    fn stream_fragment(&self, payload: &str) -> Result<Option<String>, ClientError> {
        let chunk: GeminiResponse = serde_json::from_str(payload)?;
        if let Some(reason) = chunk.finish_reason() {
            tracing::debug!(finish_reason = reason, "Gemini stream finished");
        }
        Ok(chunk.first_text().map(str::to_string))
    }

    fn response_text(&self, body: &str) -> Result<String, ClientError> {
        let response: GeminiResponse = serde_json::from_str(body)?;
        Ok(response.first_text().unwrap_or_default().to_string())
    }

    fn describe_failure(&self, status: reqwest::StatusCode, body: &str) -> String {
        describe_error(status, body)
    }
}

/// Short description of a Gemini error body for logs.
pub fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<GeminiErrorResponse>(body) {
        Ok(error_resp) => format!(
            "Gemini error ({}): {}",
            error_resp.error.code, error_resp.error.message
        ),
        Err(_) => format!("HTTP {}: {}", status, body),
    }
}

// --- Gemini API Request/Response Types ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
}

impl GeminiRequest {
    fn new(
        messages: &[Message],
        model_options: &ModelOptions<GeminiModel>,
        max_output_tokens: Option<u32>,
    ) -> Self {
        let contents = messages
            .iter()
            .map(|msg| GeminiContent {
                role: Some(msg.role.into()),
                parts: vec![GeminiPart::text(msg.content.clone())],
            })
            .collect();

        let system_instruction = model_options.instructions.as_ref().map(|s| GeminiContent {
            role: None,
            parts: vec![GeminiPart::text(s.clone())],
        });

        GeminiRequest {
            contents,
            generation_config: GeminiGenerationConfig {
                temperature: model_options.temperature,
                max_output_tokens,
            },
            system_instruction,
        }
    }
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum GeminiRole {
    User,
    Model,
}

impl From<Role> for GeminiRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => GeminiRole::User,
            Role::Assistant => GeminiRole::Model,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<GeminiRole>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

impl GeminiPart {
    fn text(text: String) -> Self {
        Self { text: Some(text) }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

/// One streaming frame, or the whole non-streaming document.
///
/// Every level is optional: frames carrying only usage metadata or a finish
/// reason are valid and simply have no text.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiResponseContent {
    parts: Option<Vec<GeminiPart>>,
}

impl GeminiResponse {
    fn first_candidate(&self) -> Option<&GeminiCandidate> {
        self.candidates.as_ref()?.first()
    }

    /// `candidates[0].content.parts[0].text`
    fn first_text(&self) -> Option<&str> {
        self.first_candidate()?
            .content
            .as_ref()?
            .parts
            .as_ref()?
            .first()?
            .text
            .as_deref()
    }

    fn finish_reason(&self) -> Option<&str> {
        self.first_candidate()?.finish_reason.as_deref()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiError {
    code: u32,
    message: String,
}

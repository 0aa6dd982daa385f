//! Wire-level data models shared by the relay and the chat client.

use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};

/// Role of the message sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

/// Body of a chat request sent to the relay.
///
/// The full conversation is sent on every turn; an empty `messages` array is
/// rejected at deserialization time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: NonEmpty<Message>,
}

impl ChatRequest {
    pub fn new(messages: NonEmpty<Message>) -> Self {
        Self { messages }
    }

    /// Build a request from a transcript, returning `None` when it is empty.
    pub fn from_transcript(transcript: &[Message]) -> Option<Self> {
        NonEmpty::from_slice(transcript).map(Self::new)
    }
}

/// Upstream rate-limit headers echoed back to the client.
///
/// Absent headers serialize as JSON `null`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateHeaders {
    #[serde(rename = "x-ratelimit-limit", default)]
    pub limit: Option<String>,
    #[serde(rename = "x-ratelimit-remaining", default)]
    pub remaining: Option<String>,
    #[serde(rename = "x-ratelimit-reset", default)]
    pub reset: Option<String>,
}

/// JSON body of every non-success relay response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_headers: Option<RateHeaders>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_rate_headers(mut self, headers: RateHeaders) -> Self {
        self.rate_headers = Some(headers);
        self
    }

    /// Details for display: `details` when present and non-empty, else `error`.
    pub fn display_details(&self) -> Option<&str> {
        self.details
            .as_deref()
            .filter(|d| !d.is_empty())
            .or_else(|| self.error.as_deref().filter(|e| !e.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_wire_names() {
        let msg = Message::assistant("hi");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"role": "assistant", "content": "hi"})
        );
    }

    #[test]
    fn test_unknown_role_rejected() {
        let result = serde_json::from_value::<Message>(json!({"role": "system", "content": "x"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_conversation_rejected() {
        let result = serde_json::from_str::<ChatRequest>(r#"{"messages": []}"#);
        assert!(result.is_err());

        let request: ChatRequest =
            serde_json::from_str(r#"{"messages": [{"role": "user", "content": "hello"}]}"#).unwrap();
        assert_eq!(request.messages.head, Message::user("hello"));
    }

    #[test]
    fn test_rate_headers_serialize_null_when_absent() {
        let headers = RateHeaders {
            remaining: Some("0".to_string()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&headers).unwrap(),
            json!({
                "x-ratelimit-limit": null,
                "x-ratelimit-remaining": "0",
                "x-ratelimit-reset": null,
            })
        );
    }

    #[test]
    fn test_error_body_shape() {
        let body = ErrorBody::new("Gemini API error")
            .with_details("boom")
            .with_source("gemini");
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"error": "Gemini API error", "details": "boom", "source": "gemini"})
        );
    }

    #[test]
    fn test_display_details_falls_back_to_error() {
        let body: ErrorBody = serde_json::from_str(r#"{"error": "only error"}"#).unwrap();
        assert_eq!(body.display_details(), Some("only error"));

        let body: ErrorBody = serde_json::from_str(r#"{"error": "e", "details": "d"}"#).unwrap();
        assert_eq!(body.display_details(), Some("d"));

        assert_eq!(ErrorBody::default().display_details(), None);
    }
}

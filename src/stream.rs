//! Downstream streaming contract between the relay and the chat client.
//!
//! Every frame on the wire is `data: <json>\n\n` where `<json>` is a
//! [`DeltaChunk`], and the stream ends with exactly one `data: [DONE]\n\n`.

use serde::{Deserialize, Serialize};

use crate::sse::DONE_MARKER;

/// A normalized incremental unit sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownstreamEvent {
    /// A fragment of assistant text.
    Delta(String),
    /// End-of-stream marker, always last.
    Done,
}

impl DownstreamEvent {
    /// The `data:` payload of this event.
    pub fn payload(&self) -> String {
        match self {
            Self::Delta(content) => DeltaChunk::text(content.clone()).to_json(),
            Self::Done => DONE_MARKER.to_string(),
        }
    }

    /// The complete SSE frame of this event, including the blank-line terminator.
    pub fn to_frame(&self) -> String {
        format!("data: {}\n\n", self.payload())
    }
}

/// `{"choices":[{"delta":{"content": "..."}}]}`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeltaChunk {
    #[serde(default)]
    pub choices: Vec<DeltaChoice>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeltaChoice {
    #[serde(default)]
    pub delta: Delta,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Delta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl DeltaChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            choices: vec![DeltaChoice {
                delta: Delta {
                    content: Some(content.into()),
                },
            }],
        }
    }

    /// Content of the first choice, if any.
    pub fn content(&self) -> Option<&str> {
        self.choices.first()?.delta.content.as_deref()
    }

    pub fn to_json(&self) -> String {
        // A struct of strings and vectors always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}

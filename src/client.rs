//! Chat client session.
//!
//! A [`ChatSession`] owns the transcript of one conversation. Each turn posts
//! the whole transcript to the relay, retries rate-limited responses, and
//! folds the streamed reply into the transcript as fragments arrive.
//!
//! # Example
//! ```no_run
//! use vitals_chat::client::{ChatSession, SendOutcome};
//! use vitals_chat::options::ClientConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = ChatSession::new(ClientConfig::from_env()?)?;
//!
//!     if let SendOutcome::Failed(notice) = session.send_message("How much water should I drink?").await {
//!         eprintln!("{}: {}", notice.title, notice.description);
//!     }
//!
//!     for message in session.transcript().await {
//!         println!("{:?}: {}", message.role, message.content);
//!     }
//!     Ok(())
//! }
//! ```

use futures::StreamExt;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::ClientError;
use crate::model::{ChatRequest, ErrorBody, Message};
use crate::options::ClientConfig;
use crate::providers::gemini;
use crate::retry::send_with_retry;
use crate::sse::{is_done_marker, SseResponseExt};
use crate::stream::DeltaChunk;
use crate::transcript::coalesce;

const DETAILS_PREVIEW_CHARS: usize = 180;

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn error(description: impl Into<String>) -> Self {
        Self {
            title: "Error".to_string(),
            description: description.into(),
        }
    }
}

/// Receives session state changes; the seam a UI hangs off.
///
/// All methods default to no-ops.
pub trait TranscriptListener: Send + Sync {
    fn transcript_changed(&self, _transcript: &[Message]) {}

    fn loading_changed(&self, _loading: bool) {}

    fn notify(&self, _notice: &Notice) {}
}

/// Listener that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl TranscriptListener for NoopListener {}

/// Result of one [`ChatSession::send_message`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input, or a request was already in flight. Nothing was sent.
    Skipped,
    /// The reply streamed to completion.
    Completed,
    /// The turn failed; the notice was also delivered to the listener.
    Failed(Notice),
}

pub struct ChatSession {
    http: reqwest::Client,
    config: ClientConfig,
    transcript: Mutex<Vec<Message>>,
    in_flight: AtomicBool,
    listener: Arc<dyn TranscriptListener>,
}

impl ChatSession {
    /// Start a session; the transcript opens with the configured greeting.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let transcript: Vec<Message> = config
            .greeting
            .iter()
            .map(|greeting| Message::assistant(greeting.as_str()))
            .collect();

        Ok(Self {
            http: reqwest::Client::builder().build()?,
            config,
            transcript: Mutex::new(transcript),
            in_flight: AtomicBool::new(false),
            listener: Arc::new(NoopListener),
        })
    }

    pub fn with_listener(mut self, listener: Arc<dyn TranscriptListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Snapshot of the conversation so far.
    pub async fn transcript(&self) -> Vec<Message> {
        self.transcript.lock().await.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Send one user turn and stream the reply into the transcript.
    ///
    /// Failures never roll the transcript back: the user message and any
    /// partial reply stay in place.
    pub async fn send_message(&self, input: &str) -> SendOutcome {
        if input.trim().is_empty() {
            return SendOutcome::Skipped;
        }
        let Some(_loading) = LoadingGuard::acquire(self) else {
            tracing::debug!("request already in flight, ignoring input");
            return SendOutcome::Skipped;
        };

        match self.exchange(input).await {
            Ok(()) => SendOutcome::Completed,
            Err(notice) => {
                tracing::warn!(description = %notice.description, "chat turn failed");
                self.listener.notify(&notice);
                SendOutcome::Failed(notice)
            }
        }
    }

    async fn exchange(&self, input: &str) -> Result<(), Notice> {
        let messages = {
            let mut transcript = self.transcript.lock().await;
            transcript.push(Message::user(input));
            self.listener.transcript_changed(&transcript);
            transcript.clone()
        };
        let request = ChatRequest::from_transcript(&messages)
            .ok_or_else(|| Notice::error("Nothing to send"))?;

        let response = send_with_retry(&self.config.retry, || {
            let builder = self.http.post(&self.config.endpoint).json(&request);
            async move { builder.send().await.map_err(ClientError::from) }
        })
        .await
        .map_err(|e| Notice::error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        self.consume(response).await
    }

    async fn consume(&self, response: reqwest::Response) -> Result<(), Notice> {
        let mut payloads = Box::pin(response.sse());

        while let Some(item) = payloads.next().await {
            let payload = item.map_err(|e| Notice::error(e.to_string()))?;
            if is_done_marker(&payload) {
                break;
            }

            let chunk: DeltaChunk = match serde_json::from_str(&payload) {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::debug!("Ignoring unparseable frame: {}", e);
                    continue;
                }
            };

            if let Some(text) = chunk.content().filter(|t| !t.is_empty()) {
                let mut transcript = self.transcript.lock().await;
                let current = std::mem::take(&mut *transcript);
                *transcript = coalesce(current, text);
                self.listener.transcript_changed(&transcript);
            }
        }

        Ok(())
    }
}

/// Holds the in-flight flag for the duration of one turn and clears it, with
/// the loading indicator, on every exit path.
struct LoadingGuard<'a> {
    session: &'a ChatSession,
}

impl<'a> LoadingGuard<'a> {
    fn acquire(session: &'a ChatSession) -> Option<Self> {
        session
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        session.listener.loading_changed(true);
        Some(Self { session })
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.session.in_flight.store(false, Ordering::Release);
        self.session.listener.loading_changed(false);
    }
}

/// Turn a non-success relay response into a user-facing notice.
pub fn classify_failure(status: StatusCode, body: &str) -> Notice {
    let error: ErrorBody = serde_json::from_str(body).unwrap_or_else(|e| {
        tracing::warn!("Failed to parse relay error body: {}", e);
        ErrorBody::default()
    });
    tracing::warn!(
        status = %status,
        source = ?error.source,
        rate_headers = ?error.rate_headers,
        "relay error response"
    );
    let details = error.display_details().unwrap_or_default();

    let description = match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let summary = if error.source.as_deref() == Some(gemini::SOURCE) {
                let headers = error.rate_headers.clone().unwrap_or_default();
                format!(
                    "Gemini rate limit. Remaining: {}. Reset: {}",
                    headers.remaining.as_deref().unwrap_or("?"),
                    headers.reset.as_deref().unwrap_or("?"),
                )
            } else {
                "Relay rate limit. Try again shortly.".to_string()
            };
            if details.is_empty() {
                summary
            } else {
                let preview: String = details.chars().take(DETAILS_PREVIEW_CHARS).collect();
                format!("{} ({})", summary, preview)
            }
        }
        StatusCode::PAYMENT_REQUIRED => {
            "API quota/credentials issue. Please check your AI key.".to_string()
        }
        StatusCode::FORBIDDEN => {
            "Forbidden. Check the relay's authorization configuration.".to_string()
        }
        _ if details.is_empty() => "Failed to get response".to_string(),
        _ => details.to_string(),
    };

    Notice::error(description)
}

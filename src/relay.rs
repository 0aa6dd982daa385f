//! Chat relay orchestration.
//!
//! A request walks an explicit decision tree:
//!
//! ```text
//! Streaming ─┬─ Success ───────────────────────────► live transform
//!            ├─ AuthFailure (401/403) ─────────────► error mapping
//!            ├─ RateLimited (429) ─────────────────► error mapping
//!            └─ OtherFailure ─► Fallback ─┬─ Success ► one delta + [DONE]
//!                                         └─ Failure ► error mapping
//! ```
//!
//! Error mapping is total over upstream statuses: 429 stays 429, 402/403
//! become 402, anything else becomes 500.

use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::StatusCode;
use std::sync::Arc;

use crate::error::ClientError;
use crate::http::rate_headers;
use crate::model::{ErrorBody, Message, RateHeaders};
use crate::providers::Provider;
use crate::sse::{is_done_marker, SseResponseExt};
use crate::stream::DownstreamEvent;

/// A failed upstream call, with everything needed to build the error body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamFailure {
    pub status: StatusCode,
    pub body: String,
    pub rate_headers: RateHeaders,
}

impl UpstreamFailure {
    /// Consume a non-success response.
    pub async fn read(response: reqwest::Response) -> Self {
        let status = response.status();
        let rate_headers = rate_headers(response.headers());
        let body = response.text().await.unwrap_or_else(|e| {
            tracing::warn!(status = %status, "Failed to read upstream error body: {}", e);
            String::new()
        });
        Self {
            status,
            body,
            rate_headers,
        }
    }
}

/// Result of the streaming upstream call.
#[derive(Debug)]
pub enum StreamAttempt {
    Success(reqwest::Response),
    AuthFailure(UpstreamFailure),
    RateLimited(UpstreamFailure),
    OtherFailure(UpstreamFailure),
}

impl StreamAttempt {
    pub async fn classify(response: reqwest::Response) -> Self {
        let status = response.status();
        if status.is_success() {
            return Self::Success(response);
        }

        let failure = UpstreamFailure::read(response).await;
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::AuthFailure(failure),
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited(failure),
            _ => Self::OtherFailure(failure),
        }
    }
}

/// Result of the non-streaming fallback call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackAttempt {
    Success(String),
    Failure(UpstreamFailure),
}

/// Terminal state of the decision tree.
#[derive(Debug)]
pub enum RelayOutcome {
    /// Streaming call succeeded; its body still has to be translated.
    Stream(reqwest::Response),
    /// Fallback call succeeded with the full reply text.
    Fallback(String),
    /// Both paths are exhausted.
    Failed(UpstreamFailure),
}

/// A relay error response: status plus JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ErrorResponse {
    /// Request-level failure that never reached a classifiable upstream status.
    pub fn internal(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorBody::new(error),
        }
    }

    /// Map an upstream failure to the downstream status set.
    pub fn from_upstream(failure: &UpstreamFailure, name: &str, source: &str) -> Self {
        match failure.status {
            StatusCode::TOO_MANY_REQUESTS => Self {
                status: StatusCode::TOO_MANY_REQUESTS,
                body: ErrorBody::new(format!("Rate limits exceeded ({} upstream).", name))
                    .with_details(failure.body.clone())
                    .with_rate_headers(failure.rate_headers.clone())
                    .with_source(source),
            },
            StatusCode::PAYMENT_REQUIRED | StatusCode::FORBIDDEN => Self {
                status: StatusCode::PAYMENT_REQUIRED,
                body: ErrorBody::new(format!(
                    "API quota exceeded or invalid API key. Please check your {} API configuration.",
                    name
                ))
                .with_details(failure.body.clone())
                .with_source(source),
            },
            _ => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: ErrorBody::new(format!("{} API error", name))
                    .with_details(failure.body.clone())
                    .with_source(source),
            },
        }
    }
}

/// What the HTTP layer sends back for one chat request.
pub enum RelayReply {
    /// `200 text/event-stream`, ending with exactly one [`DownstreamEvent::Done`].
    Events(BoxStream<'static, DownstreamEvent>),
    Error(ErrorResponse),
}

impl std::fmt::Debug for RelayReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Events(_) => f.write_str("RelayReply::Events(..)"),
            Self::Error(e) => f.debug_tuple("RelayReply::Error").field(e).finish(),
        }
    }
}

/// Stateless relay in front of one upstream provider.
#[derive(Clone)]
pub struct Relay {
    provider: Arc<dyn Provider>,
}

impl Relay {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    /// Handle one conversation end to end.
    pub async fn reply(&self, messages: &[Message]) -> RelayReply {
        match self.orchestrate(messages).await {
            Ok(RelayOutcome::Stream(response)) => {
                RelayReply::Events(translate(response.sse(), self.provider.clone()).boxed())
            }
            Ok(RelayOutcome::Fallback(text)) => RelayReply::Events(
                stream::iter([DownstreamEvent::Delta(text), DownstreamEvent::Done]).boxed(),
            ),
            Ok(RelayOutcome::Failed(failure)) => {
                tracing::error!(
                    status = %failure.status,
                    rate_headers = ?failure.rate_headers,
                    "{} API error: {}",
                    self.provider.name(),
                    self.provider.describe_failure(failure.status, &failure.body)
                );
                RelayReply::Error(ErrorResponse::from_upstream(
                    &failure,
                    self.provider.name(),
                    self.provider.source(),
                ))
            }
            Err(e) => {
                tracing::error!("Chat error: {}", e);
                RelayReply::Error(ErrorResponse::internal(e.to_string()))
            }
        }
    }

    /// Walk the streaming/fallback decision tree.
    pub async fn orchestrate(&self, messages: &[Message]) -> Result<RelayOutcome, ClientError> {
        let response = self.provider.stream(messages).await?;

        match StreamAttempt::classify(response).await {
            StreamAttempt::Success(response) => Ok(RelayOutcome::Stream(response)),
            StreamAttempt::AuthFailure(failure) | StreamAttempt::RateLimited(failure) => {
                Ok(RelayOutcome::Failed(failure))
            }
            StreamAttempt::OtherFailure(failure) => {
                tracing::warn!(
                    status = %failure.status,
                    "Streaming call failed, falling back to non-streaming call"
                );
                match self.fallback(messages).await? {
                    FallbackAttempt::Success(text) => Ok(RelayOutcome::Fallback(text)),
                    FallbackAttempt::Failure(failure) => Ok(RelayOutcome::Failed(failure)),
                }
            }
        }
    }

    async fn fallback(&self, messages: &[Message]) -> Result<FallbackAttempt, ClientError> {
        let response = self.provider.generate(messages).await?;
        if !response.status().is_success() {
            return Ok(FallbackAttempt::Failure(UpstreamFailure::read(response).await));
        }

        let body = response.text().await?;
        let text = self.provider.response_text(&body)?;
        Ok(FallbackAttempt::Success(text))
    }
}

/// Translate upstream SSE payloads into downstream events as they arrive.
///
/// Malformed or text-less frames are skipped; an upstream read error ends the
/// translation early. The last event is always [`DownstreamEvent::Done`].
pub fn translate<S>(
    payloads: S,
    provider: Arc<dyn Provider>,
) -> impl Stream<Item = DownstreamEvent> + Send
where
    S: Stream<Item = Result<String, ClientError>> + Send + 'static,
{
    async_stream::stream! {
        let mut payloads = Box::pin(payloads);

        while let Some(item) = payloads.next().await {
            let payload = match item {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!("Upstream stream interrupted: {}", e);
                    break;
                }
            };

            if is_done_marker(&payload) {
                continue;
            }

            match provider.stream_fragment(&payload) {
                Ok(Some(text)) if !text.is_empty() => {
                    tracing::debug!(content = %text, "Extracted content");
                    yield DownstreamEvent::Delta(text);
                }
                Ok(_) => tracing::debug!("No text content found in chunk"),
                Err(e) => tracing::warn!("Skipping malformed upstream frame: {} (payload: {})", e, payload),
            }
        }

        yield DownstreamEvent::Done;
    }
}

//! # vitals-chat - streaming health-assistant chat relay and client
//!
//! A small relay that forwards a conversation to Gemini and re-emits the reply
//! as a stable server-sent event stream, plus the client session that talks to
//! it.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Streaming upstream call with a one-shot non-streaming fallback
//! - Chunk-boundary-safe SSE parsing shared by both sides
//! - Small, stable error status set (429 / 402 / 500) with rate-limit context
//! - Client retry on 429 and incremental transcript reconstruction
//!
//! ## Architecture
//!
//! ```text
//! ChatSession ──POST {messages}──► relay (axum) ──► Provider (Gemini)
//!      ▲                               │
//!      └──── data: {"choices":[{"delta":{"content":..}}]} ... data: [DONE]
//! ```
//!
//! - **`Provider`**: the upstream seam; [`providers::GeminiClient`] implements it.
//! - **`Relay`**: stateless decision tree (stream, fallback, error mapping).
//! - **`ChatSession`**: guarded send, retry, classification, coalescing.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use vitals_chat::options::RelayConfig;
//! use vitals_chat::providers::GeminiClient;
//! use vitals_chat::relay::Relay;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RelayConfig::from_env()?;
//!     let provider = GeminiClient::new(config.model_options, config.transport_options)?;
//!     let app = vitals_chat::server::router(Relay::new(Arc::new(provider)));
//!
//!     let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod http;
pub mod model;
pub mod options;
pub mod providers;
pub mod relay;
pub mod retry;
pub mod server;
pub mod sse;
pub mod stream;
pub mod transcript;

pub use client::{ChatSession, Notice, SendOutcome, TranscriptListener};
pub use error::ClientError;
pub use model::{ChatRequest, ErrorBody, Message, RateHeaders, Role};
pub use options::{ClientConfig, RelayConfig};
pub use providers::{GeminiClient, Provider};
pub use relay::{Relay, RelayReply};
pub use retry::RetryPolicy;
pub use stream::{DeltaChunk, DownstreamEvent};

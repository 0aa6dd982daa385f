//! HTTP surface of the relay.
//!
//! Routes:
//! - `POST /` and `POST /functions/v1/health-ai-chat`: chat relay
//! - `GET /health`: liveness
//!
//! Every route answers `OPTIONS` with an empty `200` carrying the CORS headers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, Method,
    },
    response::{
        sse::{Event, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use futures::StreamExt;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::error::ClientError;
use crate::model::{ChatRequest, Message};
use crate::options::RelayConfig;
use crate::providers::GeminiClient;
use crate::relay::{ErrorResponse, Relay, RelayReply};

pub const CHAT_PATH: &str = "/functions/v1/health-ai-chat";

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// CORS policy: any origin, and the headers browser clients send.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::GET, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            CONTENT_TYPE,
        ])
}

pub fn router(relay: Relay) -> Router {
    Router::new()
        .route("/", post(handle_chat))
        .route(CHAT_PATH, post(handle_chat))
        .route("/health", get(handle_health))
        .layer(cors_layer())
        .with_state(relay)
}

/// Bind and serve the relay until Ctrl-C.
pub async fn serve(config: RelayConfig) -> Result<(), ClientError> {
    let provider = GeminiClient::new(config.model_options, config.transport_options)?;
    tracing::info!(model = provider.model(), "Using Gemini model");

    let app = router(Relay::new(Arc::new(provider)));

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Relay listening on {}", listener.local_addr()?);
    tracing::info!("  POST /");
    tracing::info!("  POST {}", CHAT_PATH);
    tracing::info!("  GET /health");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Relay shutting down gracefully");
        })
        .await?;

    tracing::info!("Relay stopped");
    Ok(())
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn handle_chat(State(relay): State<Relay>, body: Bytes) -> Response {
    let request: ChatRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("Rejecting chat request: {}", e);
            return ErrorResponse::internal(format!("Invalid chat request: {}", e)).into_response();
        }
    };

    let messages: Vec<Message> = request.messages.into();
    tracing::info!(messages = messages.len(), "Relaying conversation");

    match relay.reply(&messages).await {
        RelayReply::Events(events) => {
            Sse::new(events.map(|event| Ok::<_, Infallible>(Event::default().data(event.payload()))))
                .into_response()
        }
        RelayReply::Error(error) => error.into_response(),
    }
}

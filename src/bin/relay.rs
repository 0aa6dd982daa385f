//! Relay server binary.
//!
//! Configuration comes from the environment (`GEMINI_API_KEY`, `GEMINI_MODEL`,
//! `RELAY_ADDR`, ...); logging is controlled with `RUST_LOG`.

use tracing_subscriber::EnvFilter;

use vitals_chat::options::RelayConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vitals_chat=info,relay=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = RelayConfig::from_env()?;
    if config.transport_options.provider.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; chat requests will fail with 500");
    }

    vitals_chat::server::serve(config).await?;
    Ok(())
}

//! Options and configuration for the relay and the chat client.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ClientError;
use crate::retry::RetryPolicy;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_RELAY_ADDR: &str = "0.0.0.0:8787";
pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:8787/";

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_FALLBACK_MAX_TOKENS: u32 = 1024;

pub const HEALTH_ASSISTANT_INSTRUCTIONS: &str = "You are a helpful AI health assistant. \
Provide clear, concise health advice while emphasizing that users should consult healthcare \
professionals for serious concerns. Keep responses friendly and supportive.";

pub const DEFAULT_GREETING: &str = "Hello! I'm your AI health assistant. How can I help you today?";

/// A secret string type for sensitive data like API keys.
/// Prevents accidental logging or display of secrets.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: String) -> Self {
        Self(s)
    }

    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Generic model options containing common generation parameters
/// and provider-specific model configuration.
///
/// `max_tokens` is the budget of the streaming call. Providers that fall back
/// to a non-streaming call carry their own fallback budget in `provider`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOptions<T> {
    /// Model identifier (e.g., "gemini-2.0-flash-exp")
    pub model: Option<String>,

    /// System instructions passed to the model
    pub instructions: Option<String>,

    /// Temperature for sampling (0.0 - 2.0)
    pub temperature: Option<f32>,

    /// Maximum tokens to generate on the streaming path
    pub max_tokens: Option<u32>,

    /// Provider-specific model options
    pub provider: T,
}

impl<T> ModelOptions<T> {
    pub fn new(provider: T) -> Self {
        Self {
            model: None,
            instructions: None,
            temperature: None,
            max_tokens: None,
            provider,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Gemini-specific model options.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeminiModel {
    /// Output budget of the non-streaming fallback call.
    pub fallback_max_tokens: Option<u32>,
}

impl ModelOptions<GeminiModel> {
    /// Options used by the health relay: default model, persona, and budgets.
    pub fn health_assistant() -> Self {
        Self::new(GeminiModel {
            fallback_max_tokens: Some(DEFAULT_FALLBACK_MAX_TOKENS),
        })
        .with_model(DEFAULT_MODEL)
        .with_instructions(HEALTH_ASSISTANT_INSTRUCTIONS)
        .with_temperature(DEFAULT_TEMPERATURE)
        .with_max_tokens(DEFAULT_MAX_TOKENS)
    }

    pub fn with_fallback_max_tokens(mut self, max_tokens: u32) -> Self {
        self.provider.fallback_max_tokens = Some(max_tokens);
        self
    }
}

/// Generic transport options.
#[derive(Debug, Clone)]
pub struct TransportOptions<T> {
    /// Request timeout (applies to all transports)
    pub timeout: Option<Duration>,

    /// Provider-specific transport options
    pub provider: T,
}

impl<T> TransportOptions<T> {
    pub fn new(provider: T) -> Self {
        Self {
            timeout: None,
            provider,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// HTTP-specific transport options.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    /// API key for authentication
    pub api_key: Option<SecretString>,

    /// Base URL for API endpoints
    pub base_url: Option<String>,
}

impl HttpTransport {
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// Relay server configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
    pub model_options: ModelOptions<GeminiModel>,
    pub transport_options: TransportOptions<HttpTransport>,
}

impl RelayConfig {
    /// Load configuration from the process environment.
    ///
    /// A missing `GEMINI_API_KEY` is not an error here; every chat request
    /// fails with a configuration error until it is set.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = var("RELAY_ADDR")
            .unwrap_or_else(|| DEFAULT_RELAY_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ClientError::Config(format!("Invalid RELAY_ADDR: {}", e)))?;

        let mut model_options = ModelOptions::health_assistant();
        if let Some(model) = var("GEMINI_MODEL") {
            model_options = model_options.with_model(model);
        }
        if let Some(max_tokens) = var("RELAY_MAX_OUTPUT_TOKENS") {
            model_options = model_options.with_max_tokens(parse_number(
                "RELAY_MAX_OUTPUT_TOKENS",
                &max_tokens,
            )?);
        }
        if let Some(max_tokens) = var("RELAY_FALLBACK_MAX_OUTPUT_TOKENS") {
            model_options = model_options.with_fallback_max_tokens(parse_number(
                "RELAY_FALLBACK_MAX_OUTPUT_TOKENS",
                &max_tokens,
            )?);
        }

        let mut transport = HttpTransport {
            api_key: var("GEMINI_API_KEY").map(SecretString::new),
            ..Default::default()
        };
        if let Some(base_url) = var("GEMINI_API_BASE") {
            transport = transport.with_base_url(base_url);
        }

        let mut transport_options = TransportOptions::new(transport);
        if let Some(secs) = var("RELAY_UPSTREAM_TIMEOUT_SECS") {
            transport_options = transport_options.with_timeout(Duration::from_secs(parse_number(
                "RELAY_UPSTREAM_TIMEOUT_SECS",
                &secs,
            )?));
        }

        Ok(Self {
            bind_addr,
            model_options,
            transport_options,
        })
    }
}

/// Chat client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Relay chat endpoint
    pub endpoint: String,

    /// Retry behavior for rate-limited responses
    pub retry: RetryPolicy,

    /// Assistant message a new session starts with
    pub greeting: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_RELAY_URL.to_string(),
            retry: RetryPolicy::default(),
            greeting: Some(DEFAULT_GREETING.to_string()),
        }
    }
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn without_greeting(mut self) -> Self {
        self.greeting = None;
        self
    }

    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Self::new(var("CHAT_RELAY_URL").unwrap_or_else(|| DEFAULT_RELAY_URL.to_string()));
        if let Some(retries) = var("CHAT_MAX_RETRIES") {
            config.retry.max_retries = parse_number("CHAT_MAX_RETRIES", &retries)?;
        }
        if let Some(delay) = var("CHAT_RETRY_DELAY_MS") {
            config.retry.delay_ms = parse_number("CHAT_RETRY_DELAY_MS", &delay)?;
        }
        Ok(config)
    }
}

fn parse_number<N: std::str::FromStr>(key: &str, value: &str) -> Result<N, ClientError>
where
    N::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<N>()
        .map_err(|e| ClientError::Config(format!("Invalid {}: {}", key, e)))
}

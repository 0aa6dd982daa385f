//! Retry policy for rate-limited relay responses.
//!
//! The chat client retries only on `429 Too Many Requests`, with a fixed delay
//! between attempts. Once the budget is spent the last response is handed back
//! unchanged so the caller can classify it.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::error::ClientError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not including the initial attempt)
    pub max_retries: u32,

    /// Delay before each retry (milliseconds)
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay_ms: 1200,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            delay_ms: delay.as_millis() as u64,
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Total number of requests the policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    pub fn should_retry(&self, status: StatusCode, attempt: u32) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS && attempt < self.max_retries
    }
}

/// Run `send` until it yields a response that is not rate limited or the
/// retry budget is exhausted.
///
/// Transport errors are returned immediately and are not retried.
pub async fn send_with_retry<F, Fut>(
    policy: &RetryPolicy,
    mut send: F,
) -> Result<reqwest::Response, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, ClientError>>,
{
    let mut attempt = 0;
    loop {
        let response = send().await?;
        if !policy.should_retry(response.status(), attempt) {
            return Ok(response);
        }

        attempt += 1;
        tracing::warn!(
            attempt,
            max_attempts = policy.max_attempts(),
            delay_ms = policy.delay_ms,
            "relay rate limited, backing off before retry"
        );
        tokio::time::sleep(policy.delay()).await;
    }
}

//! HTTP client utilities for calls to the upstream provider.

use reqwest::header::HeaderMap;
use reqwest::Client;

use crate::model::RateHeaders;
use crate::options::{HttpTransport, TransportOptions};

/// Build a configured HTTP client from transport options.
///
/// The upstream timeout, when set, covers the whole call including the body.
pub fn build_http_client(
    transport_options: &TransportOptions<HttpTransport>,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder();

    if let Some(timeout) = transport_options.timeout {
        builder = builder.timeout(timeout);
    }

    builder.build()
}

/// Capture the upstream rate-limit headers from a response.
pub fn rate_headers(headers: &HeaderMap) -> RateHeaders {
    let get = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    RateHeaders {
        limit: get("x-ratelimit-limit"),
        remaining: get("x-ratelimit-remaining"),
        reset: get("x-ratelimit-reset"),
    }
}

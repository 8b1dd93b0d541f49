//! Shared reqwest client construction.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use std::time::Duration;

/// Per-request timeout applied when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a client that sends `Authorization: token=<token>` when a cluster
/// token is configured.
pub fn build_client(auth_token: Option<&str>, timeout: Duration) -> reqwest::Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    if let Some(token) = auth_token {
        if let Ok(value) = HeaderValue::from_str(&format!("token={}", token)) {
            headers.insert(AUTHORIZATION, value);
        } else {
            tracing::warn!("auth token contains invalid header characters, sending no token");
        }
    }

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_and_without_token() {
        assert!(build_client(None, DEFAULT_REQUEST_TIMEOUT).is_ok());
        assert!(build_client(Some("abc.def"), DEFAULT_REQUEST_TIMEOUT).is_ok());
        assert!(build_client(Some("bad\ntoken"), DEFAULT_REQUEST_TIMEOUT).is_ok());
    }
}

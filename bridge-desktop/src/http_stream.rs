//! Remote Stream Factory using Reqwest
//!
//! Issues `GET` requests with a `Range` header and exposes the response body
//! as a byte stream. The total length is taken from `Content-Range` on a
//! partial response, or from `Content-Length` when the server returns the
//! whole file.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    redact::redact_url,
    stream::{RemoteStream, RemoteStreamFactory},
};
use futures_util::StreamExt;
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Reqwest-based byte-range stream factory for a single URL.
pub struct ReqwestStreamFactory {
    client: Client,
    url: String,
    headers: Vec<(String, String)>,
}

impl ReqwestStreamFactory {
    /// Create a factory with a default client.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(4)
            .user_agent(concat!("media-vfs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::NotAvailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(client, url))
    }

    /// Create a factory sharing an existing client (and its connection pool).
    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Add a header sent with every range request (e.g. an auth token).
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// The full request URL, credentials included. Log [`Self::log_url`]
    /// instead.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The URL with its query and userinfo redacted.
    pub fn log_url(&self) -> String {
        redact_url(&self.url)
    }
}

#[async_trait]
impl RemoteStreamFactory for ReqwestStreamFactory {
    #[instrument(skip(self), fields(url = %redact_url(&self.url)))]
    async fn open(&self, start: u64, end: Option<u64>) -> Result<RemoteStream> {
        let mut request = self
            .client
            .get(&self.url)
            .header(RANGE, range_header(start, end));
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        // Errors carry the request URL, which may hold a token.
        let response = request.send().await.map_err(|e| {
            let e = e.without_url();
            if e.is_timeout() {
                BridgeError::OperationFailed("Request timed out".to_string())
            } else if e.is_connect() {
                BridgeError::OperationFailed(format!("Connection failed: {}", e))
            } else {
                BridgeError::OperationFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), start, "Range request rejected");
            return Err(BridgeError::Http {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            });
        }

        let total_length = if status == StatusCode::PARTIAL_CONTENT {
            response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_content_range_total)
                .or_else(|| {
                    if end.is_none() {
                        response.content_length().map(|len| start + len)
                    } else {
                        None
                    }
                })
        } else if start > 0 {
            return Err(BridgeError::OperationFailed(format!(
                "Server ignored range request starting at {}",
                start
            )));
        } else {
            response.content_length()
        };

        debug!(
            status = status.as_u16(),
            start,
            total_length = ?total_length,
            "Opened remote stream"
        );

        let data = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| BridgeError::OperationFailed(e.without_url().to_string())))
            .boxed();

        Ok(RemoteStream::new(total_length, data))
    }
}

/// Builds the `Range` header value for an inclusive byte range.
pub(crate) fn range_header(start: u64, end: Option<u64>) -> String {
    match end {
        Some(end) => format!("bytes={}-{}", start, end),
        None => format!("bytes={}-", start),
    }
}

/// Extracts the complete length from a `Content-Range` value such as
/// `bytes 0-499/1234`. An unknown length (`*`) yields `None`.
pub(crate) fn parse_content_range_total(value: &str) -> Option<u64> {
    let (unit, rest) = value.trim().split_once(' ')?;
    if !unit.eq_ignore_ascii_case("bytes") {
        return None;
    }
    let (_, total) = rest.split_once('/')?;
    total.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_header_open_ended() {
        assert_eq!(range_header(0, None), "bytes=0-");
        assert_eq!(range_header(131072, None), "bytes=131072-");
    }

    #[test]
    fn test_range_header_bounded() {
        assert_eq!(range_header(100, Some(199)), "bytes=100-199");
    }

    #[test]
    fn test_parse_content_range_total() {
        assert_eq!(parse_content_range_total("bytes 0-499/1234"), Some(1234));
        assert_eq!(parse_content_range_total("bytes 500-1233/1234 "), Some(1234));
        assert_eq!(parse_content_range_total("bytes 0-499/*"), None);
        assert_eq!(parse_content_range_total("items 0-4/10"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn test_factory_construction() {
        let factory = ReqwestStreamFactory::new("https://media.example.com/Audio/42/stream")
            .unwrap()
            .with_header("X-Emby-Token", "secret");
        assert_eq!(factory.url(), "https://media.example.com/Audio/42/stream");
        assert_eq!(factory.headers.len(), 1);
    }

    #[test]
    fn test_log_url_hides_query_token() {
        let factory =
            ReqwestStreamFactory::new("https://media.example.com/Audio/42/stream?api_key=s3cr3t")
                .unwrap();
        assert_eq!(factory.log_url(), "https://media.example.com/Audio/42/stream?[REDACTED]");
        assert!(factory.url().contains("s3cr3t"));
    }
}

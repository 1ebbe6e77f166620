use async_trait::async_trait;
use futures::StreamExt;
use thiserror::Error;

use super::dom::ParseError;

/// `Accept` header sent with every feed request.
pub const FEED_ACCEPT: &str =
    "application/rss+xml, application/atom+xml, application/xml, text/xml, text/plain, */*";

/// Default response size cap.
pub const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur during a single fetch attempt.
///
/// None of these reach the caller of [`fetch_feeds`](super::fetch_feeds): the
/// orchestrator absorbs them and moves on to the next strategy.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The feed URL is malformed or not http(s)
    #[error("{0}")]
    InvalidUrl(#[from] crate::util::UrlValidationError),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// The attempt exceeded its time budget
    #[error("Request timed out")]
    Timeout,
    /// Body was not well-formed XML
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Source of feed documents.
///
/// The orchestrator only ever asks for the text behind a URL, so tests can
/// substitute an in-memory double for the network.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// GETs `url` and returns the response body as text.
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

/// [`FeedFetcher`] backed by a `reqwest` client.
///
/// Sends a plain GET with only an `Accept` header: no cookies, no auth, no
/// body. Non-2xx responses fail, as do bodies over the size cap.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            max_bytes: MAX_FEED_SIZE,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

#[async_trait]
impl FeedFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, FEED_ACCEPT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        let bytes = read_limited_bytes(response, self.max_bytes).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item><guid>1</guid><title>Test</title></item>
</channel></rss>"#;

    #[tokio::test]
    async fn test_fetch_sends_feed_accept_header() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .and(header_exists("accept"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/xml"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::default();
        let body = fetcher
            .fetch_text(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(body, VALID_RSS);

        let requests = mock_server.received_requests().await.unwrap();
        let accept = requests[0].headers.get("accept").unwrap().to_str().unwrap();
        assert_eq!(accept, FEED_ACCEPT);
    }

    #[tokio::test]
    async fn test_fetch_404_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::default();
        match fetcher.fetch_text(&format!("{}/feed", mock_server.uri())).await {
            Err(FetchError::HttpStatus(404)) => {}
            other => panic!("Expected HttpStatus(404), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_does_not_retry_server_errors() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::default();
        let result = fetcher
            .fetch_text(&format!("{}/feed", mock_server.uri()))
            .await;
        assert!(matches!(result, Err(FetchError::HttpStatus(503))));
    }

    #[tokio::test]
    async fn test_fetch_rejects_oversized_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(2048)))
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::default().with_max_bytes(1024);
        let result = fetcher
            .fetch_text(&format!("{}/feed", mock_server.uri()))
            .await;
        assert!(matches!(result, Err(FetchError::ResponseTooLarge)));
    }
}

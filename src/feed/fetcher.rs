use crate::config::Config;
use crate::util::validate_url;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching a directory page or feed.
///
/// Callers never propagate these: a failed fetch means "no data from this
/// source" and processing moves on to the next one.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL rejected before any request was made (bad scheme, SSRF guard)
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request did not complete within the configured timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// Response body exceeded the configured size limit
    #[error("response too large (exceeds {0} bytes)")]
    TooLarge(usize),
}

/// A successful (2xx) response, fully buffered.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: Vec<u8>,
    /// URL after redirects; relative links on the page resolve against this.
    pub final_url: String,
}

/// Shared HTTP GET capability for the crawler and the feed parser.
///
/// Wraps a `reqwest::Client` (which pools connections internally, so clones
/// are cheap) together with the request policy: identifying user agent,
/// per-request timeout, body size cap and URL validation.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
    allow_private: bool,
}

impl HttpFetcher {
    /// Builds a fetcher whose client sends `config.user_agent` on every request.
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Uses a caller-configured client. The caller is responsible for its headers.
    pub fn with_client(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            timeout: config.request_timeout(),
            max_bytes: config.max_response_bytes,
            allow_private: config.allow_private_hosts,
        }
    }

    /// Issues a GET and buffers the body.
    ///
    /// The timeout covers the whole exchange, body included. Non-2xx statuses
    /// are returned as [`FetchError::HttpStatus`]. Dropping the returned future
    /// aborts the request.
    pub async fn get(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let validated = validate_url(url, self.allow_private)
            .map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        tokio::time::timeout(self.timeout, self.get_unbounded(validated))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))?
    }

    async fn get_unbounded(&self, url: url::Url) -> Result<FetchedPage, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let final_url = response.url().to_string();
        let body = read_limited_bytes(response, self.max_bytes).await?;

        Ok(FetchedPage {
            status: status.as_u16(),
            body,
            final_url,
        })
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(FetchError::TooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::TooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

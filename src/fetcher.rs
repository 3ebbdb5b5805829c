//! Document retrieval: the [`Fetcher`] seam and its HTTP implementation.

use async_trait::async_trait;
use url::Url;

use crate::config::FetchConfig;
use crate::error::{Error, FetchError, Result};

/// Abstraction over document retrieval, enabling testability.
///
/// Implementations return the full body of a successful response. Any failure,
/// including a malformed source, is a [`FetchError`] and stays contained in the
/// item that issued it.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the document at `source`
    async fn fetch(&self, source: &str) -> std::result::Result<Vec<u8>, FetchError>;
}

/// Production [`Fetcher`] backed by a shared `reqwest` client
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build the HTTP client from fetch settings
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder.build().map_err(Error::Network)?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Parse a source into an HTTP(S) URL
pub fn parse_source(source: &str) -> std::result::Result<Url, FetchError> {
    let url = Url::parse(source.trim()).map_err(|e| FetchError::InvalidSource {
        source_url: source.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::InvalidSource {
            source_url: source.to_string(),
            reason: format!("unsupported scheme {other:?}"),
        }),
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, source: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let url = parse_source(source)?;

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(url.to_string())
            } else if e.is_connect() {
                FetchError::Transport(format!("connection failed for {url}: {e}"))
            } else {
                FetchError::Transport(format!("request to {url} failed: {e}"))
            }
        })?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(url.to_string())
            } else {
                FetchError::Body {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        Ok(body.to_vec())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn parse_source_rejects_garbage_and_foreign_schemes() {
        assert!(matches!(
            parse_source("not a url"),
            Err(FetchError::InvalidSource { .. })
        ));
        let err = parse_source("bad://url").unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"), "{err}");
        assert!(parse_source(" https://example.com/a.pdf ").is_ok());
    }

    #[tokio::test]
    async fn fetch_returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
        let body = fetcher
            .fetch(&format!("{}/doc.pdf", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, b"%PDF-1.4");
    }

    #[tokio::test]
    async fn non_success_status_is_a_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.pdf"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
        let err = fetcher
            .fetch(&format!("{}/missing.pdf", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn request_timeout_is_reported_as_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let config = FetchConfig {
            request_timeout: Some(Duration::from_millis(100)),
            ..FetchConfig::default()
        };
        let fetcher = HttpFetcher::new(&config).unwrap();
        let err = fetcher
            .fetch(&format!("{}/slow.pdf", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout(_)), "{err:?}");
    }
}

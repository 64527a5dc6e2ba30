//! Request execution through the session client and connection pool.
//!
//! This module provides the [`RequestExecutor`] which issues GET/POST
//! requests with the session's configured headers attached, and the
//! [`ResponseHandle`] which couples a response body to its pool lease so
//! the connection slot is returned on every exit path.
//!
//! # Retry semantics
//!
//! GET requests are idempotent and are transparently retried on transient
//! I/O failure (connect error or timeout) up to the configured budget,
//! with a small random jitter between attempts. POST requests are never
//! retried. HTTP error statuses are not retried at this layer; callers
//! decide what a 4xx/5xx response means.

use std::sync::Arc;

use futures_util::StreamExt;
use rand::Rng;
use reqwest::{Method, Response, StatusCode};
use tracing::{debug, instrument};
use url::Url;

use super::client::{ClientConfig, SessionClient};
use super::constants::RETRY_JITTER_MAX;
use super::error::HttpError;
use super::pool::{ConnectionPool, PoolLease};

/// Issues requests for one crawl session.
///
/// Holds the session's lazily built client and the shared connection
/// pool. Safe for concurrent use by the session's workers: the
/// configuration is read-only after construction.
#[derive(Debug)]
pub struct RequestExecutor {
    session: SessionClient,
    pool: Arc<ConnectionPool>,
    config: Arc<ClientConfig>,
}

impl RequestExecutor {
    /// Creates an executor for the given configuration and pool handle.
    #[must_use]
    pub fn new(config: Arc<ClientConfig>, pool: Arc<ConnectionPool>) -> Self {
        Self {
            session: SessionClient::new(Arc::clone(&config)),
            pool,
            config,
        }
    }

    /// Returns the session configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the pool this executor draws slots from.
    #[must_use]
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Issues a GET request, retrying transparently on transient I/O
    /// failure up to the configured budget.
    ///
    /// `extra_headers` are attached after the session's configured
    /// headers (e.g. a per-request derived Referer).
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] on invalid URL, pool closure, client build
    /// failure, or terminal I/O failure. An HTTP error status is not an
    /// error here; inspect [`ResponseHandle::status`].
    #[instrument(skip(self, extra_headers), fields(url = %url))]
    pub async fn get(
        &self,
        url: &str,
        extra_headers: &[(String, String)],
    ) -> Result<ResponseHandle, HttpError> {
        let target = parse_target(url)?;
        let lease = self.pool.acquire(&target).await?;
        let client = self.session.client().await?;

        let mut attempt: u32 = 0;
        let response = loop {
            let request = apply_headers(
                client.request(Method::GET, target.clone()),
                &self.config.headers,
                extra_headers,
            );
            match request.send().await {
                Ok(response) => break response,
                Err(error) if attempt < self.config.max_get_retries && is_transient(&error) => {
                    attempt += 1;
                    debug!(
                        url,
                        attempt,
                        error = %error,
                        "transient GET failure, retrying"
                    );
                    tokio::time::sleep(retry_jitter()).await;
                }
                Err(error) => return Err(map_send_error(url, error)),
            }
        };

        Ok(ResponseHandle::new(url, response, lease))
    }

    /// Issues a POST request. Never retried (non-idempotent).
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] on invalid URL, pool closure, client build
    /// failure, or I/O failure.
    #[instrument(skip(self, extra_headers), fields(url = %url))]
    pub async fn post(
        &self,
        url: &str,
        extra_headers: &[(String, String)],
    ) -> Result<ResponseHandle, HttpError> {
        let target = parse_target(url)?;
        let lease = self.pool.acquire(&target).await?;
        let client = self.session.client().await?;

        let request = apply_headers(
            client.request(Method::POST, target),
            &self.config.headers,
            extra_headers,
        );
        let response = request.send().await.map_err(|e| map_send_error(url, e))?;

        Ok(ResponseHandle::new(url, response, lease))
    }
}

/// An open response coupled to its connection lease.
///
/// The lease is released exactly once: either when the body is consumed
/// via [`bytes`](Self::bytes) / [`text`](Self::text), or when the handle
/// is dropped (error paths included). Failing to do either would starve
/// the pool, which is why consumption takes `self` by value.
#[derive(Debug)]
pub struct ResponseHandle {
    url: String,
    response: Response,
    lease: PoolLease,
}

impl ResponseHandle {
    fn new(url: &str, response: Response, lease: PoolLease) -> Self {
        Self {
            url: url.to_string(),
            response,
            lease,
        }
    }

    /// Returns the HTTP status of the response.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    /// Returns the originally requested URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the Content-Length advertised by the server, if any.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    /// Streams the body into memory and releases the connection lease.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Timeout`] or [`HttpError::Network`] if the
    /// stream fails mid-body. The lease is released either way.
    pub async fn bytes(self) -> Result<Vec<u8>, HttpError> {
        let Self {
            url,
            response,
            lease,
        } = self;

        let mut stream = response.bytes_stream();
        let mut buffer = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| map_send_error(&url, e))?;
            buffer.extend_from_slice(&chunk);
        }

        // Body fully consumed; the slot goes back to the pool here.
        drop(lease);
        Ok(buffer)
    }

    /// Reads the body as (lossily decoded) UTF-8 text and releases the
    /// connection lease.
    ///
    /// # Errors
    ///
    /// Same as [`bytes`](Self::bytes).
    pub async fn text(self) -> Result<String, HttpError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn parse_target(url: &str) -> Result<Url, HttpError> {
    Url::parse(url).map_err(|_| HttpError::invalid_url(url))
}

fn apply_headers(
    mut request: reqwest::RequestBuilder,
    configured: &[(String, String)],
    extra: &[(String, String)],
) -> reqwest::RequestBuilder {
    for (name, value) in configured.iter().chain(extra) {
        request = request.header(name, value);
    }
    request
}

fn is_transient(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

fn map_send_error(url: &str, error: reqwest::Error) -> HttpError {
    if error.is_timeout() {
        HttpError::timeout(url)
    } else {
        HttpError::network(url, error)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn retry_jitter() -> std::time::Duration {
    let max_ms = RETRY_JITTER_MAX.as_millis() as u64;
    let jitter_ms = rand::thread_rng().gen_range(50..=max_ms);
    std::time::Duration::from_millis(jitter_ms)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::http::pool::PoolConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn executor_with_pool(pool: Arc<ConnectionPool>) -> RequestExecutor {
        RequestExecutor::new(Arc::new(ClientConfig::default()), pool)
    }

    #[test]
    fn test_get_invalid_url_returns_error() {
        let executor = executor_with_pool(Arc::new(ConnectionPool::default()));
        let result = tokio_test::block_on(executor.get("not-a-valid-url", &[]));
        assert!(matches!(result, Err(HttpError::InvalidUrl { .. })));
    }

    #[test]
    fn test_post_invalid_url_returns_error() {
        let executor = executor_with_pool(Arc::new(ConnectionPool::default()));
        let result = tokio_test::block_on(executor.post("not-a-valid-url", &[]));
        assert!(matches!(result, Err(HttpError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_handle_holds_and_releases_pool_slot() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cat.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"img"))
            .mount(&mock_server)
            .await;

        let pool = Arc::new(ConnectionPool::new(PoolConfig {
            max_total: 4,
            max_per_destination: 4,
        }));
        let executor = executor_with_pool(Arc::clone(&pool));

        let handle = executor
            .get(&format!("{}/cat.jpg", mock_server.uri()), &[])
            .await
            .unwrap();
        assert_eq!(pool.available_total(), 3, "lease held while handle alive");

        drop(handle);
        assert_eq!(pool.available_total(), 4, "drop must release the lease");
    }

    #[tokio::test]
    async fn test_bytes_consumes_body_and_releases_slot() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cat.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"image bytes"))
            .mount(&mock_server)
            .await;

        let pool = Arc::new(ConnectionPool::new(PoolConfig {
            max_total: 2,
            max_per_destination: 2,
        }));
        let executor = executor_with_pool(Arc::clone(&pool));

        let handle = executor
            .get(&format!("{}/cat.jpg", mock_server.uri()), &[])
            .await
            .unwrap();
        let bytes = handle.bytes().await.unwrap();

        assert_eq!(bytes, b"image bytes");
        assert_eq!(pool.available_total(), 2);
    }

    #[tokio::test]
    async fn test_configured_and_extra_headers_are_attached() {
        use wiremock::matchers::header;

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cat.jpg"))
            .and(header("X-Custom", "one"))
            .and(header("Referer", "https://example.com"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let config = ClientConfig {
            headers: vec![("X-Custom".to_string(), "one".to_string())],
            ..ClientConfig::default()
        };
        let executor =
            RequestExecutor::new(Arc::new(config), Arc::new(ConnectionPool::default()));

        let handle = executor
            .get(
                &format!("{}/cat.jpg", mock_server.uri()),
                &[("Referer".to_string(), "https://example.com".to_string())],
            )
            .await
            .unwrap();
        assert_eq!(handle.status().as_u16(), 200);
    }

    #[tokio::test]
    async fn test_error_status_still_returns_handle() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/missing.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let executor = executor_with_pool(Arc::new(ConnectionPool::default()));
        let handle = executor
            .post(&format!("{}/missing.jpg", mock_server.uri()), &[])
            .await
            .unwrap();
        assert_eq!(handle.status().as_u16(), 404);
    }
}

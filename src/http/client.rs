//! Lazy per-session HTTP client construction with proxy health-checking.
//!
//! A [`SessionClient`] owns at most one `reqwest::Client`, built from an
//! immutable [`ClientConfig`] the first time a request is made and cached
//! for the rest of the session. If a proxy pool is configured, the first
//! proxy is probed once at construction time; a failed probe silently
//! downgrades the session to a direct connection.
//!
//! # Proxy selection policy
//!
//! Deterministic first-match: only the first proxy in the configured pool
//! is ever probed. Later entries are never contacted; advancing to them
//! is the caller's decision (reorder the pool). The probe succeeds only
//! when the well-known probe URL answers with status exactly 200.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::{Client, ClientBuilder, Proxy};
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};
use url::Url;

use super::constants::{DEFAULT_MAX_GET_RETRIES, DEFAULT_PROBE_URL, DEFAULT_TIMEOUT_MS};
use super::error::HttpError;
use crate::user_agent;

/// A proxy endpoint: plain host and port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyServer {
    /// Proxy host name or address.
    pub host: String,
    /// Proxy port.
    pub port: u16,
}

impl ProxyServer {
    /// Creates a proxy endpoint.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns the proxy URL understood by the HTTP client.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// A single cookie attached to every matching request of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Domain the cookie is scoped to.
    pub domain: String,
}

impl SessionCookie {
    /// Creates a cookie scoped to the given domain.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
        }
    }
}

/// Immutable configuration a session client is built from.
///
/// Constructed by the crawler builder; once built it never changes, which
/// is what makes the session client safe to share across workers.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Uniform timeout applied to connect and read phases.
    pub(crate) timeout: Duration,
    /// Ordered proxy pool; only the first entry is probed.
    pub(crate) proxies: Vec<ProxyServer>,
    /// Optional session cookie.
    pub(crate) cookie: Option<SessionCookie>,
    /// Headers attached to every request, insertion order preserved,
    /// names unique (enforced by the crawler builder).
    pub(crate) headers: Vec<(String, String)>,
    /// Derive a Referer header from each target URL's origin.
    pub(crate) auto_referer: bool,
    /// Accept any TLS certificate and skip hostname verification.
    /// Explicit opt-in; see the crawler builder docs for the trade-off.
    pub(crate) insecure_tls: bool,
    /// Transparent retry budget for GET requests on transient I/O failure.
    pub(crate) max_get_retries: u32,
    /// URL fetched through a candidate proxy to validate it.
    pub(crate) probe_url: String,
    /// User-Agent header value.
    pub(crate) user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            proxies: Vec::new(),
            cookie: None,
            headers: Vec::new(),
            auto_referer: false,
            insecure_tls: false,
            max_get_retries: DEFAULT_MAX_GET_RETRIES,
            probe_url: DEFAULT_PROBE_URL.to_string(),
            user_agent: user_agent::default_user_agent(),
        }
    }
}

impl ClientConfig {
    /// Returns the uniform request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the configured headers in insertion order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Looks up a configured header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns whether auto-referer derivation is enabled.
    #[must_use]
    pub fn auto_referer(&self) -> bool {
        self.auto_referer
    }

    /// Returns the GET retry budget.
    #[must_use]
    pub fn max_get_retries(&self) -> u32 {
        self.max_get_retries
    }

    /// Returns the configured proxy pool.
    #[must_use]
    pub fn proxies(&self) -> &[ProxyServer] {
        &self.proxies
    }
}

/// Lazily built HTTP client, exclusively owned by one crawl session.
///
/// The underlying `reqwest::Client` is constructed on the first request
/// and reused for the session's remaining requests. Proxy validation,
/// when a proxy is configured, happens at most once, here.
#[derive(Debug)]
pub struct SessionClient {
    config: Arc<ClientConfig>,
    client: OnceCell<Client>,
}

impl SessionClient {
    /// Creates a session client; no connection is made until first use.
    #[must_use]
    pub fn new(config: Arc<ClientConfig>) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    /// Returns the session's configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the cached client, building (and proxy-probing) it on the
    /// first call.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::ClientBuild`] if the client cannot be
    /// constructed. Proxy-probe failures are not errors: the session
    /// silently falls back to a direct connection.
    pub async fn client(&self) -> Result<&Client, HttpError> {
        self.client
            .get_or_try_init(|| build_session_client(&self.config))
            .await
    }
}

/// Builds the session client, validating the first configured proxy.
#[instrument(skip(config), fields(proxies = config.proxies.len()))]
async fn build_session_client(config: &ClientConfig) -> Result<Client, HttpError> {
    let proxy = match config.proxies.first() {
        Some(candidate) => {
            if probe_proxy(config, candidate).await {
                debug!(proxy = %candidate.url(), "proxy validated");
                Some(candidate)
            } else {
                // Silent downgrade: crawling proceeds unproxied.
                warn!(
                    proxy = %candidate.url(),
                    "proxy probe failed, falling back to direct connection"
                );
                None
            }
        }
        None => None,
    };

    let mut builder = base_builder(config);

    if let Some(proxy) = proxy {
        let resolved = Proxy::all(proxy.url()).map_err(HttpError::client_build)?;
        builder = builder.proxy(resolved);
    }

    if let Some(cookie) = &config.cookie {
        builder = builder.cookie_provider(Arc::new(cookie_jar(cookie)?));
    }

    builder.build().map_err(HttpError::client_build)
}

/// Checks whether a proxy is usable by fetching the probe URL through it.
///
/// Success criterion: response status is exactly 200. Any other status,
/// a connect failure, or a timeout counts as a failed probe.
async fn probe_proxy(config: &ClientConfig, proxy: &ProxyServer) -> bool {
    let Ok(resolved) = Proxy::all(proxy.url()) else {
        debug!(proxy = %proxy.url(), "proxy URL rejected by client");
        return false;
    };

    let mut builder = Client::builder()
        .connect_timeout(config.timeout)
        .timeout(config.timeout)
        .proxy(resolved);
    if config.insecure_tls {
        builder = builder
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true);
    }

    let Ok(client) = builder.build() else {
        debug!(proxy = %proxy.url(), "failed to build probing client");
        return false;
    };

    match client.get(&config.probe_url).send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            debug!(proxy = %proxy.url(), status, "proxy probe response");
            status == 200
        }
        Err(error) => {
            debug!(proxy = %proxy.url(), error = %error, "proxy probe failed");
            false
        }
    }
}

fn base_builder(config: &ClientConfig) -> ClientBuilder {
    let mut builder = Client::builder()
        .connect_timeout(config.timeout)
        .timeout(config.timeout)
        .gzip(true)
        .user_agent(config.user_agent.clone());
    if config.insecure_tls {
        // Trust-everything mode: accepts any certificate and skips
        // hostname verification. Opt-in via the builder's insecure flag.
        builder = builder
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true);
    }
    builder
}

fn cookie_jar(cookie: &SessionCookie) -> Result<Jar, HttpError> {
    let scope = format!("http://{}/", cookie.domain);
    let scope_url =
        Url::parse(&scope).map_err(|_| HttpError::invalid_url(cookie.domain.clone()))?;
    let jar = Jar::default();
    jar.add_cookie_str(
        &format!(
            "{}={}; Domain={}; Path=/",
            cookie.name, cookie.value, cookie.domain
        ),
        &scope_url,
    );
    Ok(jar)
}

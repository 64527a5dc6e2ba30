//! The client-facing crawler: single, batch, and page downloads.
//!
//! This module composes the HTTP layer, the extractor, and the file
//! strategy into the public download operations, coordinating repeat
//! semantics, pre-request pacing, and bounded parallel fan-out with a
//! semaphore over spawned tasks.
//!
//! # Overview
//!
//! A [`Crawler`] is one session: one lazily built HTTP client, one
//! immutable configuration, shared safely by all of the session's
//! workers. Operations never fail as a whole - individual attempt
//! failures are isolated at the smallest unit (one attempt, one URL,
//! one page) and reported per item in [`DownloadReport`] /
//! [`BatchReport`].
//!
//! # Example
//!
//! ```no_run
//! use picgrab_core::Crawler;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let crawler = Crawler::builder()
//!     .user_agent("my-crawler/1.0")
//!     .sleep_ms(250)
//!     .parallelism(4)?
//!     .build()?;
//!
//! let report = crawler
//!     .download_page("https://example.com/gallery.html")
//!     .await;
//! println!("downloaded {} images", report.completed());
//! # Ok(())
//! # }
//! ```

mod error;
mod pace;
mod report;

pub use error::CrawlError;
pub use pace::{FixedPace, PacePolicy};
pub use report::{BatchReport, DownloadReport, PageFailure};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::extract::{PageImageExtractor, TagPolicy};
use crate::http::constants::DEFAULT_TIMEOUT_MS;
use crate::http::{ClientConfig, ConnectionPool, ProxyServer, RequestExecutor, SessionCookie};
use crate::storage::{DiskStrategy, FileNaming, FileStrategy};

/// Minimum allowed parallelism value.
const MIN_PARALLELISM: usize = 1;

/// Maximum allowed parallelism value.
const MAX_PARALLELISM: usize = 100;

/// Default parallelism if not specified.
pub const DEFAULT_PARALLELISM: usize = 10;

/// Errors raised by [`CrawlerBuilder::build`].
///
/// Validation happens at build time, not at point of use: a crawler
/// that builds is a crawler that runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A non-positive timeout was configured.
    #[error("invalid timeout {ms} ms: must be positive")]
    InvalidTimeout {
        /// The rejected value.
        ms: u64,
    },

    /// A zero repeat count was configured.
    #[error("invalid repeat count {value}: must be at least 1")]
    InvalidRepeat {
        /// The rejected value.
        value: u32,
    },

    /// Parallelism outside the supported range.
    #[error(
        "invalid parallelism {value}: must be between {MIN_PARALLELISM} and {MAX_PARALLELISM}"
    )]
    InvalidParallelism {
        /// The rejected value.
        value: usize,
    },

    /// A header was added with an empty name.
    #[error("header name must not be empty")]
    EmptyHeaderName,

    /// The same header name was added twice (names are case-insensitive).
    #[error("duplicate header name: {name}")]
    DuplicateHeader {
        /// The offending header name.
        name: String,
    },
}

/// One configured crawl/download session.
///
/// Cheap to clone (shared internals); clones observe the same session
/// client, pool, and file strategy.
#[derive(Clone)]
pub struct Crawler {
    config: Arc<ClientConfig>,
    executor: Arc<RequestExecutor>,
    extractor: Arc<PageImageExtractor>,
    strategy: Arc<dyn FileStrategy>,
    pace: Arc<dyn PacePolicy>,
    repeat: u32,
    parallelism: usize,
}

impl Crawler {
    /// Starts building a crawler.
    #[must_use]
    pub fn builder() -> CrawlerBuilder {
        CrawlerBuilder::new()
    }

    /// Returns the configured repeat count.
    #[must_use]
    pub fn repeat(&self) -> u32 {
        self.repeat
    }

    /// Returns the configured parallelism.
    #[must_use]
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Downloads one image URL, honoring the configured repeat count.
    ///
    /// Performs `repeat` attempts; each attempt is preceded by the pacing
    /// delay and is independent - a failure in attempt *i* does not
    /// cancel attempt *i+1*. Attempts are strictly sequential.
    #[instrument(skip(self), fields(url = %url, repeat = self.repeat))]
    pub async fn download_one(&self, url: &str) -> DownloadReport {
        self.download_with_repeat(url, self.repeat).await
    }

    /// Downloads many image URLs with bounded parallelism.
    ///
    /// Returns only after every URL has completed, successfully or not;
    /// one failing download never cancels its siblings. Completion order
    /// is non-deterministic, but reports are returned in input order.
    #[instrument(skip(self, urls), fields(count = urls.len()))]
    pub async fn download_many(&self, urls: &[String]) -> BatchReport {
        self.fan_out(urls.to_vec(), self.repeat, Vec::new()).await
    }

    /// Fetches a page, extracts its image URLs, and downloads each of
    /// them exactly once.
    ///
    /// Crawling a page forces "ignore repeat" semantics: discovered
    /// images are fetched once regardless of the configured repeat
    /// count. A page that cannot be fetched yields an empty batch with
    /// the failure recorded.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn download_page(&self, url: &str) -> BatchReport {
        match self.collect_page_images(url).await {
            Ok(images) => self.fan_out(images, 1, Vec::new()).await,
            Err(error) => {
                warn!(url, error = %error, "page fetch failed");
                BatchReport::new(
                    Vec::new(),
                    vec![PageFailure {
                        url: url.to_string(),
                        error,
                    }],
                )
            }
        }
    }

    /// Fetches and extracts multiple pages in parallel, then downloads
    /// the combined image list.
    ///
    /// Per-page failures are isolated: a page that cannot be fetched or
    /// parsed is recorded in the report and does not abort its siblings.
    #[instrument(skip(self, urls), fields(pages = urls.len()))]
    pub async fn download_pages(&self, urls: &[String]) -> BatchReport {
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut handles = Vec::with_capacity(urls.len());

        for (index, url) in urls.iter().cloned().enumerate() {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break; // local semaphore is never closed
            };
            let crawler = self.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let result = crawler.collect_page_images(&url).await;
                (index, url, result)
            }));
        }

        let mut entries = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(entry) => entries.push(entry),
                Err(error) => warn!(error = %error, "page task panicked"),
            }
        }
        entries.sort_by_key(|(index, _, _)| *index);

        let mut combined = Vec::new();
        let mut failures = Vec::new();
        for (_, url, result) in entries {
            match result {
                Ok(images) => combined.extend(images),
                Err(error) => {
                    warn!(url = %url, error = %error, "page skipped");
                    failures.push(PageFailure { url, error });
                }
            }
        }

        self.fan_out(combined, 1, failures).await
    }

    /// Sequential attempts for one URL; the shared building block of
    /// every public operation.
    async fn download_with_repeat(&self, url: &str, repeat: u32) -> DownloadReport {
        let mut attempts = Vec::with_capacity(repeat as usize);
        for attempt in 1..=repeat {
            self.pace.pause().await;
            let outcome = self.fetch_and_store(url, attempt).await;
            if let Err(error) = &outcome {
                warn!(url, attempt, error = %error, "download attempt failed");
            }
            attempts.push(outcome);
        }
        DownloadReport::new(url, attempts)
    }

    /// One concrete fetch-and-persist attempt.
    async fn fetch_and_store(&self, url: &str, attempt: u32) -> Result<PathBuf, CrawlError> {
        let extra = self.derived_referer(url);
        let handle = if self.prefers_get() {
            self.executor.get(url, &extra).await?
        } else {
            self.executor.post(url, &extra).await?
        };

        let status = handle.status();
        if !status.is_success() {
            // Dropping the handle here returns the connection slot.
            return Err(CrawlError::http_status(url, status.as_u16()));
        }

        let bytes = handle.bytes().await?;
        let path = self.strategy.store(url, &bytes, attempt).await?;
        info!(url, path = %path.display(), bytes = bytes.len(), "image downloaded");
        Ok(path)
    }

    /// Fetches a page body (always GET) and extracts its image URLs.
    async fn collect_page_images(&self, url: &str) -> Result<Vec<String>, CrawlError> {
        let handle = self.executor.get(url, &[]).await?;
        let status = handle.status();
        if !status.is_success() {
            return Err(CrawlError::http_status(url, status.as_u16()));
        }

        let body = handle.text().await?;
        let base = Url::parse(url).ok();
        let images = self.extractor.extract(&body, base.as_ref());
        debug!(url, images = images.len(), "page extracted");
        Ok(images)
    }

    /// Bounded parallel dispatch of per-URL downloads; waits for all.
    async fn fan_out(
        &self,
        urls: Vec<String>,
        repeat: u32,
        page_failures: Vec<PageFailure>,
    ) -> BatchReport {
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut handles = Vec::with_capacity(urls.len());

        for (index, url) in urls.into_iter().enumerate() {
            // Acquire before spawning so dispatch itself is bounded.
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break; // local semaphore is never closed
            };
            let crawler = self.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                (index, crawler.download_with_repeat(&url, repeat).await)
            }));
        }

        let mut indexed = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(entry) => indexed.push(entry),
                // Task panics are logged but don't fail the batch.
                Err(error) => warn!(error = %error, "download task panicked"),
            }
        }
        indexed.sort_by_key(|(index, _)| *index);

        let reports = indexed.into_iter().map(|(_, report)| report).collect();
        BatchReport::new(reports, page_failures)
    }

    /// Sites that require a Referer are assumed to require GET semantics;
    /// everything else goes through POST (the historical default of this
    /// tool's lineage).
    fn prefers_get(&self) -> bool {
        self.config.header("Referer").is_some() || self.config.auto_referer()
    }

    /// Derives a per-request Referer from the target URL's origin when
    /// auto-referer is on and no manual Referer is configured.
    fn derived_referer(&self, url: &str) -> Vec<(String, String)> {
        if self.config.auto_referer() && self.config.header("Referer").is_none() {
            if let Some(origin) = origin_of(url) {
                return vec![("Referer".to_string(), origin)];
            }
        }
        Vec::new()
    }
}

/// Returns `scheme://host` for a URL, or `None` when it has no host.
fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(format!("{}://{host}", parsed.scheme()))
}

/// Fluent, validating builder for [`Crawler`].
///
/// All settings are optional; `build()` validates and produces an
/// immutable session. Invalid values are errors, not silently ignored.
pub struct CrawlerBuilder {
    user_agent: Option<String>,
    referer: Option<String>,
    auto_referer: bool,
    timeout_ms: Option<u64>,
    proxies: Vec<ProxyServer>,
    cookie: Option<SessionCookie>,
    headers: Vec<(String, String)>,
    repeat: u32,
    sleep_ms: u64,
    parallelism: usize,
    insecure_tls: bool,
    max_get_retries: Option<u32>,
    probe_url: Option<String>,
    output_dir: PathBuf,
    naming: FileNaming,
    strategy: Option<Arc<dyn FileStrategy>>,
    tag_policy: Option<Box<dyn TagPolicy>>,
    pace: Option<Arc<dyn PacePolicy>>,
    pool: Option<Arc<ConnectionPool>>,
}

impl Default for CrawlerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlerBuilder {
    /// Creates a builder with all defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            user_agent: None,
            referer: None,
            auto_referer: false,
            timeout_ms: None,
            proxies: Vec::new(),
            cookie: None,
            headers: Vec::new(),
            repeat: 1,
            sleep_ms: 0,
            parallelism: DEFAULT_PARALLELISM,
            insecure_tls: false,
            max_get_retries: None,
            probe_url: None,
            output_dir: PathBuf::from(DiskStrategy::DEFAULT_DIR),
            naming: FileNaming::Random,
            strategy: None,
            tag_policy: None,
            pace: None,
            pool: None,
        }
    }

    /// Sets the User-Agent header value.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets a manual Referer header.
    #[must_use]
    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Derives the Referer from each target URL's origin. With this on,
    /// a manual [`referer`](Self::referer) is unnecessary.
    #[must_use]
    pub fn auto_referer(mut self) -> Self {
        self.auto_referer = true;
        self
    }

    /// Sets the uniform request timeout in milliseconds (must be positive).
    #[must_use]
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Adds a proxy to the pool. Only the first configured proxy is ever
    /// probed; see the proxy selection policy in [`crate::http`].
    #[must_use]
    pub fn proxy(mut self, proxy: ProxyServer) -> Self {
        self.proxies.push(proxy);
        self
    }

    /// Adds a list of proxies to the pool.
    #[must_use]
    pub fn proxy_pool(mut self, proxies: impl IntoIterator<Item = ProxyServer>) -> Self {
        self.proxies.extend(proxies);
        self
    }

    /// Attaches a session cookie.
    #[must_use]
    pub fn cookie(mut self, cookie: SessionCookie) -> Self {
        self.cookie = Some(cookie);
        self
    }

    /// Adds an arbitrary header. Insertion order is preserved; duplicate
    /// names (case-insensitive) are rejected at build time.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the repeat count for single-image downloads (default 1).
    /// Ignored when crawling pages.
    #[must_use]
    pub fn repeat(mut self, repeat: u32) -> Self {
        self.repeat = repeat;
        self
    }

    /// Sets the fixed pre-request pacing delay in milliseconds
    /// (default 0 = no pacing).
    #[must_use]
    pub fn sleep_ms(mut self, sleep_ms: u64) -> Self {
        self.sleep_ms = sleep_ms;
        self
    }

    /// Sets the fan-out parallelism (1-100, default 10).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParallelism`] when out of range.
    pub fn parallelism(mut self, parallelism: usize) -> Result<Self, ConfigError> {
        if !(MIN_PARALLELISM..=MAX_PARALLELISM).contains(&parallelism) {
            return Err(ConfigError::InvalidParallelism { value: parallelism });
        }
        self.parallelism = parallelism;
        Ok(self)
    }

    /// Accepts any TLS certificate and skips hostname verification.
    ///
    /// Deliberate trust-everything mode for scraping hosts with broken
    /// certificate chains. Off by default; turning it on trades away
    /// transport authentication for reach.
    #[must_use]
    pub fn insecure_tls(mut self) -> Self {
        self.insecure_tls = true;
        self
    }

    /// Overrides the transparent GET retry budget.
    #[must_use]
    pub fn max_get_retries(mut self, retries: u32) -> Self {
        self.max_get_retries = Some(retries);
        self
    }

    /// Overrides the proxy probe URL (useful in tests).
    #[must_use]
    pub fn probe_url(mut self, probe_url: impl Into<String>) -> Self {
        self.probe_url = Some(probe_url.into());
        self
    }

    /// Sets the output directory for the bundled disk strategy
    /// (default `images/`).
    #[must_use]
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the file-naming mode for the bundled disk strategy.
    #[must_use]
    pub fn naming(mut self, naming: FileNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Replaces the bundled disk strategy with a custom one.
    /// Takes precedence over [`output_dir`](Self::output_dir) and
    /// [`naming`](Self::naming).
    #[must_use]
    pub fn file_strategy(mut self, strategy: Arc<dyn FileStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Replaces the default tag-selection policy.
    #[must_use]
    pub fn tag_policy(mut self, policy: Box<dyn TagPolicy>) -> Self {
        self.tag_policy = Some(policy);
        self
    }

    /// Replaces the pacing policy built from [`sleep_ms`](Self::sleep_ms).
    #[must_use]
    pub fn pace_policy(mut self, pace: Arc<dyn PacePolicy>) -> Self {
        self.pace = Some(pace);
        self
    }

    /// Injects a connection pool instead of the process-wide shared one.
    #[must_use]
    pub fn pool(mut self, pool: Arc<ConnectionPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Validates the configuration and builds the session.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a non-positive timeout, a zero repeat
    /// count, or malformed headers.
    pub fn build(self) -> Result<Crawler, ConfigError> {
        if let Some(0) = self.timeout_ms {
            return Err(ConfigError::InvalidTimeout { ms: 0 });
        }
        if self.repeat == 0 {
            return Err(ConfigError::InvalidRepeat { value: 0 });
        }

        let mut headers = self.headers;
        if let Some(referer) = self.referer {
            headers.push(("Referer".to_string(), referer));
        }
        for (index, (name, _)) in headers.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyHeaderName);
            }
            let duplicated = headers[..index]
                .iter()
                .any(|(earlier, _)| earlier.eq_ignore_ascii_case(name));
            if duplicated {
                return Err(ConfigError::DuplicateHeader { name: name.clone() });
            }
        }

        let defaults = ClientConfig::default();
        let config = Arc::new(ClientConfig {
            timeout: Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)),
            proxies: self.proxies,
            cookie: self.cookie,
            headers,
            auto_referer: self.auto_referer,
            insecure_tls: self.insecure_tls,
            max_get_retries: self.max_get_retries.unwrap_or(defaults.max_get_retries),
            probe_url: self.probe_url.unwrap_or(defaults.probe_url),
            user_agent: self.user_agent.unwrap_or(defaults.user_agent),
        });

        let pool = self.pool.unwrap_or_else(ConnectionPool::shared);
        let executor = Arc::new(RequestExecutor::new(Arc::clone(&config), pool));

        let extractor = Arc::new(match self.tag_policy {
            Some(policy) => PageImageExtractor::with_policy(policy),
            None => PageImageExtractor::new(),
        });

        let strategy = self
            .strategy
            .unwrap_or_else(|| Arc::new(DiskStrategy::new(self.output_dir, self.naming)));

        let pace = self
            .pace
            .unwrap_or_else(|| Arc::new(FixedPace::new(Duration::from_millis(self.sleep_ms))));

        Ok(Crawler {
            config,
            executor,
            extractor,
            strategy,
            pace,
            repeat: self.repeat,
            parallelism: self.parallelism,
        })
    }
}

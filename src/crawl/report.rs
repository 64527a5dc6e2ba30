//! Per-item download results.
//!
//! Every operation returns explicit per-attempt results instead of
//! fire-and-forget logging, so callers (and tests) can tell exactly
//! which URLs succeeded without inspecting the filesystem.

use std::path::PathBuf;

use super::error::CrawlError;

/// Outcome of all attempts for one URL.
#[derive(Debug)]
pub struct DownloadReport {
    url: String,
    attempts: Vec<Result<PathBuf, CrawlError>>,
}

impl DownloadReport {
    pub(crate) fn new(url: impl Into<String>, attempts: Vec<Result<PathBuf, CrawlError>>) -> Self {
        Self {
            url: url.into(),
            attempts,
        }
    }

    /// Returns the downloaded URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns every attempt's outcome, in attempt order.
    #[must_use]
    pub fn attempts(&self) -> &[Result<PathBuf, CrawlError>] {
        &self.attempts
    }

    /// Returns the number of successful attempts.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.attempts.iter().filter(|a| a.is_ok()).count()
    }

    /// Returns the number of failed attempts.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.attempts.len() - self.succeeded()
    }
}

/// A page that could not be fetched or parsed during a crawl.
#[derive(Debug)]
pub struct PageFailure {
    /// The page URL.
    pub url: String,
    /// Why the page was skipped.
    pub error: CrawlError,
}

/// Aggregated outcome of a batch operation.
///
/// Reports appear in input order regardless of completion order.
#[derive(Debug, Default)]
pub struct BatchReport {
    reports: Vec<DownloadReport>,
    page_failures: Vec<PageFailure>,
}

impl BatchReport {
    pub(crate) fn new(reports: Vec<DownloadReport>, page_failures: Vec<PageFailure>) -> Self {
        Self {
            reports,
            page_failures,
        }
    }

    /// Returns the per-URL reports in input order.
    #[must_use]
    pub fn reports(&self) -> &[DownloadReport] {
        &self.reports
    }

    /// Returns pages that failed before extraction could run.
    #[must_use]
    pub fn page_failures(&self) -> &[PageFailure] {
        &self.page_failures
    }

    /// Total successful attempts across all URLs.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.reports.iter().map(DownloadReport::succeeded).sum()
    }

    /// Total failed attempts across all URLs.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.reports.iter().map(DownloadReport::failed).sum()
    }

    /// Total attempts across all URLs.
    #[must_use]
    pub fn total_attempts(&self) -> usize {
        self.completed() + self.failed()
    }

    /// Returns true when nothing was attempted and no page failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty() && self.page_failures.is_empty()
    }
}

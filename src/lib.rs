//! Picgrab Core Library
//!
//! This library fetches images - either directly from given URLs or by
//! crawling a web page to discover embedded image URLs - and persists
//! them to local storage.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`http`] - Pooled connection slots, lazy client construction with
//!   proxy health-checking, and the request executor
//! - [`extract`] - HTML parsing and image-URL extraction policies
//! - [`crawl`] - The client-facing crawler: repeat/sleep semantics,
//!   bounded parallel fan-out, page harvesting
//! - [`storage`] - File-naming strategies and the disk writer
//!
//! # Example
//!
//! ```no_run
//! use picgrab_core::Crawler;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let crawler = Crawler::builder()
//!     .auto_referer()
//!     .repeat(2)
//!     .sleep_ms(100)
//!     .build()?;
//!
//! let report = crawler.download_one("https://example.com/cat.jpg").await;
//! println!("succeeded attempts: {}", report.succeeded());
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod crawl;
pub mod extract;
pub mod http;
pub mod storage;

mod user_agent;

// Re-export commonly used types
pub use crawl::{
    BatchReport, ConfigError, CrawlError, Crawler, CrawlerBuilder, DEFAULT_PARALLELISM,
    DownloadReport, FixedPace, PacePolicy, PageFailure,
};
pub use extract::{ImgSrcPolicy, PageImageExtractor, TagPolicy};
pub use http::{
    ClientConfig, ConnectionPool, HttpError, PoolConfig, PoolLease, ProxyServer, RequestExecutor,
    ResponseHandle, SessionClient, SessionCookie,
};
pub use storage::{DiskStrategy, FileNaming, FileStrategy, StorageError, image_format_from_url};

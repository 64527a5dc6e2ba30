//! HTTP client management: pooled connection slots, lazy per-session
//! client construction with proxy health-checking, and request execution.
//!
//! # Overview
//!
//! Three layers, leaves first:
//! - [`ConnectionPool`] - process-wide, bounded connection-slot pool
//!   shared by all sessions; callers over a cap queue until a slot frees
//! - [`SessionClient`] - one lazily built `reqwest::Client` per crawl
//!   session; a configured proxy is probed once at construction and
//!   silently dropped if the probe fails
//! - [`RequestExecutor`] - issues GET/POST requests through the session
//!   client, attaching configured headers and returning a
//!   [`ResponseHandle`] that releases its pool lease on every exit path
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use picgrab_core::http::{ClientConfig, ConnectionPool, RequestExecutor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(ClientConfig::default());
//! let executor = RequestExecutor::new(config, ConnectionPool::shared());
//! let handle = executor.get("https://example.com/cat.jpg", &[]).await?;
//! let bytes = handle.bytes().await?;
//! println!("fetched {} bytes", bytes.len());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
mod executor;
mod pool;

pub use client::{ClientConfig, ProxyServer, SessionClient, SessionCookie};
pub use error::HttpError;
pub use executor::{RequestExecutor, ResponseHandle};
pub use pool::{ConnectionPool, PoolConfig, PoolLease};

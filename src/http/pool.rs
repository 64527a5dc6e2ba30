//! Bounded connection-slot pool shared by all crawl sessions.
//!
//! This module provides the [`ConnectionPool`] struct which caps how many
//! requests may hold a transport connection at once, both in total and per
//! destination. Actual socket reuse is handled by the reqwest client; the
//! pool governs the concurrency envelope around it.
//!
//! # Overview
//!
//! Each request acquires a [`PoolLease`] before it is sent: first a slot
//! from the total budget, then one from the per-destination budget keyed
//! by `(scheme, host, port)`. Callers over either cap queue on the
//! corresponding semaphore until a slot frees. The lease returns both
//! slots when dropped, so release is guaranteed on every exit path,
//! including failures mid-stream.
//!
//! # Example
//!
//! ```
//! use picgrab_core::http::{ConnectionPool, PoolConfig};
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = ConnectionPool::new(PoolConfig::default());
//! let url = Url::parse("https://example.com/cat.jpg")?;
//! let lease = pool.acquire(&url).await?;
//! // ... issue the request while holding the lease
//! drop(lease); // both slots return to the pool
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{DEFAULT_MAX_PER_DESTINATION, DEFAULT_MAX_TOTAL_CONNECTIONS};
use super::error::HttpError;

/// Connection-slot caps for a [`ConnectionPool`].
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Maximum slots across all destinations.
    pub max_total: usize,
    /// Maximum slots per `(scheme, host, port)` destination.
    pub max_per_destination: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_total: DEFAULT_MAX_TOTAL_CONNECTIONS,
            max_per_destination: DEFAULT_MAX_PER_DESTINATION,
        }
    }
}

/// Process-wide pool of connection slots.
///
/// Designed to be wrapped in `Arc` and shared by every session in the
/// process. The [`ConnectionPool::shared`] accessor provides an
/// init-once process default; tests and embedders inject their own pool
/// through the crawler builder instead of relying on global state.
///
/// # Thread Safety
///
/// `ConnectionPool` is `Send + Sync`. The per-destination registry uses
/// `DashMap`; slot accounting uses tokio semaphores.
#[derive(Debug)]
pub struct ConnectionPool {
    config: PoolConfig,
    /// Total-budget semaphore. Shared `Arc` so leases can hold owned permits.
    total: Arc<Semaphore>,
    /// Per-destination semaphores, created on first use.
    per_destination: DashMap<String, Arc<Semaphore>>,
}

/// Process-wide default pool, created on first use and never torn down.
static SHARED_POOL: OnceLock<Arc<ConnectionPool>> = OnceLock::new();

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl ConnectionPool {
    /// Creates a new pool with the given caps.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        debug!(
            max_total = config.max_total,
            max_per_destination = config.max_per_destination,
            "creating connection pool"
        );
        Self {
            config,
            total: Arc::new(Semaphore::new(config.max_total)),
            per_destination: DashMap::new(),
        }
    }

    /// Returns the process-wide shared pool, initializing it with default
    /// caps on first call.
    pub fn shared() -> Arc<Self> {
        Arc::clone(SHARED_POOL.get_or_init(|| Arc::new(Self::default())))
    }

    /// Acquires a connection slot for the given URL's destination.
    ///
    /// Waits until both a total slot and a per-destination slot are
    /// available. The returned lease gives both slots back when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::PoolClosed`] if a semaphore is closed while
    /// waiting (only possible during process teardown).
    #[instrument(skip(self), fields(destination))]
    pub async fn acquire(&self, url: &Url) -> Result<PoolLease, HttpError> {
        let destination = destination_key(url);
        tracing::Span::current().record("destination", destination.as_str());

        let total = Arc::clone(&self.total)
            .acquire_owned()
            .await
            .map_err(|_| HttpError::PoolClosed)?;

        // Clone the Arc out of the registry entry so the DashMap shard
        // lock is released before awaiting on the semaphore.
        let destination_semaphore = self
            .per_destination
            .entry(destination.clone())
            .or_insert_with(|| Arc::new(Semaphore::new(self.config.max_per_destination)))
            .clone();

        let per_destination = destination_semaphore
            .acquire_owned()
            .await
            .map_err(|_| HttpError::PoolClosed)?;

        Ok(PoolLease {
            destination,
            _total: total,
            _per_destination: per_destination,
        })
    }

    /// Returns the number of free slots in the total budget.
    ///
    /// Useful for asserting that every lease was returned (leak checks).
    #[must_use]
    pub fn available_total(&self) -> usize {
        self.total.available_permits()
    }

    /// Returns the configured caps.
    #[must_use]
    pub fn config(&self) -> PoolConfig {
        self.config
    }
}

/// A checked-out connection slot.
///
/// Dropping the lease returns both the total and per-destination slots.
/// Requests hold their lease for the lifetime of the response body, so a
/// failure mid-stream still releases the slot exactly once.
#[derive(Debug)]
pub struct PoolLease {
    destination: String,
    _total: OwnedSemaphorePermit,
    _per_destination: OwnedSemaphorePermit,
}

impl PoolLease {
    /// Returns the `(scheme, host, port)` destination key this lease is for.
    #[must_use]
    pub fn destination(&self) -> &str {
        &self.destination
    }
}

/// Builds the destination key for a URL: `scheme://host:port`.
///
/// The port falls back to the scheme's well-known default, so
/// `https://example.com/` and `https://example.com:443/` share a key.
fn destination_key(url: &Url) -> String {
    let scheme = url.scheme();
    let host = url.host_str().unwrap_or("unknown");
    match url.port_or_known_default() {
        Some(port) => format!("{scheme}://{host}:{port}"),
        None => format!("{scheme}://{host}"),
    }
}

//! Constants for the HTTP layer (timeouts, pool caps, proxy probing).

use std::time::Duration;

/// Default uniform timeout for connect and read phases (20 seconds).
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;

/// Default maximum connection slots across all destinations.
pub const DEFAULT_MAX_TOTAL_CONNECTIONS: usize = 200;

/// Default maximum connection slots per destination.
pub const DEFAULT_MAX_PER_DESTINATION: usize = 20;

/// Default transparent retry budget for GET requests on transient I/O
/// failure. POST is never retried (non-idempotent).
pub const DEFAULT_MAX_GET_RETRIES: u32 = 2;

/// Well-known URL fetched through a candidate proxy to validate it.
/// Probe success criterion is a response status of exactly 200.
pub const DEFAULT_PROBE_URL: &str = "http://www.example.com/";

/// Upper bound for the random pause between GET retry attempts.
pub const RETRY_JITTER_MAX: Duration = Duration::from_millis(250);

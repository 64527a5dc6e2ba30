//! JSON profile loading for CLI defaults.
//!
//! A profile supplies defaults for the crawl configuration surface;
//! explicit CLI flags win over profile values.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// JSON-backed profile for picgrab defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Default User-Agent.
    pub user_agent: Option<String>,
    /// Default manual Referer.
    pub referer: Option<String>,
    /// Derive the Referer from each target URL's origin.
    pub auto_referer: Option<bool>,
    /// Uniform request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Proxy pool; only the first entry is health-checked.
    pub proxies: Vec<ProxyEntry>,
    /// Session cookie.
    pub cookie: Option<CookieEntry>,
    /// Extra request headers, in order.
    pub headers: Vec<HeaderEntry>,
    /// Repeat count for single-image downloads.
    pub repeat: Option<u32>,
    /// Fixed delay before every download attempt, in milliseconds.
    pub sleep_ms: Option<u64>,
    /// Maximum concurrent downloads (1-100).
    pub parallelism: Option<u8>,
    /// Accept any TLS certificate and skip hostname verification.
    pub insecure_tls: Option<bool>,
    /// Output directory for downloaded images.
    pub output_dir: Option<PathBuf>,
}

/// A proxy endpoint in a profile.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyEntry {
    /// Proxy host name or address.
    pub host: String,
    /// Proxy port.
    pub port: u16,
}

/// A session cookie in a profile.
#[derive(Debug, Clone, Deserialize)]
pub struct CookieEntry {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Domain the cookie is scoped to.
    pub domain: String,
}

/// A request header in a profile.
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderEntry {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

impl FileConfig {
    /// Loads and validates a profile from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates profile values against the same constraints as the CLI.
    pub fn validate(&self) -> Result<()> {
        if let Some(0) = self.timeout_ms {
            bail!("Invalid config value for `timeout_ms`: 0. Must be positive");
        }
        if let Some(0) = self.repeat {
            bail!("Invalid config value for `repeat`: 0. Must be at least 1");
        }
        if let Some(parallelism) = self.parallelism
            && !(1..=100).contains(&parallelism)
        {
            bail!("Invalid config value for `parallelism`: {parallelism}. Expected range: 1..=100");
        }
        Ok(())
    }
}

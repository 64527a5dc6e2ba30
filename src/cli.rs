//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};

use picgrab_core::ProxyServer;

/// Fetch images from URLs, or crawl pages for the images they embed.
///
/// Picgrab downloads the given image URLs in parallel, or - with
/// `--pages` - fetches each URL as an HTML page, extracts the image URLs
/// it references, and downloads those instead.
#[derive(Parser, Debug)]
#[command(name = "picgrab")]
#[command(author, version, about)]
pub struct Args {
    /// Image URLs to download, or page URLs with --pages.
    /// Reads URLs from stdin (one per line) when none are given.
    pub urls: Vec<String>,

    /// Treat the given URLs as pages to crawl for images
    #[arg(long)]
    pub pages: bool,

    /// Output directory for downloaded images (default: images/)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Download each image URL this many times (ignored with --pages)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub repeat: Option<u32>,

    /// Fixed delay before every download attempt, in milliseconds
    #[arg(long, value_name = "MS")]
    pub sleep_ms: Option<u64>,

    /// Uniform request timeout in milliseconds
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_ms: Option<u64>,

    /// Custom User-Agent header
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Manual Referer header (forces GET for image requests)
    #[arg(long)]
    pub referer: Option<String>,

    /// Derive the Referer from each target URL's origin
    #[arg(long)]
    pub auto_referer: bool,

    /// Proxy endpoint (repeatable; only the first is health-checked)
    #[arg(long, value_name = "HOST:PORT")]
    pub proxy: Vec<String>,

    /// Session cookie (requires --cookie-domain)
    #[arg(long, value_name = "NAME=VALUE")]
    pub cookie: Option<String>,

    /// Domain the session cookie is scoped to
    #[arg(long, value_name = "DOMAIN")]
    pub cookie_domain: Option<String>,

    /// Extra request header (repeatable)
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
    pub headers: Vec<String>,

    /// File-naming mode for downloaded images
    #[arg(long, value_enum, default_value_t = NamingMode::Random)]
    pub naming: NamingMode,

    /// Fixed output file name (implies --naming literal)
    #[arg(long)]
    pub name: Option<String>,

    /// Maximum concurrent downloads (1-100)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub parallelism: Option<u8>,

    /// Accept any TLS certificate and skip hostname verification
    #[arg(long)]
    pub insecure: bool,

    /// JSON profile supplying defaults for these flags
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

/// CLI surface of the library's file-naming modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NamingMode {
    /// Random UUID-derived names.
    Random,
    /// Monotonically increasing counter.
    Increment,
    /// A fixed name supplied with --name.
    Literal,
}

/// Parses a `HOST:PORT` proxy argument.
pub fn parse_proxy(raw: &str) -> Result<ProxyServer> {
    let (host, port) = raw
        .rsplit_once(':')
        .with_context(|| format!("invalid proxy `{raw}`: expected HOST:PORT"))?;
    if host.is_empty() {
        bail!("invalid proxy `{raw}`: empty host");
    }
    let port: u16 = port
        .parse()
        .with_context(|| format!("invalid proxy `{raw}`: bad port"))?;
    Ok(ProxyServer::new(host, port))
}

/// Parses a `NAME=VALUE` cookie argument.
pub fn parse_cookie(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once('=')
        .with_context(|| format!("invalid cookie `{raw}`: expected NAME=VALUE"))?;
    if name.trim().is_empty() {
        bail!("invalid cookie `{raw}`: empty name");
    }
    Ok((name.trim().to_string(), value.to_string()))
}

/// Parses a `Name: value` header argument.
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .with_context(|| format!("invalid header `{raw}`: expected `Name: value`"))?;
    if name.trim().is_empty() {
        bail!("invalid header `{raw}`: empty name");
    }
    Ok((name.trim().to_string(), value.trim().to_string()))
}

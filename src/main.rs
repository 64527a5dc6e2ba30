//! CLI entry point for picgrab.

use std::io::{self, IsTerminal, Read};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::ProgressBar;
use picgrab_core::{BatchReport, Crawler, FileNaming, ProxyServer, SessionCookie};
use tracing::{debug, info, warn};

mod app_config;
mod cli;

use app_config::FileConfig;
use cli::{Args, NamingMode};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let file_config = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    let urls = gather_urls(&args)?;
    if urls.is_empty() {
        info!("No URLs provided. Pipe URLs via stdin or pass as arguments.");
        info!("Example: picgrab https://example.com/cat.jpg");
        info!("Example: picgrab --pages https://example.com/gallery.html");
        return Ok(());
    }

    let crawler = build_crawler(&args, &file_config)?;

    info!(
        urls = urls.len(),
        pages = args.pages,
        "picgrab starting"
    );

    let spinner = (!args.quiet).then(|| {
        let spinner = ProgressBar::new_spinner();
        spinner.set_message(if args.pages {
            format!("crawling {} page(s)", urls.len())
        } else {
            format!("downloading {} image(s)", urls.len())
        });
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner
    });

    let report = if args.pages {
        crawler.download_pages(&urls).await
    } else {
        crawler.download_many(&urls).await
    };

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    summarize(&report)
}

/// Prints the batch outcome and decides the exit status.
fn summarize(report: &BatchReport) -> Result<()> {
    for failure in report.page_failures() {
        warn!(url = %failure.url, error = %failure.error, "page failed");
    }

    info!(
        completed = report.completed(),
        failed = report.failed(),
        pages_failed = report.page_failures().len(),
        "crawl complete"
    );

    if report.total_attempts() > 0 && report.completed() == 0 {
        bail!("all downloads failed");
    }
    if report.reports().is_empty() && !report.page_failures().is_empty() {
        bail!("no images could be extracted");
    }
    Ok(())
}

/// Collects URLs from positional arguments or stdin (one per line).
fn gather_urls(args: &Args) -> Result<Vec<String>> {
    if !args.urls.is_empty() {
        return Ok(args.urls.clone());
    }
    if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect());
    }
    Ok(Vec::new())
}

/// Builds the crawl session from CLI flags over profile defaults.
fn build_crawler(args: &Args, file: &FileConfig) -> Result<Crawler> {
    let mut builder = Crawler::builder();

    if let Some(user_agent) = args.user_agent.clone().or_else(|| file.user_agent.clone()) {
        builder = builder.user_agent(user_agent);
    }
    if let Some(referer) = args.referer.clone().or_else(|| file.referer.clone()) {
        builder = builder.referer(referer);
    }
    if args.auto_referer || file.auto_referer.unwrap_or(false) {
        builder = builder.auto_referer();
    }
    if let Some(timeout_ms) = args.timeout_ms.or(file.timeout_ms) {
        builder = builder.timeout_ms(timeout_ms);
    }

    if args.proxy.is_empty() {
        for entry in &file.proxies {
            builder = builder.proxy(ProxyServer::new(entry.host.clone(), entry.port));
        }
    } else {
        for raw in &args.proxy {
            builder = builder.proxy(cli::parse_proxy(raw)?);
        }
    }

    if let Some(raw) = &args.cookie {
        let domain = args
            .cookie_domain
            .as_deref()
            .context("--cookie requires --cookie-domain")?;
        let (name, value) = cli::parse_cookie(raw)?;
        builder = builder.cookie(SessionCookie::new(name, value, domain));
    } else if let Some(entry) = &file.cookie {
        builder = builder.cookie(SessionCookie::new(
            entry.name.clone(),
            entry.value.clone(),
            entry.domain.clone(),
        ));
    }

    let mut cli_header_names = Vec::new();
    for raw in &args.headers {
        let (name, value) = cli::parse_header(raw)?;
        cli_header_names.push(name.to_ascii_lowercase());
        builder = builder.header(name, value);
    }
    for entry in &file.headers {
        // Profile headers only fill gaps the CLI left open.
        if !cli_header_names.contains(&entry.name.to_ascii_lowercase()) {
            builder = builder.header(entry.name.clone(), entry.value.clone());
        }
    }

    builder = builder.repeat(args.repeat.or(file.repeat).unwrap_or(1));
    builder = builder.sleep_ms(args.sleep_ms.or(file.sleep_ms).unwrap_or(0));

    if let Some(parallelism) = args.parallelism.or(file.parallelism) {
        builder = builder.parallelism(usize::from(parallelism))?;
    }

    if args.insecure || file.insecure_tls.unwrap_or(false) {
        builder = builder.insecure_tls();
    }

    if let Some(output) = args.output.clone().or_else(|| file.output_dir.clone()) {
        builder = builder.output_dir(output);
    }

    let naming = match (&args.name, args.naming) {
        (Some(name), _) => FileNaming::Literal(name.clone()),
        (None, NamingMode::Random) => FileNaming::Random,
        (None, NamingMode::Increment) => FileNaming::AutoIncrement,
        (None, NamingMode::Literal) => bail!("--naming literal requires --name"),
    };
    builder = builder.naming(naming);

    Ok(builder.build()?)
}

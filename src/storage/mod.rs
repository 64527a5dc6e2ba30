//! File-naming strategies and the disk writer.
//!
//! The orchestrator hands every successfully fetched body to a
//! [`FileStrategy`] collaborator, which decides the destination path and
//! performs the write. The bundled [`DiskStrategy`] supports three naming
//! modes; embedders swap in their own strategy for anything else.
//!
//! Path collisions are the strategy's concern: the bundled modes either
//! cannot collide (random, auto-increment) or overwrite by design
//! (literal - see [`FileNaming::Literal`]).

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Fallback extension when the URL does not reveal an image format.
const DEFAULT_EXTENSION: &str = "jpg";

/// Errors that can occur while persisting a downloaded image.
#[derive(Debug, Error)]
pub enum StorageError {
    /// File system error (create dir, write, etc.)
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    /// Creates an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Decides where a downloaded image is written, and writes it.
///
/// Called once per successful download attempt. Implementations must be
/// safe for concurrent use by the session's workers.
#[async_trait]
pub trait FileStrategy: Send + Sync {
    /// Persists `bytes` fetched from `url` and returns the written path.
    ///
    /// `attempt` is the 1-indexed attempt number within a repeated
    /// download; strategies may fold it into the name or ignore it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the write fails.
    async fn store(&self, url: &str, bytes: &[u8], attempt: u32) -> Result<PathBuf, StorageError>;
}

/// File-naming mode for [`DiskStrategy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileNaming {
    /// Random UUID-derived name; collision-free across attempts.
    Random,
    /// Monotonically increasing counter per strategy instance.
    AutoIncrement,
    /// A fixed name. Only idempotent-safe at repeat = 1: repeated
    /// attempts overwrite the same file. Caller responsibility,
    /// documented, not enforced.
    Literal(String),
}

/// Writes images into a directory using a [`FileNaming`] mode.
///
/// The extension is sniffed from the URL (see [`image_format_from_url`])
/// and falls back to `jpg` when the URL reveals nothing.
#[derive(Debug)]
pub struct DiskStrategy {
    dir: PathBuf,
    naming: FileNaming,
    counter: AtomicU64,
}

impl DiskStrategy {
    /// Default output directory when none is configured.
    pub const DEFAULT_DIR: &'static str = "images";

    /// Creates a strategy writing into `dir` with the given naming mode.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, naming: FileNaming) -> Self {
        Self {
            dir: dir.into(),
            naming,
            counter: AtomicU64::new(0),
        }
    }

    /// Returns the output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(&self, url: &str) -> String {
        let extension = image_format_from_url(url).unwrap_or(DEFAULT_EXTENSION);
        match &self.naming {
            FileNaming::Random => format!("{}.{extension}", Uuid::new_v4().simple()),
            FileNaming::AutoIncrement => {
                let next = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
                format!("{next}.{extension}")
            }
            FileNaming::Literal(name) => name.clone(),
        }
    }
}

#[async_trait]
impl FileStrategy for DiskStrategy {
    async fn store(&self, url: &str, bytes: &[u8], attempt: u32) -> Result<PathBuf, StorageError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::io(self.dir.clone(), e))?;

        let path = self.dir.join(self.file_name(url));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StorageError::io(path.clone(), e))?;

        debug!(path = %path.display(), bytes = bytes.len(), attempt, "image written");
        Ok(path)
    }
}

/// Sniffs the image format from a URL.
///
/// Returns the first recognized extension occurring in the URL string
/// (query strings included, matching how image CDNs embed format hints),
/// or `None` when nothing matches.
///
/// # Examples
///
/// ```
/// use picgrab_core::storage::image_format_from_url;
///
/// assert_eq!(image_format_from_url("http://a.com/cat.jpg"), Some("jpg"));
/// assert_eq!(image_format_from_url("http://a.com/x?f=b.webp"), Some("webp"));
/// assert_eq!(image_format_from_url("http://a.com/page"), None);
/// ```
#[must_use]
pub fn image_format_from_url(url: &str) -> Option<&'static str> {
    let captures = image_extension_pattern().captures(url)?;
    match captures.get(1)?.as_str() {
        "jpeg" => Some("jpeg"),
        "jpg" => Some("jpg"),
        "gif" => Some("gif"),
        "bmp" => Some("bmp"),
        "png" => Some("png"),
        "webp" => Some("webp"),
        "svg" => Some("svg"),
        _ => None,
    }
}

#[allow(clippy::expect_used)]
fn image_extension_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\.(jpeg|jpg|gif|bmp|png|webp|svg)")
            .expect("static image extension pattern is valid")
    })
}

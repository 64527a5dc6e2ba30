//! HTML parsing and image-URL extraction.
//!
//! This module turns a fetched page body into the ordered list of image
//! URLs it references. Parsing uses the lenient html5ever tree builder
//! behind the `scraper` crate, so malformed markup degrades to best-effort
//! partial extraction instead of failing the page.
//!
//! Which elements and attributes denote images is a policy decision,
//! delegated to the [`TagPolicy`] collaborator. The default policy reads
//! `img` elements' `src` attributes; embedders supply their own policy to
//! cover lazy-loading attributes, galleries, and the like.
//!
//! # Ordering and duplicates
//!
//! The extractor preserves document order and keeps duplicate URLs;
//! deduplication is explicitly out of scope. Empty or whitespace-only
//! attribute values are skipped.

use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

/// Selects which attribute values in a parsed document denote images.
///
/// Implementations must be pure: same document in, same URL list out,
/// in document order.
pub trait TagPolicy: Send + Sync {
    /// Returns the raw image URL candidates in document order.
    fn image_urls(&self, document: &Html) -> Vec<String>;
}

/// Default policy: `src` attributes of `img` elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImgSrcPolicy;

impl TagPolicy for ImgSrcPolicy {
    fn image_urls(&self, document: &Html) -> Vec<String> {
        let Ok(selector) = Selector::parse("img") else {
            return Vec::new();
        };
        document
            .select(&selector)
            .filter_map(|element| element.value().attr("src"))
            .map(str::trim)
            .filter(|src| !src.is_empty())
            .map(ToString::to_string)
            .collect()
    }
}

/// Extracts image URLs from HTML documents via a [`TagPolicy`].
pub struct PageImageExtractor {
    policy: Box<dyn TagPolicy>,
}

impl Default for PageImageExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PageImageExtractor {
    /// Creates an extractor with the default [`ImgSrcPolicy`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(Box::new(ImgSrcPolicy))
    }

    /// Creates an extractor with a custom tag-selection policy.
    #[must_use]
    pub fn with_policy(policy: Box<dyn TagPolicy>) -> Self {
        Self { policy }
    }

    /// Parses `html` and returns the referenced image URLs in document
    /// order, duplicates preserved.
    ///
    /// When `base` is given, relative URLs are resolved against it;
    /// candidates that resolve to nothing fetchable are skipped. Parsing
    /// never fails - malformed markup yields whatever the tree builder
    /// could recover.
    #[must_use]
    pub fn extract(&self, html: &str, base: Option<&Url>) -> Vec<String> {
        let document = Html::parse_document(html);
        let candidates = self.policy.image_urls(&document);
        let resolved: Vec<String> = candidates
            .iter()
            .filter_map(|raw| resolve_candidate(raw, base))
            .collect();
        debug!(
            candidates = candidates.len(),
            resolved = resolved.len(),
            "extracted image URLs"
        );
        resolved
    }
}

/// Resolves a raw candidate into an absolute URL string.
///
/// Absolute candidates are normalized by the URL parser (which also
/// percent-encodes raw unsafe characters). Relative candidates are
/// joined against the page URL when one is available.
fn resolve_candidate(raw: &str, base: Option<&Url>) -> Option<String> {
    match Url::parse(raw) {
        Ok(absolute) => Some(absolute.into()),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            base.and_then(|b| b.join(raw).ok()).map(Into::into)
        }
        Err(_) => None,
    }
}

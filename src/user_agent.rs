//! Shared User-Agent string for all crawl traffic.
//!
//! Single source for project URL and UA format so every session identifies
//! itself consistently (good citizenship; RFC 9308).

/// Project URL for User-Agent identification (good citizenship; RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fierce/picgrab";

/// Default User-Agent for crawl requests (identifies the tool).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("picgrab/{version} (image-crawler; +{PROJECT_UA_URL})")
}

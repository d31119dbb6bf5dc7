//! Error taxonomy for the crawl pipeline.
//!
//! Every variant here is recoverable somewhere up the stack: selector misses
//! fall back to alternate selectors, navigation timeouts degrade a story to a
//! placeholder, storage failures are logged at the call site. Only the binary's
//! file-writing edges use `Box<dyn Error>`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The page did not load within the navigation budget.
    #[error("navigation to {url} timed out after {timeout_ms}ms")]
    NavigationTimeout { url: String, timeout_ms: u64 },

    /// Transport failure or non-success status while loading a page.
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// A bounded selector wait ended without a match.
    #[error("selector `{selector}` not found within {timeout_ms}ms")]
    SelectorNotFound { selector: String, timeout_ms: u64 },

    /// A story URL could not be reduced to its canonical form.
    #[error("cannot normalize url \"{url}\": {reason}")]
    Normalization { url: String, reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Anything else that went wrong while extracting a story.
    #[error("extraction failed: {0}")]
    Extraction(String),
}

impl ScrapeError {
    /// `true` when the error came from the navigation budget running out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ScrapeError::NavigationTimeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

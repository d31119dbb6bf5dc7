//! Page driver capability used by the extraction pipeline.
//!
//! The pipeline never talks to an automation engine directly. It sees a
//! [`PageDriver`]: something that can load a URL, wait (boundedly) for a
//! selector, and hand back element snapshots. The production implementation is
//! [`http::HttpPageDriver`]; tests use [`fake::FakeDriver`].
//!
//! | Operation | Failure |
//! |-----------|---------|
//! | `navigate` | [`ScrapeError::NavigationTimeout`] or [`ScrapeError::Navigation`] |
//! | `wait_for_selector` | [`ScrapeError::SelectorNotFound`] |
//! | `query_all` | never fails, returns an empty list |
//!
//! [`ScrapeError::NavigationTimeout`]: crate::error::ScrapeError::NavigationTimeout
//! [`ScrapeError::Navigation`]: crate::error::ScrapeError::Navigation
//! [`ScrapeError::SelectorNotFound`]: crate::error::ScrapeError::SelectorNotFound

use std::collections::HashMap;
use std::time::Duration;

use crate::error::Result;

pub mod dom;
#[cfg(test)]
pub mod fake;
pub mod http;

/// How long navigation waits before the page counts as loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    /// DOM parsed; secondary resources may still be loading.
    ContentLoaded,
    /// No network activity left.
    AllIdle,
}

/// A detached snapshot of one element of the current page.
///
/// Snapshots are plain data, so they stay valid after the driver navigates
/// elsewhere and can be held across await points.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageElement {
    pub(crate) attrs: HashMap<String, String>,
    pub(crate) text: String,
    pub(crate) outer_html: String,
}

impl PageElement {
    /// Attribute value, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Rendered text content; empty when the element has none.
    pub fn inner_text(&self) -> &str {
        &self.text
    }

    /// All descendants (or the element itself) matching `selector`, in document order.
    pub fn query_all(&self, selector: &str) -> Vec<PageElement> {
        dom::select_fragment(&self.outer_html, selector)
    }

    /// First match of `selector` inside this element.
    pub fn query(&self, selector: &str) -> Option<PageElement> {
        self.query_all(selector).into_iter().next()
    }
}

/// Browser-like page session.
///
/// A driver holds exactly one current page; every `navigate` replaces it.
pub trait PageDriver {
    /// Load `url`, giving up after `timeout`.
    async fn navigate(&mut self, url: &str, wait: WaitPolicy, timeout: Duration) -> Result<()>;

    /// Succeed once `selector` matches something on the current page.
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<()>;

    /// Every element matching `selector`, in document order.
    async fn query_all(&self, selector: &str) -> Vec<PageElement>;

    /// First element matching `selector`.
    async fn query(&self, selector: &str) -> Option<PageElement> {
        self.query_all(selector).await.into_iter().next()
    }

    /// URL of the page currently loaded, if any.
    fn current_url(&self) -> Option<&str>;
}

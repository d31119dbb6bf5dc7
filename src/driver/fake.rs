//! In-memory [`PageDriver`] serving canned HTML by URL.

use std::collections::HashMap;
use std::time::Duration;

use super::{PageDriver, PageElement, WaitPolicy, dom};
use crate::error::{Result, ScrapeError};

#[derive(Debug, Clone)]
pub enum FakePage {
    Html(String),
    Timeout,
    Fail,
    Panic,
}

#[derive(Debug, Default)]
pub struct FakeDriver {
    pages: HashMap<String, FakePage>,
    current: Option<(String, String)>,
    /// Every URL passed to `navigate`, in order.
    pub visits: Vec<String>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), FakePage::Html(html.to_string()));
        self
    }

    pub fn timeout(mut self, url: &str) -> Self {
        self.pages.insert(url.to_string(), FakePage::Timeout);
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.pages.insert(url.to_string(), FakePage::Fail);
        self
    }

    pub fn panicking(mut self, url: &str) -> Self {
        self.pages.insert(url.to_string(), FakePage::Panic);
        self
    }

    pub fn visit_count(&self, url: &str) -> usize {
        self.visits.iter().filter(|v| v.as_str() == url).count()
    }
}

impl PageDriver for FakeDriver {
    async fn navigate(&mut self, url: &str, _wait: WaitPolicy, timeout: Duration) -> Result<()> {
        self.visits.push(url.to_string());
        self.current = None;
        match self.pages.get(url) {
            Some(FakePage::Html(html)) => {
                self.current = Some((url.to_string(), html.clone()));
                Ok(())
            }
            Some(FakePage::Timeout) => Err(ScrapeError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
            Some(FakePage::Panic) => panic!("driver crashed while loading {url}"),
            Some(FakePage::Fail) | None => Err(ScrapeError::Navigation {
                url: url.to_string(),
                reason: "HTTP 404".to_string(),
            }),
        }
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        match &self.current {
            Some((_, html)) if dom::has_match(html, selector) => Ok(()),
            _ => Err(ScrapeError::SelectorNotFound {
                selector: selector.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    async fn query_all(&self, selector: &str) -> Vec<PageElement> {
        match &self.current {
            Some((_, html)) => dom::select_document(html, selector),
            None => Vec::new(),
        }
    }

    fn current_url(&self) -> Option<&str> {
        self.current.as_ref().map(|(url, _)| url.as_str())
    }
}

//! HTTP-backed page driver.
//!
//! Pages are fetched either directly with `reqwest` or, when a Browserless
//! endpoint is configured, through its `/content` API so that script-rendered
//! markup is returned. The fetched HTML becomes the current page and selectors
//! are evaluated against it with `scraper`.
//!
//! The snapshot never changes after it is loaded, so a selector wait is a
//! single presence check: it either matches now or it never will.

use std::time::Duration;

use rand::seq::IndexedRandom;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use serde_json::json;
use tracing::{debug, instrument, warn};

use super::{PageDriver, PageElement, WaitPolicy, dom};
use crate::error::{Result, ScrapeError};

/// Desktop user agents; one is picked per driver.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
];

/// Pick a user agent at random.
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// A Browserless instance used for rendering.
#[derive(Debug, Clone)]
pub struct Browserless {
    pub base_url: String,
    pub token: Option<String>,
}

impl Browserless {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        }
    }

    fn content_endpoint(&self) -> String {
        match &self.token {
            Some(token) => format!("{}/content?token={token}", self.base_url),
            None => format!("{}/content", self.base_url),
        }
    }
}

#[derive(Debug)]
struct LoadedPage {
    url: String,
    html: String,
}

/// [`PageDriver`] over plain HTTP.
#[derive(Debug)]
pub struct HttpPageDriver {
    client: reqwest::Client,
    browserless: Option<Browserless>,
    page: Option<LoadedPage>,
}

impl HttpPageDriver {
    /// Build a driver sending `user_agent` and Russian-first language headers.
    pub fn new(user_agent: &str, browserless: Option<Browserless>) -> reqwest::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("ru-RU,ru;q=0.9,en;q=0.8"),
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            browserless,
            page: None,
        })
    }

    fn request(&self, url: &str, wait: WaitPolicy, timeout: Duration) -> reqwest::RequestBuilder {
        let builder = match &self.browserless {
            Some(browserless) => {
                let wait_until = match wait {
                    WaitPolicy::ContentLoaded => "domcontentloaded",
                    WaitPolicy::AllIdle => "networkidle2",
                };
                self.client.post(browserless.content_endpoint()).json(&json!({
                    "url": url,
                    "gotoOptions": {
                        "waitUntil": wait_until,
                        "timeout": browserless_goto_timeout(timeout).as_millis() as u64,
                    },
                }))
            }
            None => self.client.get(url),
        };
        builder.timeout(timeout)
    }
}

/// Headroom left between Browserless giving up and our request giving up.
const BROWSERLESS_TIMEOUT_MARGIN: Duration = Duration::from_secs(1);

/// Navigation budget handed to Browserless: shorter than the HTTP timeout so
/// a slow page comes back as a 408 instead of racing the client timeout.
fn browserless_goto_timeout(timeout: Duration) -> Duration {
    timeout
        .saturating_sub(BROWSERLESS_TIMEOUT_MARGIN)
        .max(timeout / 2)
}

/// 408 from Browserless and 504 from a gateway both mean the page ran out of time.
fn status_error(url: &str, timeout: Duration, status: StatusCode) -> ScrapeError {
    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            ScrapeError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }
        }
        _ => ScrapeError::Navigation {
            url: url.to_string(),
            reason: format!("HTTP {}", status.as_u16()),
        },
    }
}

fn transport_error(url: &str, timeout: Duration, e: reqwest::Error) -> ScrapeError {
    if e.is_timeout() {
        ScrapeError::NavigationTimeout {
            url: url.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        ScrapeError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

impl PageDriver for HttpPageDriver {
    #[instrument(level = "debug", skip(self), fields(browserless = self.browserless.is_some()))]
    async fn navigate(&mut self, url: &str, wait: WaitPolicy, timeout: Duration) -> Result<()> {
        self.page = None;

        let response = self
            .request(url, wait, timeout)
            .send()
            .await
            .map_err(|e| transport_error(url, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "Page returned non-success status");
            return Err(status_error(url, timeout, status));
        }

        let final_url = if self.browserless.is_some() {
            url.to_string()
        } else {
            response.url().to_string()
        };
        let html = response
            .text()
            .await
            .map_err(|e| transport_error(url, timeout, e))?;

        debug!(%final_url, bytes = html.len(), "Page loaded");
        self.page = Some(LoadedPage {
            url: final_url,
            html,
        });
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        let found = self
            .page
            .as_ref()
            .is_some_and(|page| dom::has_match(&page.html, selector));
        if found {
            Ok(())
        } else {
            Err(ScrapeError::SelectorNotFound {
                selector: selector.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }

    async fn query_all(&self, selector: &str) -> Vec<PageElement> {
        match &self.page {
            Some(page) => dom::select_document(&page.html, selector),
            None => Vec::new(),
        }
    }

    fn current_url(&self) -> Option<&str> {
        self.page.as_ref().map(|page| page.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const STORY_HTML: &str = r#"<html><body><h1>Headline</h1><p class="lead">Lead text</p></body></html>"#;

    fn driver() -> HttpPageDriver {
        HttpPageDriver::new("dzen-test/0.1", None).unwrap()
    }

    #[tokio::test]
    async fn navigate_loads_page_and_selectors_resolve() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/news/story/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string(STORY_HTML))
            .mount(&server)
            .await;

        let mut driver = driver();
        let url = format!("{}/news/story/abc", server.uri());
        driver
            .navigate(&url, WaitPolicy::ContentLoaded, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(driver.current_url(), Some(url.as_str()));
        driver
            .wait_for_selector("h1", Duration::from_millis(100))
            .await
            .unwrap();
        let lead = driver.query(".lead").await.unwrap();
        assert_eq!(lead.inner_text(), "Lead text");
    }

    #[tokio::test]
    async fn missing_selector_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(STORY_HTML))
            .mount(&server)
            .await;

        let mut driver = driver();
        driver
            .navigate(&server.uri(), WaitPolicy::AllIdle, Duration::from_secs(5))
            .await
            .unwrap();
        let err = driver
            .wait_for_selector("[data-testid=\"story-digest\"]", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::SelectorNotFound { .. }));
    }

    #[tokio::test]
    async fn slow_page_maps_to_navigation_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(STORY_HTML)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let mut driver = driver();
        let err = driver
            .navigate(&server.uri(), WaitPolicy::ContentLoaded, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {err:?}");
        assert!(driver.current_url().is_none());
        assert!(driver.query_all("h1").await.is_empty());
    }

    #[tokio::test]
    async fn error_status_maps_to_navigation_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut driver = driver();
        let err = driver
            .navigate(&server.uri(), WaitPolicy::ContentLoaded, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Navigation { .. }));
    }

    #[tokio::test]
    async fn browserless_content_endpoint_is_used_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/content"))
            .and(query_param("token", "secret"))
            .and(body_partial_json(json!({
                "url": "https://dzen.ru/news",
                "gotoOptions": { "waitUntil": "networkidle2" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(STORY_HTML))
            .expect(1)
            .mount(&server)
            .await;

        let browserless = Browserless::new(&format!("{}/", server.uri()), Some("secret"));
        let mut driver = HttpPageDriver::new("dzen-test/0.1", Some(browserless)).unwrap();
        driver
            .navigate("https://dzen.ru/news", WaitPolicy::AllIdle, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(driver.current_url(), Some("https://dzen.ru/news"));
        assert!(driver.query("h1").await.is_some());
    }

    #[tokio::test]
    async fn browserless_408_is_a_navigation_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/content"))
            .and(body_partial_json(json!({
                "gotoOptions": { "waitUntil": "domcontentloaded", "timeout": 29_000 }
            })))
            .respond_with(ResponseTemplate::new(408))
            .expect(1)
            .mount(&server)
            .await;

        let browserless = Browserless::new(&server.uri(), None);
        let mut driver = HttpPageDriver::new("dzen-test/0.1", Some(browserless)).unwrap();
        let err = driver
            .navigate(
                "https://dzen.ru/news/story/slow",
                WaitPolicy::ContentLoaded,
                Duration::from_secs(30),
            )
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {err:?}");
        assert!(driver.current_url().is_none());
    }

    #[tokio::test]
    async fn gateway_timeout_is_a_navigation_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(504))
            .mount(&server)
            .await;

        let mut driver = driver();
        let err = driver
            .navigate(&server.uri(), WaitPolicy::ContentLoaded, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {err:?}");
    }

    #[test]
    fn browserless_budget_stays_below_client_timeout() {
        assert_eq!(
            browserless_goto_timeout(Duration::from_secs(70)),
            Duration::from_secs(69)
        );
        assert_eq!(
            browserless_goto_timeout(Duration::from_millis(1_000)),
            Duration::from_millis(500)
        );
        let short = Duration::from_millis(100);
        assert!(browserless_goto_timeout(short) < short);
    }

    #[test]
    fn random_user_agent_comes_from_list() {
        assert!(USER_AGENTS.contains(&random_user_agent()));
    }
}

//! Full-text enrichment from long-form articles linked under a story.

use tracing::{info, instrument, warn};

use super::Crawler;
use super::fallback::{first_success_async, non_empty};
use crate::driver::{PageDriver, WaitPolicy};
use crate::models::StoryRef;
use crate::urls::resolve_href;
use crate::utils::collapse_whitespace;

impl<D: PageDriver> Crawler<'_, D> {
    /// Texts of up to `max_detail_links` long-form articles linked from the
    /// current story page.
    ///
    /// Leaves the driver back on the story page when it had to navigate away.
    #[instrument(level = "info", skip_all, fields(story_id = %story.id))]
    pub async fn fetch_full_texts(&mut self, story: &StoryRef) -> Vec<String> {
        let settings = self.settings;
        let links = self.detail_links(story).await;
        if links.is_empty() {
            return Vec::new();
        }
        info!(count = links.len(), "Found detail article links");

        let mut texts = Vec::new();
        for (i, href) in links.iter().enumerate() {
            if i > 0 {
                settings.article_delay.pause().await;
            }
            info!(index = i + 1, url = %href, "Fetching full article text");
            if let Err(e) = self
                .driver
                .navigate(href, WaitPolicy::ContentLoaded, settings.page_timeout)
                .await
            {
                warn!(index = i + 1, url = %href, error = %e, "Article failed to load");
                continue;
            }
            let text = self.extract_article_text().await;
            if !text.is_empty() {
                info!(index = i + 1, chars = text.chars().count(), "Got article text");
                texts.push(text);
            }
        }

        if let Err(e) = self
            .driver
            .navigate(&story.url, WaitPolicy::ContentLoaded, settings.page_timeout)
            .await
        {
            warn!(error = %e, "Could not return to story page");
        }
        texts
    }

    /// Long-form article URLs from the first detail-link selector that matches.
    async fn detail_links(&mut self, story: &StoryRef) -> Vec<String> {
        let settings = self.settings;
        let selectors = &settings.selectors;
        let page_url = self
            .driver
            .current_url()
            .unwrap_or(story.url.as_str())
            .to_string();

        let driver = &*self.driver;
        let found = first_success_async(&selectors.detail_links, |sel| async move {
            let links = driver.query_all(sel).await;
            (!links.is_empty()).then_some(links)
        })
        .await
        .unwrap_or_default();

        found
            .iter()
            .filter_map(|link| resolve_href(&page_url, link.attr("href")?))
            .filter(|href| href.contains(&selectors.article_link_marker))
            .take(settings.max_detail_links)
            .collect()
    }

    /// Paragraph text of the current article page; empty when nothing usable.
    async fn extract_article_text(&mut self) -> String {
        let settings = self.settings;
        let selectors = &settings.selectors;
        if let Err(e) = self
            .driver
            .wait_for_selector(&selectors.article_body, settings.article_body_wait)
            .await
        {
            warn!(error = %e, "Article body not found");
            return String::new();
        }

        let min_chars = settings.min_paragraph_chars;
        let driver = &*self.driver;
        let paragraphs = first_success_async(&selectors.article_paragraphs, |sel| async move {
            let kept: Vec<String> = driver
                .query_all(sel)
                .await
                .iter()
                .filter_map(|el| non_empty(el.inner_text()))
                .filter(|text| text.chars().count() > min_chars)
                .collect();
            (!kept.is_empty()).then_some(kept)
        })
        .await
        .unwrap_or_default();

        collapse_whitespace(&paragraphs.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::driver::fake::FakeDriver;
    use crate::store::DedupStore;

    const STORY: &str = "https://dzen.ru/news/story/abc";

    fn story_ref() -> StoryRef {
        StoryRef {
            id: "abc".to_string(),
            title: "t".to_string(),
            url: STORY.to_string(),
            section_name: "s".to_string(),
            section_slug: "s".to_string(),
        }
    }

    #[tokio::test]
    async fn at_most_two_articles_are_fetched() {
        let store = DedupStore::in_memory().await.unwrap();
        let settings = settings();
        let links = [
            "https://dzen.ru/a/one",
            "/a/two",
            "https://dzen.ru/a/three",
        ];
        let mut driver = FakeDriver::new()
            .page(STORY, &story_page("T", &[], &links))
            .page("https://dzen.ru/a/one", &article_page(&["Текст первой статьи целиком."]))
            .page("https://dzen.ru/a/two", &article_page(&["Текст второй статьи целиком."]))
            .page("https://dzen.ru/a/three", &article_page(&["Третья не нужна вовсе."]));
        driver
            .navigate(STORY, WaitPolicy::ContentLoaded, settings.page_timeout)
            .await
            .unwrap();

        let texts = Crawler::new(&mut driver, &store, &settings)
            .fetch_full_texts(&story_ref())
            .await;

        assert_eq!(
            texts,
            vec!["Текст первой статьи целиком.", "Текст второй статьи целиком."]
        );
        assert_eq!(driver.visit_count("https://dzen.ru/a/three"), 0);
        assert_eq!(driver.current_url(), Some(STORY));
    }

    #[tokio::test]
    async fn generic_link_selector_is_used_when_tail_list_is_absent() {
        let store = DedupStore::in_memory().await.unwrap();
        let settings = settings();
        let page = r#"<html><body><h1>T</h1><a class="news-site--card-text__cardLink-kh" href="https://dzen.ru/a/solo">x</a></body></html>"#;
        let mut driver = FakeDriver::new()
            .page(STORY, page)
            .page("https://dzen.ru/a/solo", &article_page(&["Единственная статья здесь."]));
        driver
            .navigate(STORY, WaitPolicy::ContentLoaded, settings.page_timeout)
            .await
            .unwrap();

        let texts = Crawler::new(&mut driver, &store, &settings)
            .fetch_full_texts(&story_ref())
            .await;
        assert_eq!(texts, vec!["Единственная статья здесь."]);
    }

    #[tokio::test]
    async fn article_without_body_contributes_nothing() {
        let store = DedupStore::in_memory().await.unwrap();
        let settings = settings();
        let mut driver = FakeDriver::new()
            .page(STORY, &story_page("T", &[], &["https://dzen.ru/a/empty"]))
            .page("https://dzen.ru/a/empty", "<html><body><p>paywall</p></body></html>");
        driver
            .navigate(STORY, WaitPolicy::ContentLoaded, settings.page_timeout)
            .await
            .unwrap();

        let texts = Crawler::new(&mut driver, &store, &settings)
            .fetch_full_texts(&story_ref())
            .await;
        assert!(texts.is_empty());
        assert_eq!(driver.current_url(), Some(STORY));
    }

    #[tokio::test]
    async fn paragraph_selectors_fall_back_and_filter_noise() {
        let store = DedupStore::in_memory().await.unwrap();
        let settings = settings();
        let article = r#"<html><body><div data-testid="article-body"><div data-testid="article-render__block"><p>Абзац без span, но длинный.</p><p>Мало</p></div></div></body></html>"#;
        let mut driver = FakeDriver::new().page("https://dzen.ru/a/p", article);
        driver
            .navigate("https://dzen.ru/a/p", WaitPolicy::ContentLoaded, settings.page_timeout)
            .await
            .unwrap();

        let text = Crawler::new(&mut driver, &store, &settings)
            .extract_article_text()
            .await;
        assert_eq!(text, "Абзац без span, но длинный.");
    }
}

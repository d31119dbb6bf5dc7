//! One complete run: crawl, then publish.

use std::error::Error;
use std::time::Instant;

use tracing::{info, instrument};

use crate::config::CrawlSettings;
use crate::driver::PageDriver;
use crate::driver::http::{Browserless, HttpPageDriver, random_user_agent};
use crate::outputs::{self, ChannelInfo, Published};
use crate::scrapers::Crawler;
use crate::store::DedupStore;

/// Everything a run needs that outlives a single run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub settings: CrawlSettings,
    pub store: DedupStore,
    pub output_dir: String,
    pub browserless: Option<Browserless>,
    pub channel: ChannelInfo,
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub stories: usize,
    pub published: Published,
}

/// Crawl with `driver` and publish whatever was collected, even nothing.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir))]
pub async fn execute_run<D: PageDriver>(
    driver: &mut D,
    store: &DedupStore,
    settings: &CrawlSettings,
    channel: &ChannelInfo,
    output_dir: &str,
) -> Result<RunSummary, Box<dyn Error>> {
    let start = Instant::now();
    let stories = Crawler::new(driver, store, settings).crawl().await;
    let published = outputs::publish(&stories, channel, output_dir).await?;

    let elapsed = start.elapsed();
    let ledger = store.count().await.ok();
    info!(
        ledger = ?ledger,
        stories = stories.len(),
        json = %published.json.display(),
        rss = %published.rss.display(),
        secs = elapsed.as_secs(),
        "Run complete"
    );
    Ok(RunSummary {
        stories: stories.len(),
        published,
    })
}

/// One run over a fresh HTTP driver with a randomly picked user agent.
pub async fn run_once(ctx: &RunContext) -> Result<RunSummary, Box<dyn Error>> {
    let user_agent = random_user_agent();
    info!(%user_agent, browserless = ctx.browserless.is_some(), "Starting run");
    let mut driver = HttpPageDriver::new(user_agent, ctx.browserless.clone())?;
    execute_run(&mut driver, &ctx.store, &ctx.settings, &ctx.channel, &ctx.output_dir).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::FakeDriver;
    use crate::models::PublishedStory;
    use crate::scrapers::fixtures::*;

    #[tokio::test]
    async fn zero_sections_still_publishes_empty_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().to_str().unwrap();
        let store = DedupStore::in_memory().await.unwrap();
        let mut driver = FakeDriver::new().timeout(BASE);

        let summary = execute_run(&mut driver, &store, &settings(), &ChannelInfo::default(), out)
            .await
            .unwrap();

        assert_eq!(summary.stories, 0);
        let json = tokio::fs::read_to_string(&summary.published.json).await.unwrap();
        assert_eq!(json, "[]");
        let rss = tokio::fs::read_to_string(&summary.published.rss).await.unwrap();
        assert!(rss.contains("<channel>"));
        assert!(!rss.contains("<item>"));
    }

    #[tokio::test]
    async fn timed_out_story_is_published_with_placeholder_then_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().to_str().unwrap();
        let store = DedupStore::in_memory().await.unwrap();
        let story = "https://dzen.ru/news/story/slow?lang=ru";
        let site = || {
            FakeDriver::new()
                .page(BASE, &front_page(&[("/news/rubric/politics", "Политика")]))
                .page(
                    "https://dzen.ru/news/rubric/politics",
                    &section_page(&[(story, "Медленная")]),
                )
                .timeout(story)
        };

        let mut first = site();
        let summary = execute_run(&mut first, &store, &settings(), &ChannelInfo::default(), out)
            .await
            .unwrap();
        let raw = tokio::fs::read_to_string(&summary.published.json).await.unwrap();
        let published: Vec<PublishedStory> = serde_json::from_str(&raw).unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].summary, "content unavailable (timeout)");
        assert_eq!(published[0].url, "https://dzen.ru/news/story/slow");

        let mut second = site();
        let summary = execute_run(&mut second, &store, &settings(), &ChannelInfo::default(), out)
            .await
            .unwrap();
        assert_eq!(summary.stories, 0);
        assert_eq!(second.visit_count(story), 0);
    }
}

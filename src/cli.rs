//! Command-line interface definitions for the Dzen news crawler.
//!
//! Every option can also come from an environment variable, and a `.env`
//! file in the working directory is loaded before parsing.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use crate::config::{CrawlSettings, DelayRange, Selectors};
use crate::driver::http::Browserless;

/// File name of the dedup ledger when no database URL is given.
pub const DEFAULT_DATABASE_FILE: &str = "news_database.db";

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Scheduled mode: run now, then on every timetable slot
/// dzen_news_rss -o ./output -l ./logs
///
/// # A single run through a Browserless instance
/// dzen_news_rss --once --browserless-url http://localhost:3000
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory for JSON snapshots, the RSS feed and the default database
    #[arg(short, long, env = "DZEN_OUTPUT_DIR", default_value = "./output")]
    pub output_dir: String,

    /// Directory for the log file
    #[arg(short, long, env = "DZEN_LOGS_DIR", default_value = "./logs")]
    pub logs_dir: String,

    /// SQLite URL of the dedup ledger [default: sqlite://{output_dir}/news_database.db]
    #[arg(long, env = "DZEN_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Front page listing the section tabs
    #[arg(long, env = "DZEN_BASE_URL", default_value = "https://dzen.ru/news")]
    pub base_url: String,

    /// Sections crawled per run
    #[arg(long, env = "DZEN_MAX_SECTIONS", default_value_t = 1)]
    pub max_sections: usize,

    /// New stories extracted per section
    #[arg(long, env = "DZEN_STORIES_PER_SECTION", default_value_t = 3)]
    pub stories_per_section: usize,

    /// Story cards inspected per section page
    #[arg(long, env = "DZEN_CARDS_PER_SECTION", default_value_t = 10)]
    pub cards_per_section: usize,

    /// Navigation timeout for section, story and article pages (ms)
    #[arg(long, env = "DZEN_PAGE_TIMEOUT_MS", default_value_t = 30_000)]
    pub page_timeout_ms: u64,

    /// Navigation timeout for the front page (ms)
    #[arg(long, env = "DZEN_FRONT_PAGE_TIMEOUT_MS", default_value_t = 70_000)]
    pub front_page_timeout_ms: u64,

    /// Pause before each section, `MIN-MAX` in ms
    #[arg(long, env = "DZEN_SECTION_DELAY_MS", default_value = "2000-4000")]
    pub section_delay_ms: DelayRange,

    /// Pause before each story, `MIN-MAX` in ms
    #[arg(long, env = "DZEN_STORY_DELAY_MS", default_value = "1000-3000")]
    pub story_delay_ms: DelayRange,

    /// Pause between article fetches, `MIN-MAX` in ms
    #[arg(long, env = "DZEN_ARTICLE_DELAY_MS", default_value = "1000-2000")]
    pub article_delay_ms: DelayRange,

    /// Disable every politeness pause
    #[arg(long)]
    pub no_delays: bool,

    /// YAML file overriding CSS selectors
    #[arg(short, long, env = "DZEN_SELECTORS")]
    pub selectors: Option<PathBuf>,

    /// Browserless base URL; pages are fetched directly when unset
    #[arg(long, env = "BROWSERLESS_URL")]
    pub browserless_url: Option<String>,

    /// Browserless API token
    #[arg(long, env = "BROWSERLESS_TOKEN", hide_env_values = true)]
    pub browserless_token: Option<String>,

    /// Run once and exit instead of following the timetable
    #[arg(long)]
    pub once: bool,

    /// Seconds between timetable checks
    #[arg(long, env = "DZEN_POLL_INTERVAL_SECS", default_value_t = 60)]
    pub poll_interval_secs: u64,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "DZEN_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    pub fn database_url(&self) -> String {
        match &self.database_url {
            Some(url) => url.clone(),
            None => {
                let path = Path::new(&self.output_dir).join(DEFAULT_DATABASE_FILE);
                format!("sqlite://{}", path.display())
            }
        }
    }

    pub fn browserless(&self) -> Option<Browserless> {
        self.browserless_url
            .as_deref()
            .map(|url| Browserless::new(url, self.browserless_token.as_deref()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Crawl settings from defaults, flags and the optional selector file.
    pub async fn crawl_settings(&self) -> Result<CrawlSettings, Box<dyn Error>> {
        let selectors = match &self.selectors {
            Some(path) => Selectors::from_yaml_file(path).await?,
            None => Selectors::default(),
        };
        let settings = CrawlSettings {
            base_url: self.base_url.clone(),
            max_sections: self.max_sections,
            cards_per_section: self.cards_per_section,
            stories_per_section: self.stories_per_section,
            front_page_timeout: Duration::from_millis(self.front_page_timeout_ms),
            page_timeout: Duration::from_millis(self.page_timeout_ms),
            section_delay: self.section_delay_ms,
            story_delay: self.story_delay_ms,
            article_delay: self.article_delay_ms,
            selectors,
            ..CrawlSettings::default()
        };
        Ok(if self.no_delays {
            settings.without_delays()
        } else {
            settings
        })
    }
}

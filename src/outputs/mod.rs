//! Feed artifacts written at the end of every run.
//!
//! # Submodules
//!
//! - [`json`]: timestamped JSON snapshot of the stories collected by one run
//! - [`rss`]: the current RSS 2.0 feed, replaced on every run
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── dzen_news_20250506_093000.json   # one per run, never overwritten
//! ├── dzen_news_20250506_100000.json
//! ├── dzen_news_current.rss            # latest run only
//! └── news_database.db                 # dedup ledger (default location)
//! ```

use std::error::Error;
use std::path::PathBuf;

use chrono::Utc;
use tracing::{error, instrument};

use crate::models::PublishedStory;

pub mod json;
pub mod rss;

pub use rss::ChannelInfo;

/// Paths written by [`publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub json: PathBuf,
    pub rss: PathBuf,
}

/// Write the JSON snapshot and the current RSS feed for `stories`.
///
/// Runs even for an empty list so consumers always see the latest state.
#[instrument(level = "info", skip_all, fields(stories = stories.len(), output_dir = %output_dir))]
pub async fn publish(
    stories: &[PublishedStory],
    channel: &ChannelInfo,
    output_dir: &str,
) -> Result<Published, Box<dyn Error>> {
    let json = json::write_snapshot(stories, output_dir).await.map_err(|e| {
        error!(error = %e, "Failed to write JSON snapshot");
        e
    })?;
    let rss = rss::write_current_feed(stories, channel, output_dir, Utc::now())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to write RSS feed");
            e
        })?;
    Ok(Published { json, rss })
}

//! Timestamped JSON snapshots.
//!
//! Each run writes `dzen_news_{YYYYMMDD_HHMMSS}.json` (local time) holding a
//! pretty-printed array of the stories it collected. Snapshots are never
//! overwritten; two runs within the same second get a numeric suffix.

use std::error::Error;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

use crate::models::PublishedStory;

/// Filename stem shared by all snapshots.
pub const SNAPSHOT_PREFIX: &str = "dzen_news_";

/// Upper bound on `_n` suffixes tried before giving up.
const MAX_SUFFIX: u32 = 100;

/// Write `stories` to a new snapshot file under `output_dir`.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir))]
pub async fn write_snapshot(
    stories: &[PublishedStory],
    output_dir: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(stories)?;
    fs::create_dir_all(output_dir).await?;

    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let path = write_new_file(Path::new(output_dir), &stamp, json.as_bytes()).await?;
    info!(path = %path.display(), count = stories.len(), "Wrote JSON snapshot");
    Ok(path)
}

/// Create `{prefix}{stamp}.json`, or `{prefix}{stamp}_{n}.json` if taken.
async fn write_new_file(dir: &Path, stamp: &str, bytes: &[u8]) -> Result<PathBuf, Box<dyn Error>> {
    for n in 0..MAX_SUFFIX {
        let name = match n {
            0 => format!("{SNAPSHOT_PREFIX}{stamp}.json"),
            n => format!("{SNAPSHOT_PREFIX}{stamp}_{n}.json"),
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(mut file) => {
                file.write_all(bytes).await?;
                file.flush().await?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!(path = %path.display(), "Snapshot name taken; trying next suffix");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(format!("no free snapshot name for stamp {stamp}").into())
}

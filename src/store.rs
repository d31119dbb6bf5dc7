//! Persistent ledger of processed stories.
//!
//! One SQLite table keyed by canonical story URL. The `UNIQUE` constraint
//! plus `INSERT OR IGNORE` make [`DedupStore::mark_processed`] first-write-wins
//! at the storage layer. Lookups and inserts never propagate errors: a failed
//! lookup answers "not processed" (the story is crawled again rather than
//! silently lost) and a failed insert is logged.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, error, info, instrument};

use crate::error::Result;
use crate::models::ProcessedRecord;
use crate::urls::canonicalize_or_raw;

/// Dedup store backed by SQLite.
#[derive(Debug, Clone)]
pub struct DedupStore {
    pool: SqlitePool,
}

impl DedupStore {
    /// Open (creating if needed) the database at `database_url`.
    ///
    /// Accepts `sqlite://path/to/file.db` or `sqlite::memory:`.
    pub async fn open(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Access is strictly sequential; a single connection also keeps
        // in-memory databases shared.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!(%database_url, "Dedup store ready");
        Ok(store)
    }

    /// In-memory store for tests.
    pub async fn in_memory() -> Result<Self> {
        Self::open("sqlite::memory:").await
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS processed_news (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                story_url TEXT UNIQUE NOT NULL,
                story_id TEXT NOT NULL,
                title TEXT,
                rubric TEXT,
                text TEXT,
                processed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_story_url ON processed_news(story_url)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Ledger key for `raw_url`: canonical form, or the raw string if it
    /// cannot be normalized.
    fn key(raw_url: &str) -> String {
        canonicalize_or_raw(raw_url)
    }

    /// `true` iff a record exists for the canonical form of `raw_url`.
    #[instrument(level = "debug", skip(self))]
    pub async fn is_processed(&self, raw_url: &str) -> bool {
        let key = Self::key(raw_url);
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM processed_news WHERE story_url = ?",
        )
        .bind(&key)
        .fetch_one(&self.pool)
        .await;

        match found {
            Ok(count) => count > 0,
            Err(e) => {
                error!(error = %e, url = %key, "Dedup lookup failed; treating story as new");
                false
            }
        }
    }

    /// Record a story as processed. A second call for the same canonical URL
    /// is a no-op.
    #[instrument(level = "debug", skip(self, text), fields(text_len = text.len()))]
    pub async fn mark_processed(
        &self,
        raw_url: &str,
        story_id: &str,
        title: &str,
        section: &str,
        text: &str,
    ) {
        let key = Self::key(raw_url);
        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO processed_news (story_url, story_id, title, rubric, text)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&key)
        .bind(story_id)
        .bind(title)
        .bind(section)
        .bind(text)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(result) if result.rows_affected() == 0 => {
                debug!(url = %key, "Story already recorded; keeping first record");
            }
            Ok(_) => debug!(url = %key, "Story marked processed"),
            Err(e) => error!(error = %e, url = %key, "Failed to record processed story"),
        }
    }

    /// The record stored for `raw_url`, if any.
    pub async fn get(&self, raw_url: &str) -> Result<Option<ProcessedRecord>> {
        let record = sqlx::query_as::<_, ProcessedRecord>(
            r#"
            SELECT story_url, story_id, title, rubric, text, processed_at
            FROM processed_news WHERE story_url = ?
            "#,
        )
        .bind(Self::key(raw_url))
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Number of stored records.
    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM processed_news")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

//! # Dzen News RSS
//!
//! Crawls the Dzen news portal on a timetable, keeps a SQLite ledger of the
//! stories already seen, and publishes every run as a timestamped JSON
//! snapshot plus a current RSS 2.0 feed.
//!
//! ## Usage
//!
//! ```sh
//! dzen_news_rss -o ./output -l ./logs            # scheduled
//! dzen_news_rss --once --no-delays               # single run
//! ```
//!
//! ## Architecture
//!
//! 1. **Sections**: read the rubric tabs from the front page
//! 2. **Stories**: collect new story cards, skipping ones in the ledger
//! 3. **Content**: extract each story's digest and linked article texts
//! 4. **Output**: write the JSON snapshot and replace the RSS feed
//!
//! A run is triggered at startup and then by the [`scheduler`], which never
//! lets two runs overlap.

use std::error::Error;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod driver;
mod error;
mod models;
mod outputs;
mod run;
mod scheduler;
mod scrapers;
mod store;
mod urls;
mod utils;

use cli::Cli;
use outputs::ChannelInfo;
use run::{RunContext, run_once};
use scheduler::{Scheduler, Timetable};
use store::DedupStore;
use utils::ensure_writable_dir;

/// Log file inside the logs directory.
const LOG_FILE: &str = "dzen_scraper.log";

/// Stdout plus an appending, uncolored log file.
fn init_tracing(logs_dir: &str, default_level: &str) -> Result<(), Box<dyn Error>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level)?,
    };
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(Path::new(logs_dir).join(LOG_FILE))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tfmt::layer()
                .with_target(true)
                .with_file(false)
                .with_line_number(false)
                .with_timer(UtcTime::rfc_3339()),
        )
        .with(
            tfmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(Mutex::new(log_file)),
        )
        .try_init()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("ignoring unreadable .env: {e}");
        }
    }
    let args = Cli::parse();

    ensure_writable_dir(&args.logs_dir).await?;
    init_tracing(&args.logs_dir, &args.log_level)?;
    info!(version = env!("CARGO_PKG_VERSION"), "dzen_news_rss starting up");
    debug!(?args.output_dir, ?args.logs_dir, once = args.once, "Parsed CLI arguments");

    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let settings = args.crawl_settings().await?;
    let database_url = args.database_url();
    let store = DedupStore::open(&database_url).await.map_err(|e| {
        error!(%database_url, error = %e, "Cannot open dedup database");
        e
    })?;

    let ctx = RunContext {
        channel: ChannelInfo::for_site(&settings.base_url),
        settings,
        store,
        output_dir: args.output_dir.clone(),
        browserless: args.browserless(),
    };

    if args.once {
        let summary = run_once(&ctx).await.map_err(|e| {
            error!(error = %e, "Run failed");
            e
        })?;
        info!(stories = summary.stories, "Single run finished");
        return Ok(());
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Cannot listen for Ctrl-C; running until killed");
            std::future::pending::<()>().await;
        }
    };
    let scheduler = Scheduler::new(Timetable::standard(), args.poll_interval());
    let report = scheduler.run_until(|| run_once(&ctx), shutdown).await;
    info!(runs = report.runs, missed_slots = report.missed_slots, "Scheduler stopped");
    Ok(())
}

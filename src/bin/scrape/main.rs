//! CLI entry point.
//!
//! Grounded in `cli/parse/parse.go`'s `runParseCommand` for URL
//! classification (reddit host / `/forums/` / `/threads/`) and
//! `cli/site/update.go` for the per-site forum refresh. Uses `clap` the way
//! the forum binary's `main.rs` uses `env_logger` and `anyhow` at the
//! process boundary — library errors never escape this file as anything
//! but a logged message and a non-zero exit.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use espy::app_config::get_config;
use espy::model::ThreadRef;
use espy::reddit::RedditAdapter;
use espy::store::ScraperStore;
use espy::xf::{ListingWalker, PoliteClient, ThreadScraper};
use url::Url;

#[derive(Parser)]
#[command(name = "espy", about = "Incremental forum-activity harvester")]
struct Cli {
    /// Overrides the configured database file path.
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape a single URL with a lookback window of N days.
    Scrape {
        url: String,
        #[arg(long)]
        days: Option<u32>,
        #[arg(long)]
        descend_subforums: Option<bool>,
    },
    /// Run the listing walker against every forum already stored for a site.
    UpdateSite {
        hostname: String,
        #[arg(long)]
        days: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = get_config();
    let db_path = cli.database.unwrap_or(config.database);

    let store = ScraperStore::open(&db_path)
        .await
        .with_context(|| format!("opening database at {db_path}"))?;
    let client = PoliteClient::new().context("building HTTP client")?;

    match cli.command {
        Command::Scrape {
            url,
            days,
            descend_subforums,
        } => {
            let cutoff = lookback_cutoff(days.unwrap_or(config.lookback_days));
            let url = Url::parse(&url).with_context(|| format!("parsing URL {url}"))?;
            scrape_url(
                &client,
                &store,
                &url,
                cutoff,
                descend_subforums.unwrap_or(config.descend_subforums),
            )
            .await?;
        }
        Command::UpdateSite { hostname, days } => {
            let cutoff = lookback_cutoff(days.unwrap_or(config.lookback_days));
            store
                .get_site_id(&hostname)
                .await?
                .ok_or_else(|| anyhow!("no known site {hostname}"))?;

            let walker = ListingWalker::new(&client, &store);
            for forum_url in store.get_forums().await?.into_values() {
                let Ok(parsed) = Url::parse(&forum_url) else {
                    continue;
                };
                if parsed.host_str() != Some(hostname.as_str()) {
                    continue;
                }
                walker
                    .load_threads_with_activity_since(&parsed, cutoff, config.descend_subforums)
                    .await?;
            }
        }
    }

    Ok(())
}

fn lookback_cutoff(days: u32) -> DateTime<Utc> {
    Utc::now() - Duration::days(days as i64)
}

/// Classifies `url` (reddit host / `/forums/` / `/threads/`) and invokes
/// the matching scraper, mirroring `cli/parse/parse.go`'s dispatch.
async fn scrape_url(
    client: &PoliteClient,
    store: &ScraperStore,
    url: &Url,
    cutoff: DateTime<Utc>,
    descend_subforums: bool,
) -> Result<()> {
    if url.host_str().is_some_and(|h| h.contains("reddit.com")) {
        RedditAdapter::new(client, store)
            .load_threads_with_activity_since(url, cutoff)
            .await?;
    } else if url.path().contains("/forums/") {
        ListingWalker::new(client, store)
            .load_threads_with_activity_since(url, cutoff, descend_subforums)
            .await?;
    } else if url.path().contains("/threads/") {
        let (thread_id, thread) = store
            .find_thread(&ThreadRef::Url(url.to_string()))
            .await
            .map_err(|_| anyhow!("no stored thread for {url}; scrape its forum listing first"))?;
        let site_id = store
            .get_site_id(url.host_str().unwrap_or_default())
            .await?
            .ok_or_else(|| anyhow!("no site for {url}"))?;
        ThreadScraper::new(client, store)
            .load_comments_since(site_id, thread_id, &thread, cutoff)
            .await?;
    } else {
        return Err(anyhow!(
            "couldn't classify {url}: expected a reddit host, a /forums/ path, or a /threads/ path"
        ));
    }
    Ok(())
}

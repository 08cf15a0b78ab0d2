//! Forum listing walker.
//!
//! Grounded in `xf_scraper/forum_scraper.go`'s `ForumScraper` /
//! `LoadThreadsWithActivitySince`: walk newest-first pages until the
//! oldest thread on the most recent page predates the cutoff, recursing
//! into sub-forums depth-first when asked.

use crate::error::Result;
use crate::model::{ForumId, SiteId};
use crate::store::ScraperStore;
use crate::xf::client::PoliteClient;
use crate::xf::parse::parse_listing_page;
use crate::xf::thread_scraper::ThreadScraper;
use chrono::{DateTime, Utc};
use url::Url;

pub struct ListingWalker<'a> {
    client: &'a PoliteClient,
    store: &'a ScraperStore,
}

impl<'a> ListingWalker<'a> {
    pub fn new(client: &'a PoliteClient, store: &'a ScraperStore) -> Self {
        ListingWalker { client, store }
    }

    /// Walks `forum_url`'s listing, scraping every thread with activity at
    /// or after `cutoff`, recursing into sub-forums when `descend_subforums`
    /// is set.
    pub async fn load_threads_with_activity_since(
        &self,
        forum_url: &Url,
        cutoff: DateTime<Utc>,
        descend_subforums: bool,
    ) -> Result<()> {
        let (site_id, forum_id) = self.store.upsert_forum(forum_url).await?;

        let mut threads = Vec::new();
        let mut sub_forums = Vec::new();
        let mut page_num = 1u32;
        loop {
            let page_url = if page_num == 1 {
                forum_url.clone()
            } else {
                forum_url
                    .join(&format!("page-{page_num}"))
                    .unwrap_or_else(|_| forum_url.clone())
            };
            let doc = match self.client.fetch(&page_url).await {
                Ok(doc) => doc,
                Err(e) => {
                    log::warn!("listing fetch failed for {page_url}: {e}");
                    break;
                }
            };
            let page = parse_listing_page(&doc, &page_url);
            if page_num == 1 {
                sub_forums = page.sub_forums;
            }
            let oldest_on_page = page.threads.last().map(|t| t.latest_activity);
            threads.extend(page.threads);

            PoliteClient::polite_sleep(if page_num == 1 { 3 } else { 4 }).await;

            match oldest_on_page {
                Some(oldest) if oldest >= cutoff => {
                    page_num += 1;
                    continue;
                }
                _ => break,
            }
        }

        self.scrape_collected_threads(site_id, forum_id, &threads, cutoff).await?;

        if descend_subforums {
            for sub_forum in &sub_forums {
                Box::pin(self.load_threads_with_activity_since(sub_forum, cutoff, descend_subforums))
                    .await?;
            }
        }

        self.store.set_forum_last_scraped(forum_id, Utc::now()).await?;
        Ok(())
    }

    async fn scrape_collected_threads(
        &self,
        site_id: SiteId,
        forum_id: ForumId,
        threads: &[crate::model::Thread],
        cutoff: DateTime<Utc>,
    ) -> Result<()> {
        for thread in threads {
            let thread_id = self.store.upsert_thread(site_id, forum_id, thread).await?;
            let scraper = ThreadScraper::new(self.client, self.store);
            scraper
                .load_comments_since(site_id, thread_id, thread, cutoff)
                .await?;
        }
        Ok(())
    }
}

//! Per-thread incremental comment scraper.
//!
//! Grounded in `xf_scraper/thread_scraper.go`'s `ThreadScraper` /
//! `LoadCommentsSince`: the forward step catches a known thread up to
//! live, the backfill step extends it backward using the page-number
//! probe, and both funnel into one `addComments` call.

use crate::error::Result;
use crate::model::{Comment, SiteId, Thread, ThreadId};
use crate::store::ScraperStore;
use crate::xf::client::PoliteClient;
use crate::xf::page_probe::find_page_before;
use crate::xf::parse::{page_url, parse_page_count, parse_thread_page};
use chrono::{DateTime, Utc};
use url::Url;

pub struct ThreadScraper<'a> {
    client: &'a PoliteClient,
    store: &'a ScraperStore,
}

impl<'a> ThreadScraper<'a> {
    pub fn new(client: &'a PoliteClient, store: &'a ScraperStore) -> Self {
        ThreadScraper { client, store }
    }

    /// Fetches `thread_url` solely to read its page-navigation element.
    /// Contributes no comments itself, mirroring the page-count probe the
    /// Go original runs as a collector separate from comment extraction.
    /// Returns `None` and logs on a transport failure, leaving the caller
    /// free to skip this thread rather than abort the whole run.
    async fn fetch_page_count(&self, thread_url: &Url) -> Option<u32> {
        match self.client.fetch(thread_url).await {
            Ok(doc) => Some(parse_page_count(&doc)),
            Err(e) => {
                log::warn!("page-count fetch failed for {thread_url}: {e}");
                None
            }
        }
    }

    /// Whether a `from_page..=1` descent should keep walking past `page_num`,
    /// given the earliest comment timestamp found there. Split out from
    /// [`descend_until`] so the stopping rule can be exercised without any
    /// network I/O.
    fn should_continue(earliest_on_page: Option<DateTime<Utc>>, stop_before: DateTime<Utc>, page_num: u32) -> bool {
        let crossed_cutoff = matches!(earliest_on_page, Some(e) if e < stop_before);
        !(crossed_cutoff || page_num <= 1)
    }

    /// Fetches pages `from_page, from_page - 1, ..., 1`, stopping as soon
    /// as a fetched page's earliest comment predates `stop_before`.
    /// Returns every comment collected along the way.
    async fn descend_until(
        &self,
        thread_url: &Url,
        from_page: u32,
        stop_before: DateTime<Utc>,
        sleep_spread: u64,
    ) -> Result<Vec<Comment>> {
        let mut collected = Vec::new();
        let mut page_num = from_page;
        loop {
            PoliteClient::polite_sleep(sleep_spread).await;
            let doc = match self.client.fetch(&page_url(thread_url, page_num)).await {
                Ok(doc) => doc,
                Err(e) => {
                    log::warn!("thread page fetch failed for {thread_url} page {page_num}: {e}");
                    break;
                }
            };
            let page_comments = parse_thread_page(&doc, thread_url);
            let earliest_on_page = page_comments.iter().map(|c| c.published).min();
            collected.extend(page_comments);

            if !Self::should_continue(earliest_on_page, stop_before, page_num) {
                break;
            }
            page_num -= 1;
        }
        Ok(collected)
    }

    /// Runs the forward-step/backfill-step protocol for `thread`, persisting
    /// whatever comments it collects via a single `addComments` call.
    pub async fn load_comments_since(
        &self,
        site_id: SiteId,
        thread_id: ThreadId,
        thread: &Thread,
        cutoff: DateTime<Utc>,
    ) -> Result<()> {
        let range = self.store.comment_time_range(thread_id).await?;

        let mut collected = Vec::new();

        match range {
            None => {
                // Case A: no prior comments. Walk every page from the
                // newest down to 1, so the very first scrape actually
                // reaches the thread's latest posts.
                if let Some(pages) = self.fetch_page_count(&thread.url).await {
                    collected.extend(self.descend_until(&thread.url, pages, cutoff, 4).await?);
                }
            }
            Some((earliest, latest)) => {
                // Forward step: catch the thread up from its newest page
                // down to whatever we've already stored.
                if thread.latest_activity != latest {
                    if let Some(pages) = self.fetch_page_count(&thread.url).await {
                        PoliteClient::polite_sleep(2).await;
                        collected.extend(self.descend_until(&thread.url, pages, latest, 4).await?);
                    }
                }

                // Backfill step.
                if cutoff < earliest && !self.store.first_comment_loaded(thread_id).await? {
                    if let Some(pages) = self.fetch_page_count(&thread.url).await {
                        PoliteClient::polite_sleep(2).await;
                        let start_page = find_page_before(self.client, &thread.url, earliest, pages).await?;
                        if start_page >= 1 {
                            collected.extend(self.descend_until(&thread.url, start_page, cutoff, 4).await?);
                        }
                    }
                }
            }
        }

        if !collected.is_empty() {
            self.store.add_comments(site_id, thread_id, &collected).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    /// Simulates `descend_until`'s walk against an in-memory table of
    /// per-page earliest-comment timestamps (1-based, oldest page first),
    /// without any network I/O, and returns the page numbers visited in
    /// order.
    fn walk(from_page: u32, earliest_by_page: &[i64], stop_before: i64) -> Vec<u32> {
        let stop_before = t(stop_before);
        let mut visited = Vec::new();
        let mut page_num = from_page;
        loop {
            visited.push(page_num);
            let earliest = earliest_by_page.get((page_num - 1) as usize).map(|&s| t(s));
            if !ThreadScraper::should_continue(earliest, stop_before, page_num) {
                break;
            }
            page_num -= 1;
        }
        visited
    }

    #[test]
    fn cold_scrape_walk_starts_at_the_true_newest_page() {
        // 5 pages, each page's earliest comment older than the last.
        let earliest_by_page = [100, 200, 300, 400, 500];
        let visited = walk(5, &earliest_by_page, 0);
        assert_eq!(
            visited.first(),
            Some(&5),
            "a from_page of pages - 1 would skip the newest page entirely"
        );
        assert_eq!(visited, vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn walk_stops_as_soon_as_a_page_predates_the_cutoff() {
        let earliest_by_page = [100, 200, 300, 400, 500];
        let visited = walk(5, &earliest_by_page, 350);
        assert_eq!(visited, vec![5, 4, 3], "page 3's earliest comment (300) is before the cutoff (350)");
    }

    #[test]
    fn walk_always_reaches_page_one_when_nothing_crosses_the_cutoff() {
        let earliest_by_page = [100, 200, 300, 400, 500];
        let visited = walk(5, &earliest_by_page, 0);
        assert_eq!(visited.last(), Some(&1));
    }

    #[test]
    fn single_page_thread_walk_visits_only_page_one() {
        let earliest_by_page = [100];
        let visited = walk(1, &earliest_by_page, 0);
        assert_eq!(visited, vec![1]);
    }
}

//! Binary search over a thread's pages for locating the page a given
//! comment timestamp lives on.
//!
//! Grounded in `xf_scraper/thread_page_finder.go`'s `FindCommentsBefore`.

use crate::error::Result;
use crate::xf::client::PoliteClient;
use crate::xf::parse::{page_url, parse_thread_page};
use chrono::{DateTime, Utc};
use url::Url;

/// Fetches `page_num` and returns the `(earliest, latest)` comment
/// timestamps found on it. A transport failure is logged and treated as an
/// empty page rather than propagated, so one unreachable probe page can't
/// abort the whole binary search.
async fn time_range_of_page(
    client: &PoliteClient,
    thread_url: &Url,
    page_num: u32,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let doc = match client.fetch(&page_url(thread_url, page_num)).await {
        Ok(doc) => doc,
        Err(e) => {
            log::warn!("page probe fetch failed for {thread_url} page {page_num}: {e}");
            return None;
        }
    };
    let comments = parse_thread_page(&doc, thread_url);
    let mut range: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
    for c in &comments {
        range = Some(match range {
            None => (c.published, c.published),
            Some((lo, hi)) => (lo.min(c.published), hi.max(c.published)),
        });
    }
    range
}

/// What one probe of a candidate page tells the binary search to do next.
/// Split out from [`find_page_before`] so the search arithmetic can be
/// exercised without any network I/O.
enum Step {
    Found(u32),
    MoveRight(u32),
    MoveLeft(u32),
}

fn step(range: Option<(DateTime<Utc>, DateTime<Utc>)>, mid: u32, target: DateTime<Utc>) -> Step {
    match range {
        Some((earliest, latest)) if earliest < target && target <= latest => Step::Found(mid),
        Some((earliest, _)) if earliest < target => Step::MoveRight(mid + 1),
        _ => Step::MoveLeft(mid.saturating_sub(1)),
    }
}

/// Returns the highest page in `[1, pages]` containing at least one post
/// published before `target`, or `0` if none does.
pub async fn find_page_before(
    client: &PoliteClient,
    thread_url: &Url,
    target: DateTime<Utc>,
    pages: u32,
) -> Result<u32> {
    if pages <= 1 {
        let range = time_range_of_page(client, thread_url, 1).await;
        return Ok(match range {
            Some((earliest, _)) if earliest < target => 1,
            _ => 0,
        });
    }

    let (mut left, mut right) = (1u32, pages);
    while left < right {
        let mid = left + (right - left) / 2;
        let range = time_range_of_page(client, thread_url, mid).await;
        match step(range, mid, target) {
            Step::Found(p) => return Ok(p),
            Step::MoveRight(new_left) => left = new_left,
            Step::MoveLeft(new_right) => right = new_right,
        }
        PoliteClient::polite_sleep(6).await;
    }
    Ok(left)
}

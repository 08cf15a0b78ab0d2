//! HTML parsing for XenForo-style listing pages and thread pages.
//!
//! Selectors are lifted directly from `xf_scraper/forum_scraper.go` and
//! `xf_scraper/thread_scraper.go`'s `colly` `OnHTML` callbacks, translated
//! to `scraper::Selector` queries.

use crate::html_extract::extract_post_text;
use crate::model::{Comment, Thread};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

fn sel(s: &str) -> Selector {
    Selector::parse(s).unwrap_or_else(|_| panic!("invalid selector: {s}"))
}

/// The URL of a thread's Nth page: page 1 is the thread's own URL, every
/// other page is `page-N` joined against it.
pub fn page_url(thread_url: &Url, page_num: u32) -> Url {
    if page_num <= 1 {
        thread_url.clone()
    } else {
        thread_url
            .join(&format!("page-{page_num}"))
            .unwrap_or_else(|_| thread_url.clone())
    }
}

static SUBFORUM_NODE: Lazy<Selector> = Lazy::new(|| sel("div.node--forum"));
static SUBFORUM_TITLE: Lazy<Selector> = Lazy::new(|| sel("h3.node-title"));
static SUBFORUM_LINK: Lazy<Selector> = Lazy::new(|| sel("a"));

static THREAD_ROW: Lazy<Selector> = Lazy::new(|| sel("div.structItem--thread"));
static MARKED_THREAD_ROW: Lazy<Selector> =
    Lazy::new(|| sel("div.mark-thread:not([class*=is-prefix])"));
static THREAD_TITLE_LINK: Lazy<Selector> = Lazy::new(|| sel("div.structItem-title a"));
static THREAD_START_DATE: Lazy<Selector> =
    Lazy::new(|| sel("li.structItem-startDate time.u-dt"));
static THREAD_META_PAIR: Lazy<Selector> = Lazy::new(|| sel("div.structItem-cell--meta dl.pairs"));
static PAIR_DT: Lazy<Selector> = Lazy::new(|| sel("dt"));
static PAIR_DD: Lazy<Selector> = Lazy::new(|| sel("dd"));
static THREAD_LATEST: Lazy<Selector> =
    Lazy::new(|| sel("div.structItem-cell--latest time.u-dt"));

static NAV_MIXED: Lazy<Selector> = Lazy::new(|| sel("nav.pageNavWrapper--mixed"));
static NAV_FULL: Lazy<Selector> = Lazy::new(|| sel("nav.pageNavWrapper--full"));
static NAV_LAST_PAGE_LINK: Lazy<Selector> = Lazy::new(|| sel("ul.pageNav-main a"));

static POST: Lazy<Selector> = Lazy::new(|| sel("article.message--post"));
static POST_BODY: Lazy<Selector> = Lazy::new(|| sel("article.message-body"));
static POST_TIME: Lazy<Selector> = Lazy::new(|| sel("ul.message-attribution-main time.u-dt"));

/// `"1K" -> 1000`, `"2M" -> 2000000`, `"42" -> 42`, `"" -> 0`, `"abc" -> 0`.
/// Grounded in `xf_scraper/forum_scraper.go`'s `parseCompactCount`.
pub fn parse_compact_count(raw: &str) -> u64 {
    if raw.is_empty() {
        return 0;
    }
    let cleaned = raw.trim().replace(',', "");
    let (digits, multiplier) = match cleaned.chars().last() {
        Some('K') | Some('k') => (&cleaned[..cleaned.len() - 1], 1_000),
        Some('M') | Some('m') => (&cleaned[..cleaned.len() - 1], 1_000_000),
        _ => (cleaned.as_str(), 1),
    };
    digits.parse::<f64>().map(|v| (v * multiplier as f64) as u64).unwrap_or(0)
}

fn data_time(el: ElementRef, selector: &Selector) -> DateTime<Utc> {
    el.select(selector)
        .next()
        .and_then(|t| t.value().attr("data-time"))
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(|| DateTime::from_timestamp(0, 0).unwrap())
}

/// The result of parsing one listing page: discovered threads (newest
/// first, as they appear on the page) and sub-forum URLs found in the
/// page's forum-node blocks.
pub struct ListingPage {
    pub threads: Vec<Thread>,
    pub sub_forums: Vec<Url>,
}

pub fn parse_listing_page(doc: &Html, page_url: &Url) -> ListingPage {
    let mut sub_forums = Vec::new();
    for node in doc.select(&SUBFORUM_NODE) {
        for title in node.select(&SUBFORUM_TITLE) {
            if let Some(href) = title
                .select(&SUBFORUM_LINK)
                .next()
                .and_then(|a| a.value().attr("href"))
            {
                if let Ok(resolved) = page_url.join(href) {
                    sub_forums.push(resolved);
                }
            }
        }
    }

    let mut threads = Vec::new();
    for row in doc
        .select(&THREAD_ROW)
        .chain(doc.select(&MARKED_THREAD_ROW))
    {
        if let Some(thread) = parse_thread_row(row, page_url) {
            threads.push(thread);
        } else {
            log::warn!("dropping thread row with no URL on {page_url}");
        }
    }

    ListingPage { threads, sub_forums }
}

fn parse_thread_row(row: ElementRef, page_url: &Url) -> Option<Thread> {
    let author = row.value().attr("data-author").unwrap_or_default().to_string();

    let title_link = row.select(&THREAD_TITLE_LINK).last()?;
    let href = title_link.value().attr("href")?;
    let url = page_url.join(href).ok()?;
    let title: String = title_link.text().collect();

    let start_date = data_time(row, &THREAD_START_DATE);
    let latest_activity = data_time(row, &THREAD_LATEST);

    let mut replies = 0u64;
    let mut views = 0u64;
    for pair in row.select(&THREAD_META_PAIR) {
        let dt: String = pair.select(&PAIR_DT).next().map(|e| e.text().collect()).unwrap_or_default();
        let dd: String = pair.select(&PAIR_DD).next().map(|e| e.text().collect()).unwrap_or_default();
        match dt.trim() {
            "Replies" => replies = parse_compact_count(dd.trim()),
            "Views" => views = parse_compact_count(dd.trim()),
            _ => {}
        }
    }

    Some(Thread {
        url,
        title: title.trim().to_string(),
        author,
        start_date,
        latest_activity,
        replies,
        views,
    })
}

/// Reads the last page number from the page-navigation element on a
/// thread's first page. If both a `mixed` and a `full` nav wrapper are
/// present, the `mixed` one wins.
pub fn parse_page_count(doc: &Html) -> u32 {
    let wrapper = doc
        .select(&NAV_MIXED)
        .next()
        .or_else(|| doc.select(&NAV_FULL).next());
    let Some(wrapper) = wrapper else {
        return 1;
    };
    wrapper
        .select(&NAV_LAST_PAGE_LINK)
        .last()
        .map(|a| a.text().collect::<String>())
        .and_then(|text| text.trim().parse::<u32>().ok())
        .unwrap_or(1)
}

/// Extracts every post on a thread page.
pub fn parse_thread_page(doc: &Html, thread_url: &Url) -> Vec<Comment> {
    let mut comments = Vec::new();
    for post in doc.select(&POST) {
        let author = post.value().attr("data-author").unwrap_or_default().to_string();
        let published = data_time(post, &POST_TIME);
        let content = post
            .select(&POST_BODY)
            .next()
            .map(extract_post_text)
            .unwrap_or_default();
        let permalink = post
            .value()
            .attr("id")
            .and_then(|id| thread_url.join(&format!("#{id}")).ok())
            .unwrap_or_else(|| thread_url.clone());
        comments.push(Comment {
            url: permalink,
            author,
            published,
            content,
        });
    }
    comments
}

//! Reddit subreddit adapter.
//!
//! Grounded in `reddit/reddit.go`'s `ForumScraper`/`ThreadScraper`: given a
//! `/r/<name>` URL, fetch its listing, then each post's comment tree, and
//! upsert into the same store via the same operations the XenForo engine
//! uses. `reddit/reddit.go` drives an authenticated `graw` bot against
//! Reddit's API; this adapter instead talks to Reddit's public,
//! unauthenticated JSON endpoints (`{url}.json`), since depth-first reply
//! flattening — not OAuth plumbing — is the interesting part of this
//! adapter.
//! No page-number probe is needed: the JSON API returns a post's whole
//! comment tree in one response.

use crate::error::{Result, ScrapeError};
use crate::model::{Comment, ForumId, SiteId, Thread};
use crate::store::ScraperStore;
use crate::xf::client::PoliteClient;
use chrono::{DateTime, Utc};
use serde_json::Value;
use url::Url;

fn epoch(v: &Value) -> DateTime<Utc> {
    let secs = v.as_f64().unwrap_or(0.0) as i64;
    DateTime::from_timestamp(secs, 0).unwrap_or_else(|| DateTime::from_timestamp(0, 0).unwrap())
}

fn json_url(u: &Url) -> Url {
    let mut out = u.clone();
    let trimmed = out.path().trim_end_matches('/').to_string();
    out.set_path(&format!("{trimmed}.json"));
    out
}

pub struct RedditAdapter<'a> {
    client: &'a PoliteClient,
    store: &'a ScraperStore,
}

impl<'a> RedditAdapter<'a> {
    pub fn new(client: &'a PoliteClient, store: &'a ScraperStore) -> Self {
        RedditAdapter { client, store }
    }

    /// Loads every post in `subreddit_url` with `created_utc >= cutoff`,
    /// along with its full comment tree.
    pub async fn load_threads_with_activity_since(
        &self,
        subreddit_url: &Url,
        cutoff: DateTime<Utc>,
    ) -> Result<()> {
        if !subreddit_url.path().starts_with("/r/") {
            return Err(ScrapeError::Precondition(format!(
                "not a subreddit URL: {subreddit_url}"
            )));
        }
        let (site_id, forum_id) = self.store.upsert_forum(subreddit_url).await?;

        let listing = match self.client.fetch_json(&json_url(subreddit_url)).await {
            Ok(listing) => listing,
            Err(e) => {
                log::warn!("subreddit listing fetch failed for {subreddit_url}: {e}");
                return Ok(());
            }
        };
        let posts = listing["data"]["children"].as_array().cloned().unwrap_or_default();

        for post in &posts {
            let data = &post["data"];
            let Some(permalink) = data["permalink"].as_str() else { continue };
            let Ok(thread_url) = subreddit_url.join(permalink) else { continue };
            let start_date = epoch(&data["created_utc"]);
            if start_date < cutoff {
                continue;
            }
            let thread = Thread {
                url: thread_url,
                title: data["title"].as_str().unwrap_or_default().to_string(),
                author: data["author"].as_str().unwrap_or_default().to_string(),
                start_date,
                latest_activity: start_date,
                replies: data["num_comments"].as_u64().unwrap_or(0),
                views: 0,
            };
            if let Err(e) = self.load_comments(site_id, forum_id, &thread).await {
                match e {
                    ScrapeError::Store(_) => return Err(e),
                    _ => log::warn!("comment fetch failed for {}: {e}", thread.url),
                }
            }
            PoliteClient::polite_sleep(3).await;
        }

        self.store.set_forum_last_scraped(forum_id, Utc::now()).await?;
        Ok(())
    }

    async fn load_comments(&self, site_id: SiteId, forum_id: ForumId, thread: &Thread) -> Result<()> {
        let thread_id = self.store.upsert_thread(site_id, forum_id, thread).await?;

        let body = self.client.fetch_json(&json_url(&thread.url)).await?;
        let listings = body.as_array().cloned().unwrap_or_default();

        let mut comments = Vec::new();
        if let Some(comment_listing) = listings.get(1) {
            if let Some(children) = comment_listing["data"]["children"].as_array() {
                for child in children {
                    flatten_comment(child, &thread.url, &mut comments);
                }
            }
        }

        if !comments.is_empty() {
            self.store.add_comments(site_id, thread_id, &comments).await?;
        }
        Ok(())
    }
}

/// Depth-first flattening of a comment and its replies.
fn flatten_comment(node: &Value, thread_url: &Url, out: &mut Vec<Comment>) {
    if node["kind"].as_str() != Some("t1") {
        return;
    }
    let data = &node["data"];
    let permalink = data["permalink"]
        .as_str()
        .and_then(|p| thread_url.join(p).ok())
        .unwrap_or_else(|| thread_url.clone());

    out.push(Comment {
        url: permalink,
        author: data["author"].as_str().unwrap_or_default().to_string(),
        published: epoch(&data["created_utc"]),
        content: data["body"].as_str().unwrap_or_default().to_string(),
    });

    if let Some(children) = data["replies"]["data"]["children"].as_array() {
        for child in children {
            flatten_comment(child, thread_url, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_nested_replies_depth_first() {
        let thread_url = Url::parse("https://www.reddit.com/r/rust/comments/abc/some_post/").unwrap();
        let tree = json!([{
            "kind": "t1",
            "data": {
                "author": "alice",
                "body": "top level",
                "created_utc": 1000,
                "permalink": "/r/rust/comments/abc/some_post/c1/",
                "replies": {
                    "data": {
                        "children": [{
                            "kind": "t1",
                            "data": {
                                "author": "bob",
                                "body": "a reply",
                                "created_utc": 2000,
                                "permalink": "/r/rust/comments/abc/some_post/c2/"
                            }
                        }]
                    }
                }
            }
        }, {
            "kind": "more",
            "data": {}
        }]);

        let mut out = Vec::new();
        for node in tree.as_array().unwrap() {
            flatten_comment(node, &thread_url, &mut out);
        }

        assert_eq!(out.len(), 2, "the 'more' sentinel node must be skipped");
        assert_eq!(out[0].author, "alice");
        assert_eq!(out[1].author, "bob");
        assert_eq!(out[1].published.timestamp(), 2000);
        assert_eq!(
            out[1].url.as_str(),
            "https://www.reddit.com/r/rust/comments/abc/some_post/c2/"
        );
    }

    #[test]
    fn empty_string_replies_are_treated_as_no_children() {
        let thread_url = Url::parse("https://www.reddit.com/r/rust/comments/abc/some_post/").unwrap();
        let node = json!({
            "kind": "t1",
            "data": {
                "author": "carl",
                "body": "leaf comment",
                "created_utc": 3000,
                "permalink": "/r/rust/comments/abc/some_post/c3/",
                "replies": ""
            }
        });
        let mut out = Vec::new();
        flatten_comment(&node, &thread_url, &mut out);
        assert_eq!(out.len(), 1, "a string 'replies' value has no .data.children and must not panic");
    }

    #[test]
    fn json_url_appends_suffix_and_trims_trailing_slash() {
        let u = Url::parse("https://www.reddit.com/r/rust/").unwrap();
        assert_eq!(json_url(&u).as_str(), "https://www.reddit.com/r/rust.json");
    }
}

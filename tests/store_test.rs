//! Integration tests for `ScraperStore` against an in-memory SQLite
//! database: upsert idempotence, comment dedup, time-range queries, and
//! the regex-filtered grep reads.

use chrono::{DateTime, Utc};
use espy::model::{Comment, Thread, ThreadRef};
use espy::store::ScraperStore;
use url::Url;

async fn open_memory_store() -> ScraperStore {
    let db = sea_orm::Database::connect("sqlite::memory:")
        .await
        .unwrap();
    ScraperStore::from_connection(db).await.unwrap()
}

fn t(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn sample_thread(url: &str) -> Thread {
    Thread {
        url: Url::parse(url).unwrap(),
        title: "a thread".to_string(),
        author: "alice".to_string(),
        start_date: t(1_000),
        latest_activity: t(1_000),
        replies: 0,
        views: 0,
    }
}

fn sample_comment(url: &str, author: &str, published: i64, content: &str) -> Comment {
    Comment {
        url: Url::parse(url).unwrap(),
        author: author.to_string(),
        published: t(published),
        content: content.to_string(),
    }
}

#[tokio::test]
async fn upsert_forum_is_idempotent() {
    let store = open_memory_store().await;
    let url = Url::parse("https://some-forum.com/forums/general.1/").unwrap();
    let (site1, forum1) = store.upsert_forum(&url).await.unwrap();
    let (site2, forum2) = store.upsert_forum(&url).await.unwrap();
    assert_eq!(site1, site2);
    assert_eq!(forum1, forum2);

    let without_slash = Url::parse("https://some-forum.com/forums/general.1").unwrap();
    let (site3, forum3) = store.upsert_forum(&without_slash).await.unwrap();
    assert_eq!(site1, site3);
    assert_eq!(forum1, forum3, "trailing-slash variants canonicalize to the same forum");
}

#[tokio::test]
async fn upsert_thread_keeps_identity_fields_stable() {
    let store = open_memory_store().await;
    let forum_url = Url::parse("https://some-forum.com/forums/general.1/").unwrap();
    let (site_id, forum_id) = store.upsert_forum(&forum_url).await.unwrap();

    let mut thread = sample_thread("https://some-forum.com/threads/hello.5/");
    let id1 = store.upsert_thread(site_id, forum_id, &thread).await.unwrap();

    thread.replies = 9;
    thread.views = 100;
    thread.latest_activity = t(5_000);
    thread.title = "a different title".to_string();
    thread.author = "mallory".to_string();
    let id2 = store.upsert_thread(site_id, forum_id, &thread).await.unwrap();
    assert_eq!(id1, id2);

    let stored = store.get_threads(&[id1]).await.unwrap();
    let row = stored.get(&id1).unwrap();
    assert_eq!(row.replies, 9);
    assert_eq!(row.views, 100);
    assert_eq!(row.latest_activity, t(5_000));
    assert_eq!(row.title, "a thread", "title is set once and never moves");
    assert_eq!(row.author, "alice", "author is set once and never moves");
}

#[tokio::test]
async fn add_comments_deduplicates_by_thread_author_published() {
    let store = open_memory_store().await;
    let forum_url = Url::parse("https://some-forum.com/forums/general.1/").unwrap();
    let (site_id, forum_id) = store.upsert_forum(&forum_url).await.unwrap();
    let thread = sample_thread("https://some-forum.com/threads/hello.5/");
    let thread_id = store.upsert_thread(site_id, forum_id, &thread).await.unwrap();

    let c1 = sample_comment(
        "https://some-forum.com/threads/hello.5/#post-1",
        "bob",
        1_500,
        "first post",
    );
    store.add_comments(site_id, thread_id, &[c1.clone()]).await.unwrap();
    store.add_comments(site_id, thread_id, &[c1.clone()]).await.unwrap();

    let stored = store.thread_comments(thread_id).await.unwrap();
    assert_eq!(stored.len(), 1, "re-adding the same comment must not duplicate it");

    let c2 = sample_comment(
        "https://some-forum.com/threads/hello.5/#post-2",
        "bob",
        1_600,
        "second post",
    );
    store.add_comments(site_id, thread_id, &[c2]).await.unwrap();
    let stored = store.thread_comments(thread_id).await.unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn comment_time_range_reflects_stored_extremes() {
    let store = open_memory_store().await;
    let forum_url = Url::parse("https://some-forum.com/forums/general.1/").unwrap();
    let (site_id, forum_id) = store.upsert_forum(&forum_url).await.unwrap();
    let thread = sample_thread("https://some-forum.com/threads/hello.5/");
    let thread_id = store.upsert_thread(site_id, forum_id, &thread).await.unwrap();

    assert_eq!(store.comment_time_range(thread_id).await.unwrap(), None);

    let comments = vec![
        sample_comment("https://some-forum.com/threads/hello.5/#post-1", "bob", 2_000, "x"),
        sample_comment("https://some-forum.com/threads/hello.5/#post-2", "carl", 1_000, "y"),
        sample_comment("https://some-forum.com/threads/hello.5/#post-3", "dan", 3_000, "z"),
    ];
    store.add_comments(site_id, thread_id, &comments).await.unwrap();

    let (earliest, latest) = store.comment_time_range(thread_id).await.unwrap().unwrap();
    assert_eq!(earliest, t(1_000));
    assert_eq!(latest, t(3_000));
}

#[tokio::test]
async fn first_comment_loaded_matches_thread_start_date() {
    let store = open_memory_store().await;
    let forum_url = Url::parse("https://some-forum.com/forums/general.1/").unwrap();
    let (site_id, forum_id) = store.upsert_forum(&forum_url).await.unwrap();
    let mut thread = sample_thread("https://some-forum.com/threads/hello.5/");
    thread.start_date = t(1_000);
    let thread_id = store.upsert_thread(site_id, forum_id, &thread).await.unwrap();

    assert!(!store.first_comment_loaded(thread_id).await.unwrap());

    store
        .add_comments(
            site_id,
            thread_id,
            &[sample_comment(
                "https://some-forum.com/threads/hello.5/#post-1",
                "alice",
                2_000,
                "not the opener",
            )],
        )
        .await
        .unwrap();
    assert!(!store.first_comment_loaded(thread_id).await.unwrap());

    store
        .add_comments(
            site_id,
            thread_id,
            &[sample_comment(
                "https://some-forum.com/threads/hello.5/#post-0",
                "alice",
                1_000,
                "the opener",
            )],
        )
        .await
        .unwrap();
    assert!(store.first_comment_loaded(thread_id).await.unwrap());
}

#[tokio::test]
async fn grep_helpers_apply_every_pattern_and_dedup_threads() {
    let store = open_memory_store().await;
    let forum_url = Url::parse("https://some-forum.com/forums/general.1/").unwrap();
    let (site_id, forum_id) = store.upsert_forum(&forum_url).await.unwrap();
    let thread = sample_thread("https://some-forum.com/threads/hello.5/");
    let thread_id = store.upsert_thread(site_id, forum_id, &thread).await.unwrap();

    store
        .add_comments(
            site_id,
            thread_id,
            &[
                sample_comment(
                    "https://some-forum.com/threads/hello.5/#post-1",
                    "alice",
                    1_000,
                    "rust is great for systems work",
                ),
                sample_comment(
                    "https://some-forum.com/threads/hello.5/#post-2",
                    "bob",
                    2_000,
                    "rust is also memory safe",
                ),
                sample_comment(
                    "https://some-forum.com/threads/hello.5/#post-3",
                    "alice",
                    3_000,
                    "completely unrelated",
                ),
            ],
        )
        .await
        .unwrap();

    let matches = store
        .comment_grep(&["rust".to_string(), "safe".to_string()])
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].author, "bob");

    let threads = store.thread_grep(&["rust".to_string()]).await.unwrap();
    assert_eq!(threads.len(), 1, "two matching comments in one thread still yield one row");
    assert_eq!(threads[0].0, thread_id);

    let authors = store
        .find_author_comments(&["^alice$".to_string()])
        .await
        .unwrap();
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0].username, "alice");
    assert_eq!(authors[0].comments, 2);
    assert_eq!(authors[0].latest, t(3_000));

    let bad = store.find_author_comments(&["(".to_string()]).await;
    assert!(bad.is_err(), "an invalid regex must surface as an error, not a silent empty result");
}

#[tokio::test]
async fn thread_tags_can_be_added_and_removed() {
    let store = open_memory_store().await;
    let forum_url = Url::parse("https://some-forum.com/forums/general.1/").unwrap();
    let (site_id, forum_id) = store.upsert_forum(&forum_url).await.unwrap();
    let thread = sample_thread("https://some-forum.com/threads/hello.5/");
    let thread_id = store.upsert_thread(site_id, forum_id, &thread).await.unwrap();

    store
        .add_thread_tags(thread_id, &["interesting".to_string(), "interesting".to_string()])
        .await
        .unwrap();

    store
        .remove_thread_tags(thread_id, &["interesting".to_string()])
        .await
        .unwrap();
    // Removing twice must not error even though the tag-thread link is gone.
    store
        .remove_thread_tags(thread_id, &["interesting".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn find_thread_resolves_by_id_and_by_url() {
    let store = open_memory_store().await;
    let forum_url = Url::parse("https://some-forum.com/forums/general.1/").unwrap();
    let (site_id, forum_id) = store.upsert_forum(&forum_url).await.unwrap();
    let thread = sample_thread("https://some-forum.com/threads/hello.5/");
    let thread_id = store.upsert_thread(site_id, forum_id, &thread).await.unwrap();

    let (by_id, _) = store.find_thread(&ThreadRef::Id(thread_id)).await.unwrap();
    assert_eq!(by_id, thread_id);

    let (by_url, _) = store
        .find_thread(&ThreadRef::Url(
            "https://some-forum.com/threads/hello.5".to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(by_url, thread_id);

    assert!(store
        .find_thread(&ThreadRef::Url("https://some-forum.com/threads/missing.9/".to_string()))
        .await
        .is_err());
}

#[tokio::test]
async fn thread_participants_are_deduped_and_unordered() {
    let store = open_memory_store().await;
    let forum_url = Url::parse("https://some-forum.com/forums/general.1/").unwrap();
    let (site_id, forum_id) = store.upsert_forum(&forum_url).await.unwrap();
    let thread = sample_thread("https://some-forum.com/threads/hello.5/");
    let thread_id = store.upsert_thread(site_id, forum_id, &thread).await.unwrap();

    store
        .add_comments(
            site_id,
            thread_id,
            &[
                sample_comment("https://some-forum.com/threads/hello.5/#post-1", "alice", 1_000, "a"),
                sample_comment("https://some-forum.com/threads/hello.5/#post-2", "bob", 2_000, "b"),
                sample_comment("https://some-forum.com/threads/hello.5/#post-3", "alice", 3_000, "c"),
            ],
        )
        .await
        .unwrap();

    let mut participants = store.thread_participants(thread_id).await.unwrap();
    participants.sort();
    assert_eq!(participants, vec!["alice".to_string(), "bob".to_string()]);
}

#[tokio::test]
async fn forum_last_scraped_round_trips() {
    let store = open_memory_store().await;
    let forum_url = Url::parse("https://some-forum.com/forums/general.1/").unwrap();
    let (_, forum_id) = store.upsert_forum(&forum_url).await.unwrap();

    assert_eq!(store.get_forum_last_scraped(forum_id).await.unwrap(), None);
    store.set_forum_last_scraped(forum_id, t(4_242)).await.unwrap();
    assert_eq!(store.get_forum_last_scraped(forum_id).await.unwrap(), Some(t(4_242)));
}

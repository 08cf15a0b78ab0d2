//! The persistence store.
//!
//! Grounded in `database/scraper_db.go`: `ScraperStore` is the sole
//! authority over identity assignment and durability. Every public method
//! here corresponds 1:1 to a `ScraperDB` method in that file — upserts
//! resolve/create their dependencies before writing, and conflicts are
//! absorbed rather than treated as errors.
//!
//! The store owns its file path and is constructed once; callers pass
//! `&ScraperStore` down through scraper constructors instead of reaching
//! for a process-global connection.

mod regexp;
mod schema;

use crate::error::{Result, ScrapeError};
use crate::model::{AuthorId, Comment, ForumId, SiteId, Thread, ThreadId, ThreadRef};
use crate::orm;
use crate::url_canon;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, Statement, StreamTrait, TransactionTrait,
};
use std::collections::BTreeMap;
use url::Url;

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_else(|| DateTime::from_timestamp(0, 0).unwrap())
}

fn bad_regex(e: regex::Error) -> ScrapeError {
    ScrapeError::Precondition(format!("bad regex: {e}"))
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| ScrapeError::InvalidUrl(raw.to_string(), e))
}

/// Per-author activity summary, as surfaced by `find_author_comments`.
#[derive(Clone, Debug)]
pub struct AuthorActivity {
    pub id: AuthorId,
    pub username: String,
    pub comments: i64,
    pub latest: DateTime<Utc>,
}

pub struct ScraperStore {
    db: DatabaseConnection,
}

impl ScraperStore {
    /// Opens (creating if absent) a SQLite database at `path` and ensures
    /// the schema exists.
    pub async fn open(path: &str) -> Result<Self> {
        let url = format!("sqlite://{path}?mode=rwc");
        let db = Database::connect(&url).await?;
        schema::ensure_schema(&db).await?;
        Ok(ScraperStore { db })
    }

    /// Builds a store around an already-open connection, used by tests that
    /// want an in-memory database (`sqlite::memory:`).
    pub async fn from_connection(db: DatabaseConnection) -> Result<Self> {
        schema::ensure_schema(&db).await?;
        Ok(ScraperStore { db })
    }

    // ---- identity resolution -------------------------------------------

    async fn get_or_insert_site<C: ConnectionTrait>(conn: &C, hostname: &str) -> Result<SiteId> {
        if let Some(s) = orm::site::Entity::find()
            .filter(orm::site::Column::Hostname.eq(hostname))
            .one(conn)
            .await?
        {
            return Ok(SiteId(s.id));
        }
        let am = orm::site::ActiveModel {
            hostname: Set(hostname.to_string()),
            ..Default::default()
        };
        let res = orm::site::Entity::insert(am).exec(conn).await?;
        Ok(SiteId(res.last_insert_id))
    }

    async fn get_or_insert_author<C: ConnectionTrait>(
        conn: &C,
        site_id: SiteId,
        username: &str,
    ) -> Result<AuthorId> {
        if let Some(a) = orm::author::Entity::find()
            .filter(orm::author::Column::SiteId.eq(site_id.0))
            .filter(orm::author::Column::Username.eq(username))
            .one(conn)
            .await?
        {
            return Ok(AuthorId(a.id));
        }
        let am = orm::author::ActiveModel {
            site_id: Set(site_id.0),
            username: Set(username.to_string()),
            ..Default::default()
        };
        let res = orm::author::Entity::insert(am).exec(conn).await?;
        Ok(AuthorId(res.last_insert_id))
    }

    async fn get_or_insert_tag<C: ConnectionTrait>(conn: &C, name: &str) -> Result<i32> {
        if let Some(t) = orm::tag::Entity::find()
            .filter(orm::tag::Column::Name.eq(name))
            .one(conn)
            .await?
        {
            return Ok(t.id);
        }
        let am = orm::tag::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        };
        let res = orm::tag::Entity::insert(am).exec(conn).await?;
        Ok(res.last_insert_id)
    }

    // ---- write path ------------------------------------------------------

    /// Inserts-or-finds the forum at `url`'s canonical form, lazily creating
    /// its site. Idempotent for the canonical URL.
    pub async fn upsert_forum(&self, url: &Url) -> Result<(SiteId, ForumId)> {
        let hostname = url
            .host_str()
            .ok_or_else(|| ScrapeError::Precondition(format!("no host in {url}")))?
            .to_string();
        let canon = url_canon::canonical_string(url);

        let site_id = Self::get_or_insert_site(&self.db, &hostname).await?;

        let forum_id = if let Some(f) = orm::forum::Entity::find()
            .filter(orm::forum::Column::Url.eq(canon.clone()))
            .one(&self.db)
            .await?
        {
            ForumId(f.id)
        } else {
            let am = orm::forum::ActiveModel {
                site_id: Set(site_id.0),
                url: Set(canon),
                last_scraped: Set(None),
                ..Default::default()
            };
            let res = orm::forum::Entity::insert(am).exec(&self.db).await?;
            ForumId(res.last_insert_id)
        };

        Ok((site_id, forum_id))
    }

    /// Inserts the thread, or on a URL conflict, updates `replies`, `views`
    /// and `latest_activity` only — `title`, `author` and `start_date`
    /// never move once set.
    pub async fn upsert_thread(
        &self,
        site_id: SiteId,
        forum_id: ForumId,
        thread: &Thread,
    ) -> Result<ThreadId> {
        let canon = url_canon::canonical_string(&thread.url);
        let author_id = Self::get_or_insert_author(&self.db, site_id, &thread.author).await?;

        if let Some(existing) = orm::thread::Entity::find()
            .filter(orm::thread::Column::Url.eq(canon.clone()))
            .one(&self.db)
            .await?
        {
            let id = existing.id;
            let mut am: orm::thread::ActiveModel = existing.into();
            am.replies = Set(thread.replies as i64);
            am.views = Set(thread.views as i64);
            am.latest_activity = Set(thread.latest_activity.timestamp());
            am.update(&self.db).await?;
            return Ok(ThreadId(id));
        }

        let am = orm::thread::ActiveModel {
            forum_id: Set(forum_id.0),
            author_id: Set(author_id.0),
            title: Set(thread.title.clone()),
            url: Set(canon),
            replies: Set(thread.replies as i64),
            views: Set(thread.views as i64),
            latest_activity: Set(thread.latest_activity.timestamp()),
            start_date: Set(thread.start_date.timestamp()),
            ..Default::default()
        };
        let res = orm::thread::Entity::insert(am).exec(&self.db).await?;
        Ok(ThreadId(res.last_insert_id))
    }

    /// Inserts every comment not already present under the
    /// `(thread, author, published)` conflict key, in a single transaction
    /// so a partial write never leaves a thread half-updated. The thread's
    /// own site is required explicitly so the author is always resolved on
    /// the correct site, asserting that invariant via this signature
    /// rather than deriving it from the thread row (see DESIGN.md).
    pub async fn add_comments(
        &self,
        site_id: SiteId,
        thread_id: ThreadId,
        comments: &[Comment],
    ) -> Result<()> {
        let txn = self.db.begin().await?;
        for comment in comments {
            let author_id = Self::get_or_insert_author(&txn, site_id, &comment.author).await?;
            let exists = orm::comment::Entity::find()
                .filter(orm::comment::Column::ThreadId.eq(thread_id.0))
                .filter(orm::comment::Column::AuthorId.eq(author_id.0))
                .filter(orm::comment::Column::Published.eq(comment.published.timestamp()))
                .one(&txn)
                .await?;
            if exists.is_some() {
                continue;
            }
            let am = orm::comment::ActiveModel {
                url: Set(url_canon::canonical_string(&comment.url)),
                thread_id: Set(thread_id.0),
                author_id: Set(author_id.0),
                published: Set(comment.published.timestamp()),
                content: Set(comment.content.clone()),
                ..Default::default()
            };
            orm::comment::Entity::insert(am).exec(&txn).await?;
        }
        txn.commit().await?;
        Ok(())
    }

    pub async fn set_forum_last_scraped(&self, forum_id: ForumId, t: DateTime<Utc>) -> Result<()> {
        orm::forum::Entity::update_many()
            .col_expr(
                orm::forum::Column::LastScraped,
                sea_orm::sea_query::Expr::value(t.timestamp()),
            )
            .filter(orm::forum::Column::Id.eq(forum_id.0))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    pub async fn get_forum_last_scraped(&self, forum_id: ForumId) -> Result<Option<DateTime<Utc>>> {
        let forum = orm::forum::Entity::find_by_id(forum_id.0)
            .one(&self.db)
            .await?
            .ok_or_else(|| ScrapeError::Precondition(format!("no forum {}", forum_id.0)))?;
        Ok(forum.last_scraped.map(ts))
    }

    // ---- read path ---------------------------------------------------------

    pub async fn get_site_id(&self, hostname: &str) -> Result<Option<SiteId>> {
        Ok(orm::site::Entity::find()
            .filter(orm::site::Column::Hostname.eq(hostname))
            .one(&self.db)
            .await?
            .map(|s| SiteId(s.id)))
    }

    /// `(earliest, latest)` of `published` across a thread's stored
    /// comments, or `None` if it has none.
    pub async fn comment_time_range(
        &self,
        thread_id: ThreadId,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        let rows = orm::comment::Entity::find()
            .filter(orm::comment::Column::ThreadId.eq(thread_id.0))
            .all(&self.db)
            .await?;
        let mut range: Option<(i64, i64)> = None;
        for row in rows {
            range = Some(match range {
                None => (row.published, row.published),
                Some((lo, hi)) => (lo.min(row.published), hi.max(row.published)),
            });
        }
        Ok(range.map(|(lo, hi)| (ts(lo), ts(hi))))
    }

    /// True iff the earliest stored comment's `published` equals the
    /// thread's `start_date`.
    pub async fn first_comment_loaded(&self, thread_id: ThreadId) -> Result<bool> {
        let thread = orm::thread::Entity::find_by_id(thread_id.0)
            .one(&self.db)
            .await?
            .ok_or_else(|| ScrapeError::Precondition(format!("no thread {}", thread_id.0)))?;
        match self.comment_time_range(thread_id).await? {
            Some((earliest, _)) => Ok(earliest.timestamp() == thread.start_date),
            None => Ok(false),
        }
    }

    async fn thread_to_model(&self, row: orm::thread::Model) -> Result<Thread> {
        let author = orm::author::Entity::find_by_id(row.author_id)
            .one(&self.db)
            .await?
            .map(|a| a.username)
            .unwrap_or_default();
        Ok(Thread {
            url: parse_url(&row.url)?,
            title: row.title,
            author,
            start_date: ts(row.start_date),
            latest_activity: ts(row.latest_activity),
            replies: row.replies.max(0) as u64,
            views: row.views.max(0) as u64,
        })
    }

    /// Looks threads up by id; an empty slice means "every thread"
    /// (grounded in `cli/thread/list.go`'s `GetThreads([])`).
    pub async fn get_threads(&self, ids: &[ThreadId]) -> Result<BTreeMap<ThreadId, Thread>> {
        let rows = if ids.is_empty() {
            orm::thread::Entity::find().all(&self.db).await?
        } else {
            let raw: Vec<i32> = ids.iter().map(|i| i.0).collect();
            orm::thread::Entity::find()
                .filter(orm::thread::Column::Id.is_in(raw))
                .all(&self.db)
                .await?
        };
        let mut out = BTreeMap::new();
        for row in rows {
            let id = ThreadId(row.id);
            out.insert(id, self.thread_to_model(row).await?);
        }
        Ok(out)
    }

    /// Resolves a `ThreadRef` (id or URL) to its row (grounded in
    /// `cli/thread/tag.go` / `cli/thread/participants.go`).
    pub async fn find_thread(&self, arg: &ThreadRef) -> Result<(ThreadId, Thread)> {
        let row = match arg {
            ThreadRef::Id(id) => orm::thread::Entity::find_by_id(id.0).one(&self.db).await?,
            ThreadRef::Url(raw) => {
                let canon = url_canon::canonical_string(&parse_url(raw)?);
                orm::thread::Entity::find()
                    .filter(orm::thread::Column::Url.eq(canon))
                    .one(&self.db)
                    .await?
            }
        }
        .ok_or_else(|| ScrapeError::Precondition(format!("thread not found: {arg:?}")))?;
        let id = ThreadId(row.id);
        let thread = self.thread_to_model(row).await?;
        Ok((id, thread))
    }

    pub async fn thread_comments(&self, thread_id: ThreadId) -> Result<Vec<Comment>> {
        let rows = orm::comment::Entity::find()
            .filter(orm::comment::Column::ThreadId.eq(thread_id.0))
            .order_by_asc(orm::comment::Column::Published)
            .all(&self.db)
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let author = orm::author::Entity::find_by_id(row.author_id)
                .one(&self.db)
                .await?
                .map(|a| a.username)
                .unwrap_or_default();
            out.push(Comment {
                url: parse_url(&row.url)?,
                author,
                published: ts(row.published),
                content: row.content,
            });
        }
        Ok(out)
    }

    pub async fn thread_participants(&self, thread_id: ThreadId) -> Result<Vec<String>> {
        let comments = orm::comment::Entity::find()
            .filter(orm::comment::Column::ThreadId.eq(thread_id.0))
            .all(&self.db)
            .await?;
        let mut ids: Vec<i32> = comments.iter().map(|c| c.author_id).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let authors = orm::author::Entity::find()
            .filter(orm::author::Column::Id.is_in(ids))
            .all(&self.db)
            .await?;
        Ok(authors.into_iter().map(|a| a.username).collect())
    }

    pub async fn get_forums(&self) -> Result<BTreeMap<ForumId, String>> {
        let rows = orm::forum::Entity::find().all(&self.db).await?;
        Ok(rows.into_iter().map(|f| (ForumId(f.id), f.url)).collect())
    }

    pub async fn add_thread_tags(&self, thread_id: ThreadId, tags: &[String]) -> Result<()> {
        for name in tags {
            let tag_id = Self::get_or_insert_tag(&self.db, name).await?;
            let exists = orm::thread_tag::Entity::find()
                .filter(orm::thread_tag::Column::ThreadId.eq(thread_id.0))
                .filter(orm::thread_tag::Column::TagId.eq(tag_id))
                .one(&self.db)
                .await?;
            if exists.is_none() {
                let am = orm::thread_tag::ActiveModel {
                    thread_id: Set(thread_id.0),
                    tag_id: Set(tag_id),
                };
                orm::thread_tag::Entity::insert(am).exec(&self.db).await?;
            }
        }
        Ok(())
    }

    pub async fn remove_thread_tags(&self, thread_id: ThreadId, tags: &[String]) -> Result<()> {
        for name in tags {
            if let Some(tag) = orm::tag::Entity::find()
                .filter(orm::tag::Column::Name.eq(name.as_str()))
                .one(&self.db)
                .await?
            {
                orm::thread_tag::Entity::delete_many()
                    .filter(orm::thread_tag::Column::ThreadId.eq(thread_id.0))
                    .filter(orm::thread_tag::Column::TagId.eq(tag.id))
                    .exec(&self.db)
                    .await?;
            }
        }
        Ok(())
    }

    // ---- regex-filtered read path ----

    /// Author activity matching every pattern in `patterns` against the
    /// username, streamed row-by-row rather than materialised up front
    /// (grounded in `cli/author/grep.go`).
    pub async fn find_author_comments(&self, patterns: &[String]) -> Result<Vec<AuthorActivity>> {
        let stmt = Statement::from_string(
            self.db.get_database_backend(),
            "SELECT a.id AS id, a.username AS username, COUNT(c.id) AS comments, \
             MAX(c.published) AS latest FROM author a, comment c \
             WHERE c.author_id = a.id GROUP BY a.id, a.username"
                .to_string(),
        );
        let mut stream = self.db.stream(stmt).await?;
        let mut out = Vec::new();
        while let Some(row) = stream.try_next().await? {
            let username: String = row.try_get("", "username")?;
            if !regexp::matches_all(patterns, &username).map_err(bad_regex)? {
                continue;
            }
            out.push(AuthorActivity {
                id: AuthorId(row.try_get("", "id")?),
                username,
                comments: row.try_get("", "comments")?,
                latest: ts(row.try_get("", "latest")?),
            });
        }
        out.sort_by(|a, b| b.latest.cmp(&a.latest));
        Ok(out)
    }

    /// Comments whose content matches every pattern in `patterns`
    /// (grounded in `cli/comment/grep.go`).
    pub async fn comment_grep(&self, patterns: &[String]) -> Result<Vec<Comment>> {
        let stmt = Statement::from_string(
            self.db.get_database_backend(),
            "SELECT c.url AS url, a.username AS username, c.published AS published, \
             c.content AS content FROM author a, comment c WHERE a.id = c.author_id \
             ORDER BY c.published DESC"
                .to_string(),
        );
        let mut stream = self.db.stream(stmt).await?;
        let mut out = Vec::new();
        while let Some(row) = stream.try_next().await? {
            let content: String = row.try_get("", "content")?;
            if !regexp::matches_all(patterns, &content).map_err(bad_regex)? {
                continue;
            }
            let url: String = row.try_get("", "url")?;
            out.push(Comment {
                url: parse_url(&url)?,
                author: row.try_get("", "username")?,
                published: ts(row.try_get("", "published")?),
                content,
            });
        }
        Ok(out)
    }

    /// Threads with at least one comment matching every pattern
    /// (grounded in `cli/thread/grep.go`).
    pub async fn thread_grep(&self, patterns: &[String]) -> Result<Vec<(ThreadId, String, String)>> {
        let stmt = Statement::from_string(
            self.db.get_database_backend(),
            "SELECT t.id AS id, t.title AS title, t.url AS url, c.content AS content \
             FROM thread t, comment c WHERE t.id = c.thread_id"
                .to_string(),
        );
        let mut stream = self.db.stream(stmt).await?;
        let mut seen = std::collections::BTreeSet::new();
        let mut out = Vec::new();
        while let Some(row) = stream.try_next().await? {
            let content: String = row.try_get("", "content")?;
            if !regexp::matches_all(patterns, &content).map_err(bad_regex)? {
                continue;
            }
            let id: i32 = row.try_get("", "id")?;
            if !seen.insert(id) {
                continue;
            }
            out.push((
                ThreadId(id),
                row.try_get("", "title")?,
                row.try_get("", "url")?,
            ));
        }
        Ok(out)
    }
}

//! Plain data carried between the scraping engine and the persistence store.
//!
//! Grounded in `database/scraper_db.go`'s `SiteID`/`ForumID`/... newtypes and
//! `model/model.go`'s `Thread`/`Comment` structs. Kept as single owned
//! values per DESIGN NOTES: the listing walker builds a `Thread`, the thread
//! scraper consumes it, neither borrows the other's fields.

use chrono::{DateTime, Utc};
use url::Url;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub i32);

        impl From<i32> for $name {
            fn from(v: i32) -> Self {
                $name(v)
            }
        }

        impl From<$name> for i32 {
            fn from(v: $name) -> Self {
                v.0
            }
        }
    };
}

id_newtype!(SiteId);
id_newtype!(ForumId);
id_newtype!(AuthorId);
id_newtype!(ThreadId);
id_newtype!(CommentId);
id_newtype!(TagId);

/// A thread as discovered by a listing walk or a Reddit subreddit harvest.
#[derive(Clone, Debug, PartialEq)]
pub struct Thread {
    pub url: Url,
    pub title: String,
    pub author: String,
    pub start_date: DateTime<Utc>,
    pub latest_activity: DateTime<Utc>,
    pub replies: u64,
    pub views: u64,
}

/// A single post within a thread.
#[derive(Clone, Debug, PartialEq)]
pub struct Comment {
    pub url: Url,
    pub author: String,
    pub published: DateTime<Utc>,
    pub content: String,
}

/// Identifies a thread row for read-side lookups: either its database id or
/// its (canonical) URL. Grounded in `cli/thread/tag.go` and
/// `cli/thread/participants.go`, which both accept either shape of argument.
#[derive(Clone, Debug, PartialEq)]
pub enum ThreadRef {
    Id(ThreadId),
    Url(String),
}

impl ThreadRef {
    /// Parses a CLI-style argument: all-digits means an id, anything else a
    /// URL, mirroring `utils.ParseURLOrID`.
    pub fn parse(arg: &str) -> ThreadRef {
        if !arg.is_empty() && arg.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = arg.parse::<i32>() {
                return ThreadRef::Id(ThreadId(id));
            }
        }
        ThreadRef::Url(arg.to_string())
    }
}

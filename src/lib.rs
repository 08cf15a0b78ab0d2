//! An incremental forum-activity harvester: discovers threads with recent
//! activity on a XenForo-style forum or a Reddit subreddit, fetches their
//! comments, and persists the normalized content into a local relational
//! store so later queries (by author, by content regex, by tag) can be
//! answered offline.

pub mod app_config;
pub mod error;
pub mod html_extract;
pub mod model;
pub mod orm;
pub mod reddit;
pub mod store;
pub mod url_canon;
pub mod xf;

pub use error::{Result, ScrapeError};
pub use store::ScraperStore;

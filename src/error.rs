//! Error taxonomy.
//!
//! Transport and parse errors are not fatal: callers log them with
//! `log::warn!`/`log::error!` and continue the walk. Only `Store` and
//! `Precondition` are fatal — they unwind out of the scraping engine and
//! are translated into a non-zero exit at the CLI boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// DNS, TCP, TLS or HTTP >= 400. The offending URL is abandoned; loops
    /// continue with the next target.
    #[error("transport error fetching {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A store query or write failed. Fatal to the current invocation.
    #[error("store error: {0}")]
    Store(#[from] sea_orm::DbErr),

    /// Scraping a thread URL with no prior thread row and no forum context,
    /// or any other state the engine cannot proceed from.
    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error("invalid URL {0}: {1}")]
    InvalidUrl(String, #[source] url::ParseError),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

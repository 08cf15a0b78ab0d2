//! The XenForo-style scraping engine.

pub mod client;
pub mod listing;
pub mod page_probe;
pub mod parse;
pub mod thread_scraper;

pub use client::PoliteClient;
pub use listing::ListingWalker;
pub use thread_scraper::ThreadScraper;

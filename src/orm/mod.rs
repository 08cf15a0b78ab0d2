//! SeaORM entities for the harvester's schema.
//!
//! One file per table. `site`, `forum`, `author`, `thread` and `comment`
//! form the core entity chain; `tag` and `thread_tag` are the only part of
//! the schema a thread's tags live in.

pub mod author;
pub mod comment;
pub mod forum;
pub mod site;
pub mod tag;
pub mod thread;
pub mod thread_tag;

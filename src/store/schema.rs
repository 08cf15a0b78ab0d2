//! Raw schema DDL, executed once per fresh database file.
//!
//! Grounded in `database/scraper_db.go`'s `initTables`: the schema is plain
//! SQL rather than a sea-orm migration, so the `UNIQUE` constraints that
//! upsert conflict resolution depends on are exactly the ones the store
//! names, not whatever the derive macros would infer.

use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, Statement};

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS site (
        id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
        hostname TEXT UNIQUE NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS forum (
        id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
        site_id INTEGER NOT NULL REFERENCES site(id),
        url TEXT UNIQUE NOT NULL,
        last_scraped INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS author (
        id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
        site_id INTEGER NOT NULL REFERENCES site(id),
        username TEXT NOT NULL,
        UNIQUE(site_id, username)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS thread (
        id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
        forum_id INTEGER NOT NULL REFERENCES forum(id),
        author_id INTEGER NOT NULL REFERENCES author(id),
        title TEXT NOT NULL,
        url TEXT UNIQUE NOT NULL,
        replies INTEGER NOT NULL DEFAULT 0,
        views INTEGER NOT NULL DEFAULT 0,
        latest_activity INTEGER NOT NULL DEFAULT 0,
        start_date INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comment (
        id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
        url TEXT UNIQUE NOT NULL,
        thread_id INTEGER NOT NULL REFERENCES thread(id),
        author_id INTEGER NOT NULL REFERENCES author(id),
        published INTEGER NOT NULL,
        content TEXT NOT NULL,
        UNIQUE(thread_id, author_id, published)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tag (
        id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
        name TEXT UNIQUE NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS thread_tag (
        thread_id INTEGER NOT NULL REFERENCES thread(id),
        tag_id INTEGER NOT NULL REFERENCES tag(id),
        PRIMARY KEY (thread_id, tag_id)
    )
    "#,
];

/// Creates every table the harvester needs if it isn't already present.
/// Safe to call on every open — `CREATE TABLE IF NOT EXISTS` makes it a
/// no-op against an already-initialised database.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    for stmt in STATEMENTS {
        db.execute(Statement::from_string(db.get_database_backend(), stmt.to_string()))
            .await?;
    }
    Ok(())
}

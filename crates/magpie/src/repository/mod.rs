//! Repository layer for the archive store.
//!
//! All access goes through Diesel over SQLite, made async with
//! diesel-async's `SyncConnectionWrapper`. One repository per entity;
//! `Repositories` bundles them for callers that need several.

mod links;
mod pool;
mod records;
mod snapshots;
mod sources;
mod urls;

pub use links::LinkRepository;
pub use pool::{AsyncSqliteConnection, AsyncSqlitePool, DieselError};
pub use snapshots::SnapshotRepository;
pub use sources::SourceRepository;
pub use urls::UrlRepository;

use chrono::{DateTime, SecondsFormat, Utc};
use diesel_async::SimpleAsyncConnection;

/// Bundled repository access for all store operations.
#[derive(Clone)]
pub struct Repositories {
    pub urls: UrlRepository,
    pub links: LinkRepository,
    pub snapshots: SnapshotRepository,
    pub sources: SourceRepository,
    pool: AsyncSqlitePool,
}

impl Repositories {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self {
            urls: UrlRepository::new(pool.clone()),
            links: LinkRepository::new(pool.clone()),
            snapshots: SnapshotRepository::new(pool.clone()),
            sources: SourceRepository::new(pool.clone()),
            pool,
        }
    }

    /// Open the store at the given SQLite URL or path.
    pub fn open(database_url: &str) -> Self {
        Self::new(AsyncSqlitePool::new(database_url))
    }

    pub fn pool(&self) -> &AsyncSqlitePool {
        &self.pool
    }

    /// Create the schema if it does not exist yet. Idempotent.
    pub async fn init_schema(&self) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        conn.batch_execute(SCHEMA_SQL).await
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS urls (
    id TEXT PRIMARY KEY,
    url TEXT NOT NULL UNIQUE,
    host TEXT NOT NULL,
    created TEXT NOT NULL,
    updated TEXT NOT NULL,
    last_head TEXT,
    last_get TEXT,
    status INTEGER NOT NULL DEFAULT -1,
    content_type TEXT NOT NULL DEFAULT '',
    content_sniff TEXT NOT NULL DEFAULT '',
    content_length BIGINT NOT NULL DEFAULT -1,
    file_name TEXT NOT NULL DEFAULT '',
    title TEXT NOT NULL DEFAULT '',
    headers TEXT NOT NULL DEFAULT '[]',
    hash TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_urls_host ON urls(host);
CREATE INDEX IF NOT EXISTS idx_urls_last_get ON urls(last_get);

CREATE TABLE IF NOT EXISTS links (
    src TEXT NOT NULL,
    dst TEXT NOT NULL,
    created TEXT NOT NULL,
    updated TEXT NOT NULL,
    PRIMARY KEY (src, dst)
);
CREATE INDEX IF NOT EXISTS idx_links_dst ON links(dst);

CREATE TABLE IF NOT EXISTS snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    created TEXT NOT NULL,
    status INTEGER NOT NULL,
    duration_ms BIGINT NOT NULL DEFAULT 0,
    headers TEXT NOT NULL DEFAULT '[]',
    hash TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_snapshots_url ON snapshots(url);

CREATE TABLE IF NOT EXISTS sources (
    id TEXT PRIMARY KEY,
    url TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL DEFAULT '',
    crawl INTEGER NOT NULL DEFAULT 0,
    stale_hours BIGINT,
    metadata TEXT NOT NULL DEFAULT '{}',
    created TEXT NOT NULL,
    updated TEXT NOT NULL
);
"#;

/// Parse a stored datetime, defaulting to the Unix epoch on error.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH)
}

pub(crate) fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(|v| parse_datetime(&v))
}

/// Format a datetime the way the store expects it: RFC 3339, seconds.
pub(crate) fn fmt_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn fmt_datetime_opt(dt: Option<DateTime<Utc>>) -> Option<String> {
    dt.map(fmt_datetime)
}

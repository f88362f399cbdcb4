//! URL record persistence.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::pool::{AsyncSqlitePool, DieselError};
use super::records::UrlRecord;
use crate::models::Url;
use crate::schema::urls;

/// Repository for URL records, keyed by the normalized URL string.
#[derive(Clone)]
pub struct UrlRepository {
    pool: AsyncSqlitePool,
}

impl UrlRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Look up a record by its normalized URL string.
    pub async fn get(&self, url: &str) -> Result<Option<Url>, DieselError> {
        let mut conn = self.pool.get().await?;
        urls::table
            .filter(urls::url.eq(url))
            .first::<UrlRecord>(&mut conn)
            .await
            .optional()
            .and_then(|opt| opt.map(Url::try_from).transpose())
    }

    /// Insert or update a record. On conflict the stored `id` and `created`
    /// are preserved, so identifiers stay stable across a record's life.
    pub async fn save(&self, url: &Url) -> Result<(), DieselError> {
        let record = UrlRecord::from(url);
        let mut conn = self.pool.get().await?;
        diesel::insert_into(urls::table)
            .values(&record)
            .on_conflict(urls::url)
            .do_update()
            .set((
                urls::host.eq(&record.host),
                urls::updated.eq(&record.updated),
                urls::last_head.eq(&record.last_head),
                urls::last_get.eq(&record.last_get),
                urls::status.eq(record.status),
                urls::content_type.eq(&record.content_type),
                urls::content_sniff.eq(&record.content_sniff),
                urls::content_length.eq(record.content_length),
                urls::file_name.eq(&record.file_name),
                urls::title.eq(&record.title),
                urls::headers.eq(&record.headers),
                urls::hash.eq(&record.hash),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Insert the record only if the URL is unknown, then return the
    /// stored record. Concurrent double-inserts collapse onto one row.
    pub async fn create_if_missing(&self, url: &Url) -> Result<Url, DieselError> {
        let record = UrlRecord::from(url);
        {
            let mut conn = self.pool.get().await?;
            diesel::insert_into(urls::table)
                .values(&record)
                .on_conflict(urls::url)
                .do_nothing()
                .execute(&mut conn)
                .await?;
        }
        match self.get(&url.url).await? {
            Some(stored) => Ok(stored),
            None => Err(DieselError::NotFound),
        }
    }

    /// Page through records, optionally restricted to fetched ones.
    pub async fn list(
        &self,
        fetched_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Url>, DieselError> {
        let mut conn = self.pool.get().await?;
        let records = if fetched_only {
            urls::table
                .filter(urls::last_get.is_not_null())
                .order(urls::url.asc())
                .limit(limit)
                .offset(offset)
                .load::<UrlRecord>(&mut conn)
                .await?
        } else {
            urls::table
                .order(urls::url.asc())
                .limit(limit)
                .offset(offset)
                .load::<UrlRecord>(&mut conn)
                .await?
        };
        records.into_iter().map(Url::try_from).collect()
    }

    /// Records that have never completed a GET, oldest first.
    pub async fn list_unfetched(&self, limit: i64) -> Result<Vec<Url>, DieselError> {
        let mut conn = self.pool.get().await?;
        let records = urls::table
            .filter(urls::last_get.is_null())
            .order(urls::created.asc())
            .limit(limit)
            .load::<UrlRecord>(&mut conn)
            .await?;
        records.into_iter().map(Url::try_from).collect()
    }

    pub async fn count(&self) -> Result<i64, DieselError> {
        use diesel::dsl::count_star;
        let mut conn = self.pool.get().await?;
        urls::table.select(count_star()).first(&mut conn).await
    }
}

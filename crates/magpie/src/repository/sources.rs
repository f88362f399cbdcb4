//! Source policy persistence.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::pool::{AsyncSqlitePool, DieselError};
use super::records::SourceRecord;
use crate::models::Source;
use crate::schema::sources;

#[derive(Clone)]
pub struct SourceRepository {
    pool: AsyncSqlitePool,
}

impl SourceRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or update a source, keyed by id.
    pub async fn save(&self, source: &Source) -> Result<(), DieselError> {
        let record = SourceRecord::from(source);
        let mut conn = self.pool.get().await?;
        diesel::insert_into(sources::table)
            .values(&record)
            .on_conflict(sources::id)
            .do_update()
            .set((
                sources::url.eq(&record.url),
                sources::name.eq(&record.name),
                sources::crawl.eq(record.crawl),
                sources::stale_hours.eq(record.stale_hours),
                sources::metadata.eq(&record.metadata),
                sources::updated.eq(&record.updated),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Source>, DieselError> {
        let mut conn = self.pool.get().await?;
        sources::table
            .find(id)
            .first::<SourceRecord>(&mut conn)
            .await
            .optional()
            .and_then(|opt| opt.map(Source::try_from).transpose())
    }

    pub async fn get_all(&self) -> Result<Vec<Source>, DieselError> {
        let mut conn = self.pool.get().await?;
        let records = sources::table
            .order(sources::url.asc())
            .load::<SourceRecord>(&mut conn)
            .await?;
        records.into_iter().map(Source::try_from).collect()
    }

    /// Sources whose pages the scheduler should expand recursively.
    pub async fn crawl_sources(&self) -> Result<Vec<Source>, DieselError> {
        let mut conn = self.pool.get().await?;
        let records = sources::table
            .filter(sources::crawl.eq(1))
            .load::<SourceRecord>(&mut conn)
            .await?;
        records.into_iter().map(Source::try_from).collect()
    }

    /// Sources whose prefix contains the given normalized URL. The source
    /// table is small, so the prefix scan happens in memory.
    pub async fn containing(&self, url: &str) -> Result<Vec<Source>, DieselError> {
        let mut all = self.get_all().await?;
        all.retain(|s| s.contains(url));
        Ok(all)
    }
}

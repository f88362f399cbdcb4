//! Snapshot persistence. Append-only: rows are inserted and never touched
//! again.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::pool::{AsyncSqlitePool, DieselError};
use super::records::{NewSnapshotRecord, SnapshotRecord};
use crate::models::Snapshot;
use crate::schema::snapshots;

#[derive(Clone)]
pub struct SnapshotRepository {
    pool: AsyncSqlitePool,
}

impl SnapshotRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Append one snapshot.
    pub async fn append(&self, snapshot: &Snapshot) -> Result<(), DieselError> {
        let record = NewSnapshotRecord::from(snapshot);
        let mut conn = self.pool.get().await?;
        diesel::insert_into(snapshots::table)
            .values(&record)
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Snapshots for one URL in append order (`created`, then insert order
    /// for equal seconds).
    pub async fn list_for_url(&self, url: &str) -> Result<Vec<Snapshot>, DieselError> {
        let mut conn = self.pool.get().await?;
        let records = snapshots::table
            .filter(snapshots::url.eq(url))
            .order((snapshots::created.asc(), snapshots::id.asc()))
            .load::<SnapshotRecord>(&mut conn)
            .await?;
        records.into_iter().map(Snapshot::try_from).collect()
    }

    pub async fn count_for_url(&self, url: &str) -> Result<i64, DieselError> {
        use diesel::dsl::count_star;
        let mut conn = self.pool.get().await?;
        snapshots::table
            .filter(snapshots::url.eq(url))
            .select(count_star())
            .first(&mut conn)
            .await
    }
}

//! Link edge persistence.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::pool::{AsyncSqlitePool, DieselError};
use super::records::LinkRecord;
use crate::models::Link;
use crate::schema::links;

/// Repository for link edges, keyed by the `(src, dst)` pair.
#[derive(Clone)]
pub struct LinkRepository {
    pool: AsyncSqlitePool,
}

impl LinkRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Record an observation of the edge. First observation creates the
    /// row; later ones only move `updated`.
    pub async fn save(&self, link: &Link) -> Result<(), DieselError> {
        let record = LinkRecord::from(link);
        let mut conn = self.pool.get().await?;
        diesel::insert_into(links::table)
            .values(&record)
            .on_conflict((links::src, links::dst))
            .do_update()
            .set(links::updated.eq(&record.updated))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn get(&self, src: &str, dst: &str) -> Result<Option<Link>, DieselError> {
        let mut conn = self.pool.get().await?;
        links::table
            .find((src, dst))
            .first::<LinkRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(Link::from))
    }

    /// All outbound edges of a URL.
    pub async fn list_from(&self, src: &str) -> Result<Vec<Link>, DieselError> {
        let mut conn = self.pool.get().await?;
        let records = links::table
            .filter(links::src.eq(src))
            .order(links::dst.asc())
            .load::<LinkRecord>(&mut conn)
            .await?;
        Ok(records.into_iter().map(Link::from).collect())
    }

    pub async fn count(&self) -> Result<i64, DieselError> {
        use diesel::dsl::count_star;
        let mut conn = self.pool.get().await?;
        links::table.select(count_star()).first(&mut conn).await
    }
}

//! Async SQLite connection factory.
//!
//! Uses diesel-async's `SyncConnectionWrapper` to provide an async
//! interface over Diesel's SQLite connection. SQLite connections are
//! lightweight and file-based, so a new connection is established per
//! request rather than pooled; the wrapper runs blocking work on the
//! runtime's blocking pool.

use std::path::Path;

use diesel::sqlite::SqliteConnection;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::AsyncConnection;

/// Diesel error type alias used across the repository layer.
pub type DieselError = diesel::result::Error;

/// Async SQLite connection.
pub type AsyncSqliteConnection = SyncConnectionWrapper<SqliteConnection>;

/// Connection factory for the archive store.
#[derive(Clone)]
pub struct AsyncSqlitePool {
    database_url: String,
}

impl AsyncSqlitePool {
    /// Create a factory from a database URL or bare path.
    pub fn new(database_url: &str) -> Self {
        // Diesel wants the bare path, not a sqlite: URL
        let url = database_url
            .strip_prefix("sqlite://")
            .or_else(|| database_url.strip_prefix("sqlite:"))
            .unwrap_or(database_url);
        Self {
            database_url: url.to_string(),
        }
    }

    /// Create a factory from a file path.
    pub fn from_path(db_path: &Path) -> Self {
        Self::new(&db_path.display().to_string())
    }

    /// Establish a new connection.
    pub async fn get(&self) -> Result<AsyncSqliteConnection, DieselError> {
        AsyncSqliteConnection::establish(&self.database_url)
            .await
            .map_err(connection_error)
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}

fn connection_error(e: diesel::ConnectionError) -> DieselError {
    DieselError::DatabaseError(
        diesel::result::DatabaseErrorKind::UnableToSendCommand,
        Box::new(e.to_string()),
    )
}

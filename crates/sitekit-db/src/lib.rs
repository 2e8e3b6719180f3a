//! Sitekit Database - SQLite query execution layer
//!
//! A thin executor over a connection pool: parameterized
//! INSERT/UPDATE/SELECT/DELETE/custom statements with named or positional
//! binding, reporting affected-row counts and last-insert ids per call.

mod exec;
mod value;

pub use value::{ExecResult, SqlValue};

use sitekit_core::{Error, Result};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::info;

/// Database connection and operations
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) a database file and connect a pool to it
    pub async fn new(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::db(e.to_string()))?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());
        info!("Connecting to database: {}", url);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(db_error)?;

        // Set database file permissions to owner-only (0600) for security
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
                tracing::warn!("Failed to set database file permissions: {}", e);
            }
        }

        info!("Database ready");
        Ok(Self { pool })
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Map any sqlx failure onto the uniform database error signal, carrying the
/// native error code when the driver reports one
pub(crate) fn db_error(err: sqlx::Error) -> Error {
    match err.as_database_error() {
        Some(native) => Error::Database {
            code: native.code().map(|c| c.into_owned()),
            message: native.message().to_string(),
        },
        None => Error::db(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_database_creation() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        let db = Database::new(&db_path).await.unwrap();
        assert!(db_path.exists());
        db.close().await;
    }

    #[tokio::test]
    async fn test_creation_makes_parent_dirs() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested/data/test.db");

        let db = Database::new(&db_path).await.unwrap();
        assert!(db_path.exists());
        db.close().await;
    }
}

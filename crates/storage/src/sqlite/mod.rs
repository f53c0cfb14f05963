use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::flatfile::FlatFileInitError;
use crate::repository::{ProgressRepository, SessionRepository, Storage, TurnRepository};

mod mapping;
mod migrate;
mod progress_repo;
mod session_repo;
mod turn_repo;

#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Connect to `SQLite` using the given URL.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the connection cannot be established or if
    /// enforcing foreign key constraints fails during setup.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys = ON;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA journal_mode = WAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA busy_timeout = 5000;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Build a `Storage` backed by `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo.clone());
        let turns: Arc<dyn TurnRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Ok(Self {
            sessions,
            turns,
            progress,
        })
    }

    /// Build a `Storage` backed by `SQLite`, degrading to the flat-file store
    /// when the relational store is unreachable or cannot be migrated.
    ///
    /// The degradation is an availability-over-durability tradeoff taken
    /// deliberately at startup; it is logged, never silent.
    ///
    /// # Errors
    ///
    /// Returns `FlatFileInitError` only if the fallback store itself cannot be
    /// opened.
    pub async fn sqlite_with_flat_file_fallback(
        database_url: &str,
        fallback_path: impl AsRef<Path>,
    ) -> Result<Self, FlatFileInitError> {
        match Self::sqlite(database_url).await {
            Ok(storage) => Ok(storage),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    fallback = %fallback_path.as_ref().display(),
                    "relational store unavailable, degrading to flat-file store"
                );
                Self::flat_file(fallback_path)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqliteRepository>();
    }
}

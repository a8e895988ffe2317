//! Connection pool and migrations.

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

/// Main database handle.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

/// Row counts shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DatabaseStats {
    pub patients: i64,
    pub transcripts: i64,
    pub cached_trials: i64,
    pub saved_trials: i64,
    pub provider_recommendations: i64,
}

impl Database {
    /// Open a pool for `url` (e.g. `sqlite://transcriptscribe.db?mode=rwc`).
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        info!(%url, max_connections, "Connected to database");
        Ok(Self { pool })
    }

    /// Private in-memory database, already migrated. Single connection so
    /// every query sees the same memory store.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    pub async fn stats(&self) -> Result<DatabaseStats> {
        Ok(DatabaseStats {
            patients:                 self.count_rows("patients").await?,
            transcripts:              self.count_rows("transcripts").await?,
            cached_trials:            self.count_rows("clinical_trials").await?,
            saved_trials:             self.count_rows("saved_trials").await?,
            provider_recommendations: self.count_rows("provider_recommended_trials").await?,
        })
    }

    async fn count_rows(&self, table: &'static str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        Ok(sqlx::query_scalar::<_, i64>(&sql).fetch_one(&self.pool).await?)
    }
}

use crate::database::Database;
use crate::error::Result;
use chrono::{DateTime, Utc};
use scribe_common::SavedTrial;
use std::sync::Arc;
use uuid::Uuid;

/// Patient bookmarks. One row per (patient, trial).
#[derive(Clone)]
pub struct SavedTrialRepository {
    db: Arc<Database>,
}

impl SavedTrialRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Returns `true` when a new bookmark was created, `false` when it
    /// already existed.
    pub async fn save(&self, patient_id: Uuid, trial_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO saved_trials (patient_id, trial_id, created_at) VALUES (?, ?, ?) \
             ON CONFLICT (patient_id, trial_id) DO NOTHING",
        )
        .bind(patient_id)
        .bind(trial_id)
        .bind(Utc::now())
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns `true` when a bookmark was removed.
    pub async fn remove(&self, patient_id: Uuid, trial_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM saved_trials WHERE patient_id = ? AND trial_id = ?")
            .bind(patient_id)
            .bind(trial_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Newest first.
    pub async fn list(&self, patient_id: Uuid) -> Result<Vec<SavedTrial>> {
        let rows: Vec<(Uuid, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT patient_id, trial_id, created_at FROM saved_trials \
             WHERE patient_id = ? ORDER BY rowid DESC",
        )
        .bind(patient_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(patient_id, trial_id, created_at)| SavedTrial { patient_id, trial_id, created_at })
            .collect())
    }

    pub async fn trial_ids(&self, patient_id: Uuid) -> Result<Vec<String>> {
        Ok(self.list(patient_id).await?.into_iter().map(|s| s.trial_id).collect())
    }

    pub async fn count(&self) -> Result<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM saved_trials")
            .fetch_one(self.db.pool())
            .await?)
    }
}

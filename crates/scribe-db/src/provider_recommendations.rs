//! Provider-recommended trials and their accept/reject workflow.

use crate::database::Database;
use crate::error::{DbError, Result};
use chrono::{DateTime, Utc};
use scribe_common::{ProviderRecommendedTrial, RecommendationStatus};
use std::sync::Arc;
use uuid::Uuid;

const COLUMNS: &str = "id, patient_id, trial_id, transcript_id, note, status, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ProviderRecRow {
    id: Uuid,
    patient_id: Uuid,
    trial_id: String,
    transcript_id: Option<Uuid>,
    note: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProviderRecRow> for ProviderRecommendedTrial {
    type Error = DbError;

    fn try_from(row: ProviderRecRow) -> Result<Self> {
        Ok(ProviderRecommendedTrial {
            id: row.id,
            patient_id: row.patient_id,
            trial_id: row.trial_id,
            transcript_id: row.transcript_id,
            note: row.note,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct ProviderRecommendationRepository {
    db: Arc<Database>,
}

impl ProviderRecommendationRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Recommend a trial to a patient. Recommending the same trial again
    /// puts it back to PENDING with the new note.
    pub async fn upsert(
        &self,
        patient_id: Uuid,
        trial_id: &str,
        transcript_id: Option<Uuid>,
        note: Option<&str>,
    ) -> Result<ProviderRecommendedTrial> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO provider_recommended_trials
                (id, patient_id, trial_id, transcript_id, note, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 'PENDING', ?, ?)
            ON CONFLICT (patient_id, trial_id) DO UPDATE SET
                transcript_id = COALESCE(excluded.transcript_id, transcript_id),
                note = excluded.note,
                status = 'PENDING',
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(patient_id)
        .bind(trial_id)
        .bind(transcript_id)
        .bind(note)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await?;

        self.get(patient_id, trial_id).await
    }

    pub async fn find(&self, patient_id: Uuid, trial_id: &str) -> Result<Option<ProviderRecommendedTrial>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM provider_recommended_trials WHERE patient_id = ? AND trial_id = ?"
        );
        sqlx::query_as::<_, ProviderRecRow>(&sql)
            .bind(patient_id)
            .bind(trial_id)
            .fetch_optional(self.db.pool())
            .await?
            .map(ProviderRecommendedTrial::try_from)
            .transpose()
    }

    pub async fn get(&self, patient_id: Uuid, trial_id: &str) -> Result<ProviderRecommendedTrial> {
        self.find(patient_id, trial_id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("recommendation of {trial_id} for patient {patient_id}")))
    }

    /// Set the status from any current state.
    pub async fn set_status(
        &self,
        patient_id: Uuid,
        trial_id: &str,
        status: RecommendationStatus,
    ) -> Result<ProviderRecommendedTrial> {
        let result = sqlx::query(
            "UPDATE provider_recommended_trials SET status = ?, updated_at = ? \
             WHERE patient_id = ? AND trial_id = ?",
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(patient_id)
        .bind(trial_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!(
                "recommendation of {trial_id} for patient {patient_id}"
            )));
        }
        self.get(patient_id, trial_id).await
    }

    pub async fn delete(&self, patient_id: Uuid, trial_id: &str) -> Result<()> {
        let result = sqlx::query(
            "DELETE FROM provider_recommended_trials WHERE patient_id = ? AND trial_id = ?",
        )
        .bind(patient_id)
        .bind(trial_id)
        .execute(self.db.pool())
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!(
                "recommendation of {trial_id} for patient {patient_id}"
            )));
        }
        Ok(())
    }

    /// Newest first, optionally restricted to one status.
    pub async fn list(
        &self,
        patient_id: Uuid,
        status: Option<RecommendationStatus>,
    ) -> Result<Vec<ProviderRecommendedTrial>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM provider_recommended_trials \
             WHERE patient_id = ? AND (? IS NULL OR status = ?) ORDER BY rowid DESC"
        );
        let status = status.map(|s| s.as_str());
        let rows = sqlx::query_as::<_, ProviderRecRow>(&sql)
            .bind(patient_id)
            .bind(status)
            .bind(status)
            .fetch_all(self.db.pool())
            .await?;
        rows.into_iter().map(ProviderRecommendedTrial::try_from).collect()
    }

    /// Count across all patients, or for one patient when given.
    pub async fn count_with_status(
        &self,
        patient_id: Option<Uuid>,
        status: RecommendationStatus,
    ) -> Result<i64> {
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM provider_recommended_trials \
             WHERE status = ? AND (? IS NULL OR patient_id = ?)",
        )
        .bind(status.as_str())
        .bind(patient_id)
        .bind(patient_id)
        .fetch_one(self.db.pool())
        .await?)
    }
}

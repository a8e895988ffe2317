//! Matching results per transcript.

use crate::database::Database;
use crate::error::{DbError, Result};
use chrono::{DateTime, Utc};
use scribe_common::TranscriptRecommendation;
use sqlx::types::Json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
struct RecommendationRow {
    id: Uuid,
    transcript_id: Uuid,
    eligible_trial_ids: Json<Vec<String>>,
    uncertain_trial_ids: Json<Vec<String>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RecommendationRow> for TranscriptRecommendation {
    fn from(row: RecommendationRow) -> Self {
        TranscriptRecommendation {
            id: row.id,
            transcript_id: row.transcript_id,
            eligible_trial_ids: row.eligible_trial_ids.0,
            uncertain_trial_ids: row.uncertain_trial_ids.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct RecommendationRepository {
    db: Arc<Database>,
}

impl RecommendationRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store the result for a transcript, replacing any earlier run.
    pub async fn replace(&self, rec: &TranscriptRecommendation) -> Result<TranscriptRecommendation> {
        sqlx::query(
            r#"
            INSERT INTO transcript_recommendations
                (id, transcript_id, eligible_trial_ids, uncertain_trial_ids, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (transcript_id) DO UPDATE SET
                eligible_trial_ids = excluded.eligible_trial_ids,
                uncertain_trial_ids = excluded.uncertain_trial_ids,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(rec.id)
        .bind(rec.transcript_id)
        .bind(Json(&rec.eligible_trial_ids))
        .bind(Json(&rec.uncertain_trial_ids))
        .bind(rec.created_at)
        .bind(rec.updated_at)
        .execute(self.db.pool())
        .await?;

        self.find_by_transcript(rec.transcript_id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("recommendation for transcript {}", rec.transcript_id)))
    }

    pub async fn find_by_transcript(&self, transcript_id: Uuid) -> Result<Option<TranscriptRecommendation>> {
        let row = sqlx::query_as::<_, RecommendationRow>(
            "SELECT id, transcript_id, eligible_trial_ids, uncertain_trial_ids, created_at, updated_at \
             FROM transcript_recommendations WHERE transcript_id = ?",
        )
        .bind(transcript_id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(row.map(Into::into))
    }
}

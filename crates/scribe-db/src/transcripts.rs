//! Transcript repository.
//!
//! Status moves PENDING → PROCESSING → COMPLETED | FAILED. The transition
//! into PROCESSING is a conditional update so two workers cannot both claim
//! the same transcript.

use crate::database::Database;
use crate::error::{DbError, Result};
use chrono::{DateTime, Utc};
use scribe_common::{ParsedTranscript, Transcript, TranscriptStatus};
use serde::Serialize;
use sqlx::types::Json;
use std::sync::Arc;
use uuid::Uuid;

const TRANSCRIPT_COLUMNS: &str =
    "id, patient_id, raw_transcript, recorded_at, status, parsed, error, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct TranscriptRow {
    id: Uuid,
    patient_id: Uuid,
    raw_transcript: Option<String>,
    recorded_at: Option<DateTime<Utc>>,
    status: String,
    parsed: Option<Json<ParsedTranscript>>,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TranscriptRow> for Transcript {
    type Error = DbError;

    fn try_from(row: TranscriptRow) -> Result<Self> {
        Ok(Transcript {
            id: row.id,
            patient_id: row.patient_id,
            raw_transcript: row.raw_transcript,
            recorded_at: row.recorded_at,
            status: row.status.parse()?,
            parsed: row.parsed.map(|Json(p)| p),
            error: row.error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Transcript counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

impl StatusCounts {
    pub fn total(&self) -> i64 {
        self.pending + self.processing + self.completed + self.failed
    }
}

#[derive(Clone)]
pub struct TranscriptRepository {
    db: Arc<Database>,
}

impl TranscriptRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store a new PENDING transcript. Fails with `ForeignKey` when the
    /// patient does not exist.
    pub async fn create(
        &self,
        patient_id: Uuid,
        raw_transcript: Option<&str>,
        recorded_at: Option<DateTime<Utc>>,
    ) -> Result<Transcript> {
        let now = Utc::now();
        let transcript = Transcript {
            id: Uuid::new_v4(),
            patient_id,
            raw_transcript: raw_transcript.map(str::to_string),
            recorded_at,
            status: TranscriptStatus::Pending,
            parsed: None,
            error: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO transcripts
                (id, patient_id, raw_transcript, recorded_at, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(transcript.id)
        .bind(transcript.patient_id)
        .bind(&transcript.raw_transcript)
        .bind(transcript.recorded_at)
        .bind(transcript.status.as_str())
        .bind(transcript.created_at)
        .bind(transcript.updated_at)
        .execute(self.db.pool())
        .await?;

        Ok(transcript)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Transcript>> {
        let sql = format!("SELECT {TRANSCRIPT_COLUMNS} FROM transcripts WHERE id = ?");
        sqlx::query_as::<_, TranscriptRow>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .map(Transcript::try_from)
            .transpose()
    }

    pub async fn get(&self, id: Uuid) -> Result<Transcript> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("transcript {id}")))
    }

    /// Newest first.
    pub async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Transcript>> {
        let sql = format!(
            "SELECT {TRANSCRIPT_COLUMNS} FROM transcripts WHERE patient_id = ? ORDER BY rowid DESC"
        );
        let rows = sqlx::query_as::<_, TranscriptRow>(&sql)
            .bind(patient_id)
            .fetch_all(self.db.pool())
            .await?;
        rows.into_iter().map(Transcript::try_from).collect()
    }

    /// All transcripts, newest first, optionally restricted to one status.
    pub async fn list(&self, status: Option<TranscriptStatus>) -> Result<Vec<Transcript>> {
        let sql = format!(
            "SELECT {TRANSCRIPT_COLUMNS} FROM transcripts \
             WHERE (? IS NULL OR status = ?) ORDER BY rowid DESC"
        );
        let status = status.map(|s| s.as_str());
        let rows = sqlx::query_as::<_, TranscriptRow>(&sql)
            .bind(status)
            .bind(status)
            .fetch_all(self.db.pool())
            .await?;
        rows.into_iter().map(Transcript::try_from).collect()
    }

    /// Claim a transcript for processing. Returns `false` when it is already
    /// PROCESSING; clears any previous result or error.
    pub async fn try_start_processing(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE transcripts
            SET status = 'PROCESSING', parsed = NULL, error = NULL, updated_at = ?
            WHERE id = ? AND status != 'PROCESSING'
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish "missing" from "busy".
            self.get(id).await?;
            return Ok(false);
        }
        Ok(true)
    }

    pub async fn mark_completed(&self, id: Uuid, parsed: &ParsedTranscript) -> Result<Transcript> {
        sqlx::query(
            "UPDATE transcripts SET status = 'COMPLETED', parsed = ?, error = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(Json(parsed))
        .bind(Utc::now())
        .bind(id)
        .execute(self.db.pool())
        .await?;
        self.get(id).await
    }

    pub async fn mark_failed(&self, id: Uuid, error: &str) -> Result<Transcript> {
        sqlx::query(
            "UPDATE transcripts SET status = 'FAILED', error = ?, updated_at = ? WHERE id = ?",
        )
        .bind(error)
        .bind(Utc::now())
        .bind(id)
        .execute(self.db.pool())
        .await?;
        self.get(id).await
    }

    /// Move every PROCESSING row to FAILED with `error`. Run at startup: no
    /// worker survives a restart, so those claims would never be released.
    pub async fn fail_interrupted(&self, error: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE transcripts SET status = 'FAILED', error = ?, updated_at = ? WHERE status = 'PROCESSING'",
        )
        .bind(error)
        .bind(Utc::now())
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM transcripts WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("transcript {id}")));
        }
        Ok(())
    }

    pub async fn count_by_status(&self) -> Result<StatusCounts> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM transcripts GROUP BY status")
                .fetch_all(self.db.pool())
                .await?;

        let mut counts = StatusCounts::default();
        for (status, n) in rows {
            match status.parse::<TranscriptStatus>()? {
                TranscriptStatus::Pending    => counts.pending = n,
                TranscriptStatus::Processing => counts.processing = n,
                TranscriptStatus::Completed  => counts.completed = n,
                TranscriptStatus::Failed     => counts.failed = n,
            }
        }
        Ok(counts)
    }
}

//! Clinical trial cache.
//!
//! Registry studies are stored whole as JSON, keyed by registry id, with a
//! few columns pulled out for listing.

use crate::database::Database;
use crate::error::Result;
use chrono::Utc;
use scribe_common::ClinicalTrial;
use sqlx::types::Json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct TrialRepository {
    db: Arc<Database>,
}

impl TrialRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert or refresh one trial.
    pub async fn upsert(&self, trial: &ClinicalTrial) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO clinical_trials (external_id, brief_title, status, source_registry, document, fetched_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (external_id) DO UPDATE SET
                brief_title = excluded.brief_title,
                status = excluded.status,
                source_registry = excluded.source_registry,
                document = excluded.document,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(&trial.external_id)
        .bind(&trial.brief_title)
        .bind(&trial.status)
        .bind(trial.source_registry.as_str())
        .bind(Json(trial))
        .bind(Utc::now())
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn upsert_many(&self, trials: &[ClinicalTrial]) -> Result<()> {
        for trial in trials {
            self.upsert(trial).await?;
        }
        debug!(count = trials.len(), "Cached trials");
        Ok(())
    }

    pub async fn find_by_id(&self, external_id: &str) -> Result<Option<ClinicalTrial>> {
        let doc: Option<Json<ClinicalTrial>> =
            sqlx::query_scalar("SELECT document FROM clinical_trials WHERE external_id = ?")
                .bind(external_id)
                .fetch_optional(self.db.pool())
                .await?;
        Ok(doc.map(|Json(t)| t))
    }

    /// Fetch several trials, returned in the order of `ids`. Ids with no
    /// cached row are skipped.
    pub async fn find_many(&self, ids: &[String]) -> Result<Vec<ClinicalTrial>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT document FROM clinical_trials WHERE external_id IN ({placeholders})");

        let mut query = sqlx::query_scalar::<_, Json<ClinicalTrial>>(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let mut by_id: HashMap<String, ClinicalTrial> = query
            .fetch_all(self.db.pool())
            .await?
            .into_iter()
            .map(|Json(t)| (t.external_id.clone(), t))
            .collect();

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    pub async fn count(&self) -> Result<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM clinical_trials")
            .fetch_one(self.db.pool())
            .await?)
    }
}

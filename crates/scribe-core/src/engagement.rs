//! Patient-facing trial workflow: saved trials (bookmarks set by the
//! patient) and provider recommendations (pushed by an admin, accepted or
//! rejected by the patient).

use chrono::{DateTime, Utc};
use scribe_common::{ProviderRecommendedTrial, RecommendationStatus, TrialPreview};
use scribe_db::{PatientRepository, ProviderRecommendationRepository, SavedTrialRepository, TrialRepository};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::Result;
use crate::matching::ClinicalTrialService;

/// A saved trial joined with its cached preview. `trial` is `None` when the
/// cache has no row for the id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedTrialView {
    pub trial_id: String,
    pub saved_at: DateTime<Utc>,
    pub trial: Option<TrialPreview>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderRecommendationView {
    #[serde(flatten)]
    pub recommendation: ProviderRecommendedTrial,
    pub trial: Option<TrialPreview>,
}

#[derive(Clone)]
pub struct TrialEngagementService {
    patients: PatientRepository,
    saved: SavedTrialRepository,
    provider: ProviderRecommendationRepository,
    trials: TrialRepository,
    matching: ClinicalTrialService,
}

impl TrialEngagementService {
    pub fn new(
        patients: PatientRepository,
        saved: SavedTrialRepository,
        provider: ProviderRecommendationRepository,
        trials: TrialRepository,
        matching: ClinicalTrialService,
    ) -> Self {
        Self { patients, saved, provider, trials, matching }
    }

    // ── Saved trials ────────────────────────────────────────────────────────

    /// Idempotent. Returns `true` when the trial was newly saved.
    #[instrument(skip(self))]
    pub async fn save(&self, patient_id: Uuid, trial_id: &str) -> Result<bool> {
        self.patients.get(patient_id).await?;
        self.matching.get_clinical_trial(trial_id).await?;
        let created = self.saved.save(patient_id, trial_id).await?;
        if created {
            info!("Trial saved");
        }
        Ok(created)
    }

    /// Returns `true` when something was removed.
    pub async fn remove(&self, patient_id: Uuid, trial_id: &str) -> Result<bool> {
        Ok(self.saved.remove(patient_id, trial_id).await?)
    }

    pub async fn list_saved(&self, patient_id: Uuid) -> Result<Vec<SavedTrialView>> {
        let saved = self.saved.list(patient_id).await?;
        let ids: Vec<String> = saved.iter().map(|s| s.trial_id.clone()).collect();
        let cached = self.trials.find_many(&ids).await?;
        Ok(saved
            .into_iter()
            .map(|s| SavedTrialView {
                trial: cached.iter().find(|t| t.external_id == s.trial_id).map(|t| t.preview()),
                trial_id: s.trial_id,
                saved_at: s.created_at,
            })
            .collect())
    }

    pub async fn saved_ids(&self, patient_id: Uuid) -> Result<Vec<String>> {
        Ok(self.saved.trial_ids(patient_id).await?)
    }

    // ── Provider recommendations ────────────────────────────────────────────

    /// Recommend a trial to a patient. Re-recommending resets the status to
    /// PENDING.
    #[instrument(skip(self, note))]
    pub async fn recommend(
        &self,
        patient_id: Uuid,
        trial_id: &str,
        transcript_id: Option<Uuid>,
        note: Option<&str>,
    ) -> Result<ProviderRecommendedTrial> {
        self.patients.get(patient_id).await?;
        self.matching.get_clinical_trial(trial_id).await?;
        let rec = self.provider.upsert(patient_id, trial_id, transcript_id, note).await?;
        info!(recommendation_id = %rec.id, "Trial recommended");
        Ok(rec)
    }

    pub async fn accept(&self, patient_id: Uuid, trial_id: &str) -> Result<ProviderRecommendedTrial> {
        self.set_status(patient_id, trial_id, RecommendationStatus::Accepted).await
    }

    pub async fn reject(&self, patient_id: Uuid, trial_id: &str) -> Result<ProviderRecommendedTrial> {
        self.set_status(patient_id, trial_id, RecommendationStatus::Rejected).await
    }

    #[instrument(skip(self))]
    async fn set_status(
        &self,
        patient_id: Uuid,
        trial_id: &str,
        status: RecommendationStatus,
    ) -> Result<ProviderRecommendedTrial> {
        let rec = self.provider.set_status(patient_id, trial_id, status).await?;
        info!("Recommendation status updated");
        Ok(rec)
    }

    pub async fn withdraw(&self, patient_id: Uuid, trial_id: &str) -> Result<()> {
        Ok(self.provider.delete(patient_id, trial_id).await?)
    }

    pub async fn list_recommendations(
        &self,
        patient_id: Uuid,
        status: Option<RecommendationStatus>,
    ) -> Result<Vec<ProviderRecommendationView>> {
        let recs = self.provider.list(patient_id, status).await?;
        let ids: Vec<String> = recs.iter().map(|r| r.trial_id.clone()).collect();
        let cached = self.trials.find_many(&ids).await?;
        Ok(recs
            .into_iter()
            .map(|r| ProviderRecommendationView {
                trial: cached.iter().find(|t| t.external_id == r.trial_id).map(|t| t.preview()),
                recommendation: r,
            })
            .collect())
    }

    /// Pending recommendations for one patient, or across all patients.
    pub async fn count_pending(&self, patient_id: Option<Uuid>) -> Result<i64> {
        Ok(self
            .provider
            .count_with_status(patient_id, RecommendationStatus::Pending)
            .await?)
    }
}

//! Trial matching for a processed transcript.
//!
//! 1. Candidate search through the registry.
//! 2. Eligibility filter agent: one LLM call that splits candidates into
//!    eligible and uncertain. Any failure yields no recommendations.
//! 3. Relevance ranking agent: one LLM call per non-empty bucket. A failure
//!    keeps the filter's order.
//! 4. Recommended trials are cached and the transcript's recommendation row
//!    replaced.

use chrono::Utc;
use scribe_common::{
    ClinicalTrial, ParsedTranscript, Patient, TranscriptRecommendation, TranscriptStatus, TrialBucket,
};
use scribe_db::{PatientRepository, RecommendationRepository, TranscriptRepository, TrialRepository};
use scribe_llm::{CompletionOptions, LlmClient};
use scribe_trials::ClinicalTrialsSource;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{Result, ServiceError};

/// Eligible and uncertain trials for one transcript, each in ranked order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecommendedTrials {
    pub eligible_trials: Vec<ClinicalTrial>,
    pub uncertain_trials: Vec<ClinicalTrial>,
}

impl RecommendedTrials {
    pub fn is_empty(&self) -> bool {
        self.eligible_trials.is_empty() && self.uncertain_trials.is_empty()
    }
}

/// Output of the eligibility filter agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EligibilitySplit {
    pub eligible_trial_ids: Vec<String>,
    pub uncertain_trial_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RankedIds {
    ranked_trial_ids: Vec<String>,
}

#[derive(Clone)]
pub struct ClinicalTrialService {
    patients: PatientRepository,
    transcripts: TranscriptRepository,
    trials: TrialRepository,
    recommendations: RecommendationRepository,
    registry: Arc<dyn ClinicalTrialsSource>,
    llm: LlmClient,
}

impl ClinicalTrialService {
    pub fn new(
        patients: PatientRepository,
        transcripts: TranscriptRepository,
        trials: TrialRepository,
        recommendations: RecommendationRepository,
        registry: Arc<dyn ClinicalTrialsSource>,
        llm: LlmClient,
    ) -> Self {
        Self { patients, transcripts, trials, recommendations, registry, llm }
    }

    pub fn registry(&self) -> &Arc<dyn ClinicalTrialsSource> {
        &self.registry
    }

    #[instrument(skip(self))]
    pub async fn find_recommended_trials(&self, patient_id: Uuid, transcript_id: Uuid) -> Result<RecommendedTrials> {
        let patient = self.patients.get(patient_id).await?;
        let transcript = self.transcripts.get(transcript_id).await?;
        if transcript.patient_id != patient_id {
            return Err(ServiceError::NotFound(format!(
                "transcript {transcript_id} for patient {patient_id}"
            )));
        }
        let parsed = match (transcript.status, transcript.parsed) {
            (TranscriptStatus::Completed, Some(parsed)) => parsed,
            (status, _) => {
                return Err(ServiceError::Conflict(format!(
                    "transcript {transcript_id} is {status}, not COMPLETED"
                )))
            }
        };

        let candidates = self.registry.find_candidate_trials(&patient, &parsed).await?;
        info!(n = candidates.len(), "Candidate trials found");

        let result = if candidates.is_empty() {
            RecommendedTrials::default()
        } else {
            let split = self.eligibility_filter(&patient, &parsed, &candidates).await;
            let eligible = self.rank(&patient, &parsed, &candidates, &split.eligible_trial_ids, TrialBucket::Eligible).await;
            let uncertain = self.rank(&patient, &parsed, &candidates, &split.uncertain_trial_ids, TrialBucket::Uncertain).await;
            RecommendedTrials {
                eligible_trials: pick(&candidates, &eligible),
                uncertain_trials: pick(&candidates, &uncertain),
            }
        };

        let recommended: Vec<ClinicalTrial> = result
            .eligible_trials
            .iter()
            .chain(&result.uncertain_trials)
            .cloned()
            .collect();
        self.trials.upsert_many(&recommended).await?;
        self.recommendations
            .replace(&TranscriptRecommendation::new(
                transcript_id,
                ids_of(&result.eligible_trials),
                ids_of(&result.uncertain_trials),
            ))
            .await?;

        info!(
            eligible = result.eligible_trials.len(),
            uncertain = result.uncertain_trials.len(),
            "Recommendations stored"
        );
        Ok(result)
    }

    /// Stored recommendations for a transcript, resolved through the trial cache.
    pub async fn get_recommendations(&self, transcript_id: Uuid) -> Result<Option<RecommendedTrials>> {
        let Some(rec) = self.recommendations.find_by_transcript(transcript_id).await? else {
            return Ok(None);
        };
        Ok(Some(RecommendedTrials {
            eligible_trials: self.trials.find_many(&rec.eligible_trial_ids).await?,
            uncertain_trials: self.trials.find_many(&rec.uncertain_trial_ids).await?,
        }))
    }

    /// Registry first; the cache is refreshed on success and used when the
    /// registry cannot answer.
    #[instrument(skip(self))]
    pub async fn get_clinical_trial(&self, trial_id: &str) -> Result<ClinicalTrial> {
        match self.registry.get_clinical_trial(trial_id).await {
            Ok(trial) => {
                self.trials.upsert(&trial).await?;
                Ok(trial)
            }
            Err(e) => match self.trials.find_by_id(trial_id).await? {
                Some(cached) => {
                    warn!(error = %e, "Registry lookup failed, serving cached trial");
                    Ok(cached)
                }
                None => Err(e.into()),
            },
        }
    }

    /// Eligibility filter agent. Never fails: an LLM error or an unexpected
    /// response shape yields an empty split. Ids that are not candidates are
    /// dropped, and an id listed in both buckets counts as eligible.
    pub async fn eligibility_filter(
        &self,
        patient: &Patient,
        parsed: &ParsedTranscript,
        candidates: &[ClinicalTrial],
    ) -> EligibilitySplit {
        let prompt = eligibility_prompt(&patient_profile(patient, parsed), candidates);
        let split: EligibilitySplit = match self
            .llm
            .complete_json_as("eligibility_filter", &prompt, CompletionOptions::default())
            .await
        {
            Ok(split) => split,
            Err(e) => {
                warn!(error = %e, "Eligibility filter failed, recommending nothing");
                return EligibilitySplit::default();
            }
        };

        let known: HashSet<&str> = candidates.iter().map(|t| t.external_id.as_str()).collect();
        let mut seen = HashSet::new();
        let mut keep = |ids: Vec<String>| -> Vec<String> {
            ids.into_iter()
                .filter(|id| known.contains(id.as_str()) && seen.insert(id.clone()))
                .collect()
        };
        let eligible_trial_ids = keep(split.eligible_trial_ids);
        let uncertain_trial_ids = keep(split.uncertain_trial_ids);
        EligibilitySplit { eligible_trial_ids, uncertain_trial_ids }
    }

    /// Relevance ranking agent. Returns `bucket_ids` reordered; unknown ids
    /// are dropped and ids the model leaves out are appended in their
    /// original order. Any failure keeps the original order.
    pub async fn rank(
        &self,
        patient: &Patient,
        parsed: &ParsedTranscript,
        candidates: &[ClinicalTrial],
        bucket_ids: &[String],
        bucket: TrialBucket,
    ) -> Vec<String> {
        if bucket_ids.is_empty() {
            return Vec::new();
        }
        let trials = pick(candidates, bucket_ids);
        let prompt = ranking_prompt(&patient_profile(patient, parsed), &trials, bucket);
        let ranked = match self
            .llm
            .complete_json_as::<RankedIds>("relevance_ranking", &prompt, CompletionOptions::default())
            .await
        {
            Ok(r) => r.ranked_trial_ids,
            Err(e) => {
                warn!(?bucket, error = %e, "Ranking failed, keeping filter order");
                return bucket_ids.to_vec();
            }
        };
        merge_ranking(bucket_ids, ranked)
    }
}

pub(crate) fn merge_ranking(bucket_ids: &[String], ranked: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(bucket_ids.len());
    for id in ranked {
        if bucket_ids.contains(&id) && !out.contains(&id) {
            out.push(id);
        }
    }
    for id in bucket_ids {
        if !out.contains(id) {
            out.push(id.clone());
        }
    }
    out
}

fn pick(candidates: &[ClinicalTrial], ids: &[String]) -> Vec<ClinicalTrial> {
    ids.iter()
        .filter_map(|id| candidates.iter().find(|t| &t.external_id == id))
        .cloned()
        .collect()
}

fn ids_of(trials: &[ClinicalTrial]) -> Vec<String> {
    trials.iter().map(|t| t.external_id.clone()).collect()
}

// ── Prompts ───────────────────────────────────────────────────────────────────

fn list(items: &[String]) -> String {
    if items.is_empty() {
        "None reported".to_string()
    } else {
        items.join(", ")
    }
}

/// Patient description shared by both agents. Patient record fields take
/// precedence over what the transcript says.
pub fn patient_profile(patient: &Patient, parsed: &ParsedTranscript) -> String {
    let today = Utc::now().date_naive();
    let location = if !patient.address.is_unlocated() {
        Some(&patient.address)
    } else {
        parsed.location.as_ref().filter(|a| !a.is_unlocated())
    };
    let location = location
        .map(|a| {
            [a.city.as_deref(), a.state.as_deref(), a.country.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_else(|| "Unknown".to_string());

    let mut s = String::new();
    let _ = writeln!(s, "PATIENT PROFILE:");
    let _ = writeln!(s, "- Name: {}", patient.full_name());
    let _ = writeln!(s, "- Age: {}", patient.age_on(today));
    let _ = writeln!(s, "- Sex: {}", patient.sex);
    let _ = writeln!(s, "- Location: {location}");
    let _ = writeln!(s);
    let _ = writeln!(s, "MEDICAL INFORMATION:");
    let _ = writeln!(s, "- Conditions: {}", list(&parsed.conditions));
    let _ = writeln!(s, "- Medications: {}", list(&parsed.medications));
    let _ = writeln!(s, "- Procedures: {}", list(&parsed.procedures));
    let _ = writeln!(s, "- Symptoms present: {}", list(&parsed.positive_symptoms));
    let _ = writeln!(s, "- Symptoms absent: {}", list(&parsed.negative_symptoms));
    let _ = writeln!(s, "- Past diagnoses: {}", list(&parsed.past_diagnoses));
    let _ = writeln!(s, "- Past surgeries: {}", list(&parsed.past_surgeries));
    let _ = writeln!(s, "- Family history: {}", list(&parsed.family_history));
    let _ = writeln!(s);
    let _ = writeln!(s, "LAB & IMAGING RESULTS:");
    let _ = writeln!(s, "- Abnormal labs: {}", list(&parsed.positive_lab_results));
    let _ = writeln!(s, "- Normal labs: {}", list(&parsed.negative_lab_results));
    let _ = writeln!(s, "- Abnormal imaging: {}", list(&parsed.positive_imaging_results));
    let _ = writeln!(s, "- Normal imaging: {}", list(&parsed.negative_imaging_results));
    let _ = writeln!(s);
    let _ = writeln!(s, "LIFESTYLE FACTORS:");
    let _ = writeln!(s, "- Positive: {}", list(&parsed.positive_lifestyle_factors));
    let _ = writeln!(s, "- Negative: {}", list(&parsed.negative_lifestyle_factors));
    let _ = writeln!(s);
    let _ = writeln!(s, "EXTRACTION NOTES:");
    let _ = writeln!(s, "- {}", list(&parsed.extraction_notes));
    s
}

fn trial_summary(t: &ClinicalTrial) -> String {
    format!(
        "ID: {}\nTitle: {}\nStatus: {}\nConditions: {}\nPhases: {}\nAges: {}\nSex: {}\nSummary: {}\nEligibility criteria:\n{}\n",
        t.external_id,
        t.brief_title,
        t.status,
        list(&t.conditions),
        list(&t.phases),
        scribe_common::trial::format_age_range(t.minimum_age.as_deref(), t.maximum_age.as_deref())
            .unwrap_or_else(|| "Not specified".to_string()),
        t.sex.as_deref().unwrap_or("ALL"),
        t.brief_summary.as_deref().unwrap_or("N/A"),
        t.eligibility_criteria.as_deref().unwrap_or("Not provided"),
    )
}

fn eligibility_prompt(profile: &str, candidates: &[ClinicalTrial]) -> String {
    let trials: Vec<String> = candidates.iter().map(trial_summary).collect();
    format!(
        r#"You are a clinical trial eligibility screener. Compare the patient below against each trial's eligibility criteria.

{profile}
CANDIDATE TRIALS:
{trials}
Classify each trial:
- "eligible": the patient clearly meets the inclusion criteria and no exclusion criterion applies.
- "uncertain": eligibility cannot be decided from the available information.
- Leave out trials the patient clearly does not qualify for.

Respond with JSON: {{"eligible_trial_ids": ["NCT..."], "uncertain_trial_ids": ["NCT..."]}}"#,
        trials = trials.join("\n---\n"),
    )
}

fn ranking_prompt(profile: &str, trials: &[ClinicalTrial], bucket: TrialBucket) -> String {
    let label = match bucket {
        TrialBucket::Eligible => "eligible",
        TrialBucket::Uncertain => "possibly eligible",
    };
    let trials: Vec<String> = trials.iter().map(trial_summary).collect();
    format!(
        r#"You are a clinical research coordinator. Rank these {label} trials from most to least relevant for the patient, considering how well each trial targets the patient's conditions, current treatment and location.

{profile}
TRIALS:
{trials}
Respond with JSON: {{"ranked_trial_ids": ["NCT..."]}} containing every trial ID above exactly once."#,
        trials = trials.join("\n---\n"),
    )
}

//! Trial recommendation records: the matching result per transcript, patient
//! bookmarks, and provider suggestions with their accept/reject workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ScribeError;

/// Which matching bucket a trial landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrialBucket {
    Eligible,
    Uncertain,
}

/// Ranked matching output for one transcript. Replaced wholesale on re-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRecommendation {
    pub id: Uuid,
    pub transcript_id: Uuid,
    pub eligible_trial_ids: Vec<String>,
    pub uncertain_trial_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TranscriptRecommendation {
    pub fn new(transcript_id: Uuid, eligible: Vec<String>, uncertain: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            transcript_id,
            eligible_trial_ids: eligible,
            uncertain_trial_ids: uncertain,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn bucket_of(&self, trial_id: &str) -> Option<TrialBucket> {
        if self.eligible_trial_ids.iter().any(|id| id == trial_id) {
            Some(TrialBucket::Eligible)
        } else if self.uncertain_trial_ids.iter().any(|id| id == trial_id) {
            Some(TrialBucket::Uncertain)
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.eligible_trial_ids.is_empty() && self.uncertain_trial_ids.is_empty()
    }
}

/// A patient's bookmark of a trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedTrial {
    pub patient_id: Uuid,
    pub trial_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RecommendationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationStatus::Pending  => "PENDING",
            RecommendationStatus::Accepted => "ACCEPTED",
            RecommendationStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for RecommendationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecommendationStatus {
    type Err = ScribeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING"  => Ok(RecommendationStatus::Pending),
            "ACCEPTED" => Ok(RecommendationStatus::Accepted),
            "REJECTED" => Ok(RecommendationStatus::Rejected),
            _ => Err(ScribeError::InvalidValue { field: "status", value: s.to_string() }),
        }
    }
}

/// A trial pushed to a patient by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecommendedTrial {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub trial_id: String,
    pub transcript_id: Option<Uuid>,
    pub note: Option<String>,
    pub status: RecommendationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_lookup() {
        let rec = TranscriptRecommendation::new(
            Uuid::new_v4(),
            vec!["NCT1".into()],
            vec!["NCT2".into()],
        );
        assert_eq!(rec.bucket_of("NCT1"), Some(TrialBucket::Eligible));
        assert_eq!(rec.bucket_of("NCT2"), Some(TrialBucket::Uncertain));
        assert_eq!(rec.bucket_of("NCT3"), None);
        assert!(!rec.is_empty());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("accepted".parse::<RecommendationStatus>().unwrap(), RecommendationStatus::Accepted);
        assert!("maybe".parse::<RecommendationStatus>().is_err());
    }
}

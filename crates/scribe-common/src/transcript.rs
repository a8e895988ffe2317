//! Appointment transcripts and the clinical extraction derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ScribeError;
use crate::patient::{Address, Sex};

/// Processing lifecycle of a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TranscriptStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TranscriptStatus {
    pub const ALL: [TranscriptStatus; 4] = [
        TranscriptStatus::Pending,
        TranscriptStatus::Processing,
        TranscriptStatus::Completed,
        TranscriptStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptStatus::Pending    => "PENDING",
            TranscriptStatus::Processing => "PROCESSING",
            TranscriptStatus::Completed  => "COMPLETED",
            TranscriptStatus::Failed     => "FAILED",
        }
    }

    /// Whether a processing run may be started from this state.
    pub fn can_start_processing(&self) -> bool {
        !matches!(self, TranscriptStatus::Processing)
    }
}

impl fmt::Display for TranscriptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TranscriptStatus {
    type Err = ScribeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ScribeError::InvalidValue { field: "status", value: s.to_string() })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub raw_transcript: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
    pub status: TranscriptStatus,
    pub parsed: Option<ParsedTranscript>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Structured clinical information extracted from a transcript.
///
/// Deserialization is lenient: `null` lists become empty, numeric strings are
/// accepted for `age`, and an unrecognised `sex` is dropped. The LLM output
/// this is parsed from is not always tidy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsedTranscript {
    #[serde(deserialize_with = "null_as_empty")]
    pub conditions: Vec<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub medications: Vec<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub procedures: Vec<String>,

    #[serde(deserialize_with = "lenient_age")]
    pub age: Option<u32>,
    #[serde(deserialize_with = "lenient_sex")]
    pub sex: Option<Sex>,
    pub location: Option<Address>,

    #[serde(deserialize_with = "null_as_empty")]
    pub positive_symptoms: Vec<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub negative_symptoms: Vec<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub positive_lab_results: Vec<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub negative_lab_results: Vec<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub positive_imaging_results: Vec<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub negative_imaging_results: Vec<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub past_diagnoses: Vec<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub past_surgeries: Vec<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub family_history: Vec<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub positive_lifestyle_factors: Vec<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub negative_lifestyle_factors: Vec<String>,

    #[serde(deserialize_with = "null_as_empty")]
    pub extraction_notes: Vec<String>,
}

impl ParsedTranscript {
    /// True when the extraction produced no conditions and no medications,
    /// i.e. there is nothing to search the registry with.
    pub fn has_search_terms(&self) -> bool {
        !self.conditions.is_empty() || !self.medications.is_empty()
    }
}

impl fmt::Display for ParsedTranscript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ParsedTranscript(conditions={}, medications={}, procedures={}, age={:?}, sex={:?})",
            self.conditions.len(),
            self.medications.len(),
            self.procedures.len(),
            self.age,
            self.sex.map(|s| s.as_str()),
        )
    }
}

fn null_as_empty<'de, D>(d: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(d)?.unwrap_or_default())
}

fn lenient_age<'de, D>(d: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(d)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_sex<'de, D>(d: D) -> Result<Option<Sex>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(d)?;
    Ok(value.and_then(|s| s.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_roundtrip_through_str() {
        for st in TranscriptStatus::ALL {
            assert_eq!(st.as_str().parse::<TranscriptStatus>().unwrap(), st);
        }
        assert_eq!("completed".parse::<TranscriptStatus>().unwrap(), TranscriptStatus::Completed);
        assert!("done".parse::<TranscriptStatus>().is_err());
    }

    #[test]
    fn test_null_lists_become_empty() {
        let parsed: ParsedTranscript = serde_json::from_value(json!({
            "conditions": ["Diabetes"],
            "medications": null,
            "age": "45",
            "sex": "male",
            "extraction_notes": null
        }))
        .unwrap();
        assert_eq!(parsed.conditions, vec!["Diabetes"]);
        assert!(parsed.medications.is_empty());
        assert!(parsed.procedures.is_empty());
        assert_eq!(parsed.age, Some(45));
        assert_eq!(parsed.sex, Some(Sex::Male));
    }

    #[test]
    fn test_unusable_demographics_are_dropped() {
        let parsed: ParsedTranscript = serde_json::from_value(json!({
            "age": -3,
            "sex": "unknown"
        }))
        .unwrap();
        assert_eq!(parsed.age, None);
        assert_eq!(parsed.sex, None);
        assert!(!parsed.has_search_terms());
    }
}

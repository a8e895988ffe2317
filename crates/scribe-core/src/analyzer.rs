//! Transcript analysis: raw appointment text → [`ParsedTranscript`].

use async_trait::async_trait;
use scribe_common::ParsedTranscript;
use scribe_llm::{CompletionOptions, LlmClient, LlmError};
use tracing::{info, instrument};

#[async_trait]
pub trait TranscriptAnalyzer: Send + Sync {
    async fn analyze(&self, raw_transcript: &str) -> Result<ParsedTranscript, LlmError>;
}

/// Extraction through a single JSON-mode LLM call.
#[derive(Clone)]
pub struct LlmTranscriptAnalyzer {
    llm: LlmClient,
}

impl LlmTranscriptAnalyzer {
    pub const TEMPERATURE: f32 = 0.1;
    pub const MAX_TOKENS: u32 = 4096;

    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl TranscriptAnalyzer for LlmTranscriptAnalyzer {
    #[instrument(skip_all, fields(chars = raw_transcript.len()))]
    async fn analyze(&self, raw_transcript: &str) -> Result<ParsedTranscript, LlmError> {
        let opts = CompletionOptions::default()
            .temperature(Self::TEMPERATURE)
            .max_tokens(Self::MAX_TOKENS);
        let parsed: ParsedTranscript = self
            .llm
            .complete_json_as("transcript_analysis", &analysis_prompt(raw_transcript), opts)
            .await?;
        info!(%parsed, "Transcript analyzed");
        Ok(parsed)
    }
}

pub fn analysis_prompt(raw_transcript: &str) -> String {
    format!(
        r#"You are a medical transcript analyzer. Extract structured information from the medical transcript below.

CORE MEDICAL INFORMATION:
1. Medical conditions: only conditions or diagnoses explicitly diagnosed or confirmed by the provider or patient. Do not include suspected, possible or likely diagnoses.
2. Medications: only medications actually prescribed, administered or recommended. Names only, no dosages, frequencies or instructions.
3. Procedures: only procedures, surgeries or treatments actually performed or recommended.

DEMOGRAPHICS:
4. Age: patient age if mentioned.
5. Sex: MALE or FEMALE if mentioned.

LOCATION:
6. Location: city, state, country and zip code if mentioned.

MEDICAL RECORD:
7. Symptoms: positive (experienced) and negative (denied or absent).
8. Lab results: positive (abnormal or significant) and negative (normal).
9. Imaging results: positive (abnormal or significant) and negative (normal).
10. History: past diagnoses and past surgeries.
11. Family history: relevant family medical history.
12. Lifestyle: positive factors (healthy habits) and negative factors (risk factors).

Respond with JSON only, in exactly this shape:
{{
  "conditions": ["condition1"],
  "medications": ["medication1"],
  "procedures": ["procedure1"],
  "age": 45,
  "sex": "MALE",
  "location": {{ "city": "New York", "state": "NY", "country": "USA", "zip_code": "10001" }},
  "positive_symptoms": [],
  "negative_symptoms": [],
  "positive_lab_results": [],
  "negative_lab_results": [],
  "positive_imaging_results": [],
  "negative_imaging_results": [],
  "past_diagnoses": [],
  "past_surgeries": [],
  "family_history": [],
  "positive_lifestyle_factors": [],
  "negative_lifestyle_factors": [],
  "extraction_notes": []
}}

Use null or empty arrays for anything not found. Only include information explicitly mentioned or reasonably inferred from the transcript.

TRANSCRIPT TO ANALYZE:
{raw_transcript}

JSON RESPONSE:"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_transcript_and_schema() {
        let p = analysis_prompt("Patient reports a cough.");
        assert!(p.contains("Patient reports a cough."));
        assert!(p.contains("\"negative_lifestyle_factors\": []"));
        assert!(p.trim_end().ends_with("JSON RESPONSE:"));
    }
}

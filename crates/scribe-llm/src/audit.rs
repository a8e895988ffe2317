//! Audit records for LLM calls.
//!
//! Prompts carry patient data, so only a hash of the output is kept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmAuditEntry {
    pub id: Uuid,
    /// What the call was for, e.g. `transcript_analysis`, `eligibility_filter`.
    pub purpose: String,
    pub model: String,
    pub backend: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub output_hash: String,
    pub latency_ms: u64,
    pub succeeded: bool,
    pub called_at: DateTime<Utc>,
}

impl LlmAuditEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        purpose: impl Into<String>,
        model: impl Into<String>,
        backend: impl Into<String>,
        prompt_tokens: u32,
        completion_tokens: u32,
        output: &str,
        latency_ms: u64,
        succeeded: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            purpose: purpose.into(),
            model: model.into(),
            backend: backend.into(),
            prompt_tokens,
            completion_tokens,
            output_hash: hash_output(output),
            latency_ms,
            succeeded,
            called_at: Utc::now(),
        }
    }

    /// Emit the entry on the `llm_audit` tracing target.
    pub fn record(&self) {
        info!(
            target: "llm_audit",
            id = %self.id,
            purpose = %self.purpose,
            model = %self.model,
            backend = %self.backend,
            prompt_tokens = self.prompt_tokens,
            completion_tokens = self.completion_tokens,
            output_hash = %self.output_hash,
            latency_ms = self.latency_ms,
            succeeded = self.succeeded,
            "LLM call"
        );
    }
}

pub fn hash_output(output: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(output.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_hash_is_sha256_hex() {
        let entry = LlmAuditEntry::new("chat", "m", "gemini", 1, 2, "abc", 5, true);
        assert_eq!(
            entry.output_hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(entry.purpose, "chat");
    }
}

//! High-level LLM client used by the services.
//!
//! Wraps one [`LlmBackend`], adds JSON-mode prompting and records an audit
//! entry for every call.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::audit::LlmAuditEntry;
use crate::backend::{LlmBackend, LlmError, LlmRequest, LlmResponse, Message};

const JSON_SUFFIX: &str = "\n\nPlease respond with valid JSON only.";
pub const DEFAULT_JSON_TEMPERATURE: f32 = 0.1;

#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub system: Option<String>,
}

impl CompletionOptions {
    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    pub fn system(mut self, s: impl Into<String>) -> Self {
        self.system = Some(s.into());
        self
    }
}

#[derive(Clone)]
pub struct LlmClient {
    backend: Arc<dyn LlmBackend>,
}

impl LlmClient {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }

    pub fn model_id(&self) -> &str {
        self.backend.model_id()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// Plain-text completion.
    pub async fn complete_text(
        &self,
        purpose: &str,
        prompt: &str,
        opts: CompletionOptions,
    ) -> Result<String, LlmError> {
        let resp = self.call(purpose, prompt, opts, false).await?;
        Ok(resp.content)
    }

    /// JSON completion. The prompt gets an explicit JSON-only instruction,
    /// temperature defaults to 0.1, and markdown fences are stripped before
    /// parsing.
    pub async fn complete_json(
        &self,
        purpose: &str,
        prompt: &str,
        opts: CompletionOptions,
    ) -> Result<serde_json::Value, LlmError> {
        let prompt = format!("{prompt}{JSON_SUFFIX}");
        let opts = CompletionOptions {
            temperature: Some(opts.temperature.unwrap_or(DEFAULT_JSON_TEMPERATURE)),
            ..opts
        };
        let resp = self.call(purpose, &prompt, opts, true).await?;
        let body = strip_code_fences(&resp.content);
        serde_json::from_str(body).map_err(|e| {
            warn!(purpose, error = %e, "LLM returned unparseable JSON");
            LlmError::InvalidJson(e.to_string())
        })
    }

    /// JSON completion deserialized straight into `T`.
    pub async fn complete_json_as<T: DeserializeOwned>(
        &self,
        purpose: &str,
        prompt: &str,
        opts: CompletionOptions,
    ) -> Result<T, LlmError> {
        let value = self.complete_json(purpose, prompt, opts).await?;
        serde_json::from_value(value).map_err(|e| LlmError::InvalidJson(e.to_string()))
    }

    /// Cheap round-trip to the provider. Never errors.
    pub async fn health_check(&self) -> bool {
        let opts = CompletionOptions::default().max_tokens(5).temperature(0.0);
        match self.call("health_check", "Reply with OK.", opts, false).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "LLM health check failed");
                false
            }
        }
    }

    async fn call(
        &self,
        purpose: &str,
        prompt: &str,
        opts: CompletionOptions,
        json_mode: bool,
    ) -> Result<LlmResponse, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = opts.system {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(prompt));

        let req = LlmRequest {
            messages,
            model: None,
            max_tokens: opts.max_tokens,
            temperature: opts.temperature,
            json_mode,
        };

        debug!(purpose, backend = self.backend_name(), json_mode, "LLM request");
        let started = Instant::now();
        let result = self.backend.complete(req).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let result = result.and_then(|resp| {
            if resp.content.trim().is_empty() {
                Err(LlmError::EmptyResponse)
            } else {
                Ok(resp)
            }
        });

        match &result {
            Ok(resp) => LlmAuditEntry::new(
                purpose,
                &resp.model,
                self.backend_name(),
                resp.prompt_tokens,
                resp.completion_tokens,
                &resp.content,
                latency_ms,
                true,
            )
            .record(),
            Err(e) => {
                warn!(purpose, error = %e, "LLM call failed");
                LlmAuditEntry::new(purpose, self.model_id(), self.backend_name(), 0, 0, "", latency_ms, false)
                    .record();
            }
        }
        result
    }
}

/// Remove a surrounding markdown code fence (```` ```json ... ``` ````) if present.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

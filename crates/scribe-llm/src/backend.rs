//! LLM backend trait and concrete implementations.
//!
//! Backends:
//!   GeminiBackend          : Google Gemini `generateContent`
//!   OpenAiCompatibleBackend: any `/v1/chat/completions` endpoint (OpenAI,
//!                             LiteLLM, vLLM, LM Studio, …)
//!   OllamaBackend          : local Ollama through its OpenAI-compatible API
//!
//! All outbound traffic goes through [`SandboxClient`].

use async_trait::async_trait;
use scribe_common::{SandboxClient, ScribeError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("Outbound request blocked: {0}")]
    Blocked(String),
    #[error("API error [{status}]: {message}")]
    ApiError { status: u16, message: String },
    #[error("LLM returned an empty response")]
    EmptyResponse,
    #[error("LLM response is not valid JSON: {0}")]
    InvalidJson(String),
}

impl From<ScribeError> for LlmError {
    fn from(err: ScribeError) -> Self {
        match err {
            ScribeError::Security(msg) => LlmError::Blocked(msg),
            ScribeError::Http(e)       => LlmError::Http(e),
            other                      => LlmError::Unavailable(other.to_string()),
        }
    }
}

// ── Request / Response ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,   // "system" | "user" | "assistant"
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmRequest {
    pub messages: Vec<Message>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Ask the provider for a JSON body where it supports that natively.
    #[serde(default)]
    pub json_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

// ── Trait ─────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError>;
    fn model_id(&self) -> &str;
    /// Short provider name for logs and audit records.
    fn backend_name(&self) -> &'static str;
    fn is_local(&self) -> bool;
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn parse_openai_response(json: &serde_json::Value, fallback_model: &str) -> LlmResponse {
    LlmResponse {
        content: json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string(),
        model: json["model"]
            .as_str()
            .unwrap_or(fallback_model)
            .to_string(),
        prompt_tokens:     json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    }
}

async fn check_response_status(resp: reqwest::Response) -> Result<serde_json::Value, LlmError> {
    let status = resp.status().as_u16();
    let text = resp.text().await?;
    let body: serde_json::Value = serde_json::from_str(&text).unwrap_or(serde_json::Value::Null);
    if status >= 400 {
        let msg = body["error"]["message"]
            .as_str()
            .or_else(|| body["message"].as_str())
            .map(str::to_string)
            .unwrap_or_else(|| truncate(&text, 200));
        return Err(LlmError::ApiError { status, message: msg });
    }
    if body.is_null() {
        return Err(LlmError::InvalidJson(truncate(&text, 200)));
    }
    Ok(body)
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn openai_body(req: &LlmRequest, default_model: &str) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model":       req.model.as_deref().unwrap_or(default_model),
        "messages":    req.messages,
        "max_tokens":  req.max_tokens.unwrap_or(4096),
        "temperature": req.temperature.unwrap_or(0.7),
    });
    if req.json_mode {
        body["response_format"] = serde_json::json!({ "type": "json_object" });
    }
    body
}

// ── 1. Google Gemini ──────────────────────────────────────────────────────────

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiBackend {
    pub model: String,
    pub base_url: String,
    api_key: String,
    client: SandboxClient,
}

impl GeminiBackend {
    pub fn new(client: SandboxClient, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: GEMINI_BASE_URL.to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let model = req.model.as_deref().unwrap_or(&self.model);
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        // System message → systemInstruction
        let system_text = req.messages.iter()
            .find(|m| m.role == "system")
            .map(|m| m.content.clone());

        let contents: Vec<serde_json::Value> = req.messages.iter()
            .filter(|m| m.role != "system")
            .map(|m| {
                let role = if m.role == "assistant" { "model" } else { "user" };
                serde_json::json!({
                    "role": role,
                    "parts": [{ "text": m.content }]
                })
            })
            .collect();

        let mut generation_config = serde_json::json!({
            "maxOutputTokens": req.max_tokens.unwrap_or(2048),
            "temperature":     req.temperature.unwrap_or(0.7),
            "topP":            0.9,
            "topK":            40,
        });
        if req.json_mode {
            generation_config["responseMimeType"] = serde_json::json!("application/json");
        }

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": generation_config,
        });
        if let Some(sys) = system_text {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{ "text": sys }]
            });
        }

        let resp = self.client
            .post(&url)?
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        let json = check_response_status(resp).await?;

        // A candidate may split its answer across several parts.
        let content: String = json["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            model: model.to_string(),
            prompt_tokens:     json["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0) as u32,
            completion_tokens: json["usageMetadata"]["candidatesTokenCount"].as_u64().unwrap_or(0) as u32,
        })
    }

    fn model_id(&self) -> &str { &self.model }
    fn backend_name(&self) -> &'static str { "gemini" }
    fn is_local(&self) -> bool { false }
}

// ── 2. OpenAI-compatible ──────────────────────────────────────────────────────

pub struct OpenAiCompatibleBackend {
    pub base_url: String,
    pub model: String,
    api_key: Option<String>,
    client: SandboxClient,
}

impl OpenAiCompatibleBackend {
    /// `base_url` is the API root without `/chat/completions`, e.g.
    /// `https://api.openai.com/v1`.
    pub fn new(
        client: SandboxClient,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            client,
        }
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(k) => req.bearer_auth(k),
            None    => req,
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiCompatibleBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = openai_body(&req, &self.model);
        let resp = self.auth(self.client.post(&url)?).json(&body).send().await?;
        let json = check_response_status(resp).await?;
        Ok(parse_openai_response(&json, &self.model))
    }

    fn model_id(&self) -> &str { &self.model }
    fn backend_name(&self) -> &'static str { "openai_compatible" }
    fn is_local(&self) -> bool { false }
}

// ── 3. Ollama (local) ─────────────────────────────────────────────────────────

pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

pub struct OllamaBackend {
    pub base_url: String,
    pub model: String,
    client: SandboxClient,
}

impl OllamaBackend {
    pub fn new(client: SandboxClient, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
        }
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = openai_body(&req, &self.model);
        let resp = self.client.post(&url)?.json(&body).send().await?;
        let json = check_response_status(resp).await?;
        Ok(parse_openai_response(&json, &self.model))
    }

    fn model_id(&self) -> &str { &self.model }
    fn backend_name(&self) -> &'static str { "ollama" }
    fn is_local(&self) -> bool { true }
}

// ── Construction from configuration ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Gemini,
    OpenAiCompatible,
    Ollama,
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// Build the configured backend. A custom `base_url` host is added to the
/// outbound allowlist.
pub fn build_backend(config: &BackendConfig) -> Result<Arc<dyn LlmBackend>, LlmError> {
    let mut client = SandboxClient::with_timeout(config.timeout)?;
    if let Some(url) = &config.base_url {
        client.allow_url_host(url)?;
    }

    let backend: Arc<dyn LlmBackend> = match config.kind {
        BackendKind::Gemini => {
            let key = config
                .api_key
                .clone()
                .ok_or_else(|| LlmError::Unavailable("Gemini needs an API key".into()))?;
            let mut b = GeminiBackend::new(client, key, &config.model);
            if let Some(url) = &config.base_url {
                b = b.with_base_url(url);
            }
            Arc::new(b)
        }
        BackendKind::OpenAiCompatible => {
            let url = config
                .base_url
                .clone()
                .ok_or_else(|| LlmError::Unavailable("OpenAI-compatible backend needs a base URL".into()))?;
            Arc::new(OpenAiCompatibleBackend::new(client, url, &config.model, config.api_key.clone()))
        }
        BackendKind::Ollama => {
            let url = config.base_url.clone().unwrap_or_else(|| OLLAMA_BASE_URL.to_string());
            Arc::new(OllamaBackend::new(client, url, &config.model))
        }
    };

    tracing::info!(
        backend = backend.backend_name(),
        model = backend.model_id(),
        is_local = backend.is_local(),
        "LLM backend configured"
    );
    Ok(backend)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> SandboxClient {
        SandboxClient::new().unwrap()
    }

    #[test]
    fn test_gemini_backend_is_not_local() {
        let b = GeminiBackend::new(sandbox(), "AIza-test", "gemini-2.0-flash");
        assert!(!b.is_local());
        assert_eq!(b.model_id(), "gemini-2.0-flash");
        assert_eq!(b.base_url, GEMINI_BASE_URL);
    }

    #[test]
    fn test_ollama_is_local() {
        let b = OllamaBackend::new(sandbox(), "http://localhost:11434/", "llama3:8b");
        assert!(b.is_local());
        assert_eq!(b.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_build_backend_requires_gemini_key() {
        let cfg = BackendConfig {
            kind: BackendKind::Gemini,
            model: "gemini-2.0-flash".into(),
            base_url: None,
            api_key: None,
            timeout: Duration::from_secs(5),
        };
        assert!(matches!(build_backend(&cfg), Err(LlmError::Unavailable(_))));
    }

    #[test]
    fn test_build_backend_compat_requires_base_url() {
        let cfg = BackendConfig {
            kind: BackendKind::OpenAiCompatible,
            model: "gpt-4o-mini".into(),
            base_url: None,
            api_key: Some("sk".into()),
            timeout: Duration::from_secs(5),
        };
        assert!(build_backend(&cfg).is_err());
    }

    #[test]
    fn test_json_mode_sets_response_format() {
        let req = LlmRequest { messages: vec![Message::user("hi")], json_mode: true, ..Default::default() };
        let body = openai_body(&req, "m");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["model"], "m");
    }
}

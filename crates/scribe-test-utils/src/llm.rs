use async_trait::async_trait;
use scribe_llm::{LlmBackend, LlmError, LlmRequest, LlmResponse};
use std::collections::VecDeque;
use std::sync::Mutex;

enum Scripted {
    Text(String),
    Error(String),
}

/// Replays queued completions in order. An exhausted script answers with
/// [`LlmError::Unavailable`].
#[derive(Default)]
pub struct ScriptedLlmBackend {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlmBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&self, text: impl Into<String>) -> &Self {
        self.script.lock().unwrap().push_back(Scripted::Text(text.into()));
        self
    }

    pub fn push_json(&self, value: serde_json::Value) -> &Self {
        self.push_text(value.to_string())
    }

    pub fn push_error(&self, message: impl Into<String>) -> &Self {
        self.script.lock().unwrap().push_back(Scripted::Error(message.into()));
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Text of the last user message of the `n`th call.
    pub fn prompt(&self, n: usize) -> String {
        self.requests.lock().unwrap()[n]
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmBackend for ScriptedLlmBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(req);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Text(content)) => Ok(LlmResponse {
                completion_tokens: content.len() as u32 / 4,
                content,
                model: "scripted".into(),
                prompt_tokens: 0,
            }),
            Some(Scripted::Error(message)) => Err(LlmError::ApiError { status: 500, message }),
            None => Err(LlmError::Unavailable("script exhausted".into())),
        }
    }

    fn model_id(&self) -> &str { "scripted" }
    fn backend_name(&self) -> &'static str { "scripted" }
    fn is_local(&self) -> bool { true }
}

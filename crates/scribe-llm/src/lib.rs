//! scribe-llm: LLM backend abstraction for transcript analysis, trial
//! matching and chat.
//!
//! Backends implement [`LlmBackend`]; callers go through [`LlmClient`],
//! which adds JSON-mode handling and audit logging.

pub mod audit;
pub mod backend;
pub mod client;

pub use backend::{
    build_backend, BackendConfig, BackendKind, GeminiBackend, LlmBackend, LlmError, LlmRequest, LlmResponse,
    Message, OllamaBackend, OpenAiCompatibleBackend,
};
pub use client::{strip_code_fences, CompletionOptions, LlmClient};

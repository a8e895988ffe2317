//! Shared fixtures for the workspace's tests.
//!
//! - [`test_database`]: migrated in-memory SQLite
//! - [`ScriptedLlmBackend`]: an [`LlmBackend`](scribe_llm::LlmBackend) that
//!   replays queued responses and records prompts
//! - [`fixtures`]: sample patients, transcripts and registry payloads

pub mod fixtures;
pub mod llm;

use scribe_db::Database;
use std::sync::Arc;

pub use llm::ScriptedLlmBackend;

/// Fresh, migrated in-memory database. Panics on failure; test use only.
pub async fn test_database() -> Arc<Database> {
    Arc::new(Database::in_memory().await.expect("in-memory database"))
}

//! TranscriptScribe storage layer.
//!
//! SQLite through `sqlx`. Each entity gets a repository holding an
//! `Arc<Database>`; the schema lives in `migrations/` and is applied with
//! [`Database::migrate`].
//!
//! ```rust,no_run
//! use scribe_db::{Database, PatientRepository};
//! use std::sync::Arc;
//!
//! # async fn run() -> scribe_db::Result<()> {
//! let db = Arc::new(Database::connect("sqlite://transcriptscribe.db?mode=rwc", 5).await?);
//! db.migrate().await?;
//! let patients = PatientRepository::new(db.clone());
//! println!("{} patients", patients.count().await?);
//! # Ok(())
//! # }
//! ```

pub mod chat;
pub mod database;
pub mod error;
pub mod patients;
pub mod provider_recommendations;
pub mod recommendations;
pub mod saved_trials;
pub mod transcripts;
pub mod trials;

pub use chat::ChatRepository;
pub use database::{Database, DatabaseStats};
pub use error::{DbError, Result};
pub use patients::{PatientFilter, PatientRepository};
pub use provider_recommendations::ProviderRecommendationRepository;
pub use recommendations::RecommendationRepository;
pub use saved_trials::SavedTrialRepository;
pub use transcripts::{StatusCounts, TranscriptRepository};
pub use trials::TrialRepository;

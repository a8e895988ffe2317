//! Shared domain types for the TranscriptScribe backend.

pub mod chat;
pub mod error;
pub mod patient;
pub mod recommendation;
pub mod sandbox;
pub mod transcript;
pub mod trial;
pub mod validation;

pub use chat::{ChatMessage, ChatSender, ChatSession};
pub use error::{Result, ScribeError};
pub use patient::{Address, Patient, Sex};
pub use recommendation::{
    ProviderRecommendedTrial, RecommendationStatus, SavedTrial, TranscriptRecommendation, TrialBucket,
};
pub use sandbox::SandboxClient;
pub use transcript::{ParsedTranscript, Transcript, TranscriptStatus};
pub use trial::{ClinicalTrial, Contact, Intervention, Location, Outcome, SourceRegistry, TrialDetail, TrialPreview};
pub use validation::{AddressInput, FieldErrors, NormalizedPatient, PatientInput};

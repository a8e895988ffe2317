//! scribe-core: the TranscriptScribe services.
//!
//! - [`TranscriptService`]: transcript intake and background analysis
//! - [`ClinicalTrialService`]: candidate search, eligibility and ranking agents
//! - [`TrialEngagementService`]: saved trials and provider recommendations
//! - [`ChatService`]: patient questions about a trial

pub mod analyzer;
pub mod chat;
pub mod engagement;
pub mod error;
pub mod events;
pub mod matching;
pub mod transcripts;

use scribe_db::{
    ChatRepository, Database, PatientRepository, ProviderRecommendationRepository, RecommendationRepository,
    SavedTrialRepository, TranscriptRepository, TrialRepository,
};
use scribe_llm::LlmClient;
use scribe_trials::ClinicalTrialsSource;
use std::sync::Arc;

pub use analyzer::{LlmTranscriptAnalyzer, TranscriptAnalyzer};
pub use chat::ChatService;
pub use engagement::{ProviderRecommendationView, SavedTrialView, TrialEngagementService};
pub use error::{Result, ServiceError};
pub use events::TranscriptEvent;
pub use matching::{ClinicalTrialService, EligibilitySplit, RecommendedTrials};
pub use transcripts::TranscriptService;

/// All services wired over one database, registry and LLM.
#[derive(Clone)]
pub struct Services {
    pub patients: PatientRepository,
    pub transcripts: TranscriptService,
    pub matching: ClinicalTrialService,
    pub engagement: TrialEngagementService,
    pub chat: ChatService,
}

impl Services {
    pub fn new(db: Arc<Database>, registry: Arc<dyn ClinicalTrialsSource>, llm: LlmClient) -> Self {
        let analyzer: Arc<dyn TranscriptAnalyzer> = Arc::new(LlmTranscriptAnalyzer::new(llm.clone()));
        Self::with_analyzer(db, registry, llm, analyzer)
    }

    pub fn with_analyzer(
        db: Arc<Database>,
        registry: Arc<dyn ClinicalTrialsSource>,
        llm: LlmClient,
        analyzer: Arc<dyn TranscriptAnalyzer>,
    ) -> Self {
        let patients = PatientRepository::new(db.clone());
        let transcript_repo = TranscriptRepository::new(db.clone());
        let trials = TrialRepository::new(db.clone());

        let transcripts = TranscriptService::new(
            transcript_repo.clone(),
            patients.clone(),
            analyzer,
            events::channel(),
        );
        let matching = ClinicalTrialService::new(
            patients.clone(),
            transcript_repo,
            trials.clone(),
            RecommendationRepository::new(db.clone()),
            registry,
            llm.clone(),
        );
        let engagement = TrialEngagementService::new(
            patients.clone(),
            SavedTrialRepository::new(db.clone()),
            ProviderRecommendationRepository::new(db.clone()),
            trials,
            matching.clone(),
        );
        let chat = ChatService::new(ChatRepository::new(db), patients.clone(), matching.clone(), llm);

        Self { patients, transcripts, matching, engagement, chat }
    }
}

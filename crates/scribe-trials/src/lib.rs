//! scribe-trials: clinical trial registry access.
//!
//! - [`CtgClient`] searches and fetches studies from the ClinicalTrials.gov
//!   v2 API and maps them onto [`scribe_common::ClinicalTrial`].
//! - [`RegistryProxy`] relays portal requests to the registry untouched.

pub mod ctg;
pub mod error;
pub mod params;
pub mod proxy;
pub mod transform;

use async_trait::async_trait;
use scribe_common::{ClinicalTrial, ParsedTranscript, Patient, SourceRegistry};

pub use ctg::{CtgClient, CTG_BASE_URL, REGISTRY_VERSION};
pub use error::{RegistryError, Result};
pub use params::{build_search_params, SearchParams, SearchProfile};
pub use proxy::{ProxyResponse, RegistryProxy};
pub use transform::transform_study;

/// Common interface for registry clients.
#[async_trait]
pub trait ClinicalTrialsSource: Send + Sync {
    /// Candidate trials for a patient and their parsed transcript.
    async fn find_candidate_trials(
        &self,
        patient: &Patient,
        parsed: &ParsedTranscript,
    ) -> Result<Vec<ClinicalTrial>>;

    /// A single study by registry id. Unknown ids are [`RegistryError::NotFound`].
    async fn get_clinical_trial(&self, trial_id: &str) -> Result<ClinicalTrial>;

    /// True when the registry answers a minimal query. Never errors.
    async fn health_check(&self) -> bool;

    fn registry(&self) -> SourceRegistry;
}

//! ClinicalTrials.gov v2 API client.
//!
//! API docs: https://clinicaltrials.gov/data-api/api
//! Endpoint: {base}/studies

use async_trait::async_trait;
use chrono::Utc;
use scribe_common::{ClinicalTrial, ParsedTranscript, Patient, SandboxClient, SourceRegistry};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::{RegistryError, Result};
use crate::params::{build_search_params, SearchParams, SearchProfile, DEFAULT_PAGE_SIZE};
use crate::transform::transform_study;
use crate::ClinicalTrialsSource;

pub const CTG_BASE_URL: &str = "https://clinicaltrials.gov/api/v2";
pub const REGISTRY_VERSION: &str = "2.0.4";

#[derive(Debug, Clone)]
pub struct CtgClient {
    client: SandboxClient,
    base_url: String,
    page_size: u32,
}

impl CtgClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut client = SandboxClient::with_timeout(timeout)?;
        client.allow_url_host(base_url)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Query parameters for a candidate search, using today's date for age.
    pub fn search_params(&self, patient: &Patient, parsed: &ParsedTranscript) -> SearchParams {
        let profile = SearchProfile::resolve(Some(patient), parsed, Utc::now().date_naive());
        build_search_params(&profile, parsed, self.page_size)
    }

    async fn get_studies<Q: Serialize + ?Sized>(&self, query: &Q) -> Result<Vec<Value>> {
        let url = format!("{}/studies", self.base_url);
        let resp = self.client.get(&url)?.query(query).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RegistryError::Status {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| RegistryError::Decode(e.to_string()))?;
        Ok(json["studies"].as_array().cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ClinicalTrialsSource for CtgClient {
    #[instrument(skip(self, patient, parsed), fields(patient_id = %patient.id))]
    async fn find_candidate_trials(
        &self,
        patient: &Patient,
        parsed: &ParsedTranscript,
    ) -> Result<Vec<ClinicalTrial>> {
        let params = self.search_params(patient, parsed);
        if !params.has_terms() {
            debug!("No conditions or medications to search on");
            return Ok(Vec::new());
        }

        let studies = self.get_studies(&params).await?;
        let trials: Vec<ClinicalTrial> = studies
            .iter()
            .filter_map(|s| match transform_study(s) {
                Ok(t) => Some(t),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed study");
                    None
                }
            })
            .collect();
        debug!(n = trials.len(), "ClinicalTrials.gov candidates retrieved");
        Ok(trials)
    }

    #[instrument(skip(self))]
    async fn get_clinical_trial(&self, trial_id: &str) -> Result<ClinicalTrial> {
        let studies = self
            .get_studies(&[("format", "json"), ("filter.ids", trial_id)])
            .await?;
        match studies.first() {
            Some(study) => transform_study(study),
            None => Err(RegistryError::NotFound(trial_id.to_string())),
        }
    }

    async fn health_check(&self) -> bool {
        match self.get_studies(&[("format", "json"), ("pageSize", "1")]).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Registry health check failed");
                false
            }
        }
    }

    fn registry(&self) -> SourceRegistry {
        SourceRegistry::ClinicaltrialsGov
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalised() {
        let c = CtgClient::new("https://clinicaltrials.gov/api/v2/", Duration::from_secs(5)).unwrap();
        assert_eq!(c.base_url(), CTG_BASE_URL);
        assert_eq!(c.registry(), SourceRegistry::ClinicaltrialsGov);
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(CtgClient::new("not a url", Duration::from_secs(5)).is_err());
    }
}

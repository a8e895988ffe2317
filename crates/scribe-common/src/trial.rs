//! Clinical trial record as returned by a registry, plus the preview and
//! detail projections served to the portals.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ScribeError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceRegistry {
    #[default]
    ClinicaltrialsGov,
    Euctr,
    Isrctn,
}

impl SourceRegistry {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceRegistry::ClinicaltrialsGov => "CLINICALTRIALS_GOV",
            SourceRegistry::Euctr             => "EUCTR",
            SourceRegistry::Isrctn            => "ISRCTN",
        }
    }
}

impl fmt::Display for SourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceRegistry {
    type Err = ScribeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CLINICALTRIALS_GOV" => Ok(SourceRegistry::ClinicaltrialsGov),
            "EUCTR"              => Ok(SourceRegistry::Euctr),
            "ISRCTN"             => Ok(SourceRegistry::Isrctn),
            other => Err(ScribeError::InvalidValue { field: "source_registry", value: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub intervention_type: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub status: Option<String>,
    pub facility: Option<String>,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Location {
    pub fn city_state(&self) -> String {
        format!("{}, {}", self.city, self.state)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub role: Option<String>,
    pub affiliation: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub measure: String,
    pub description: Option<String>,
    pub time_frame: Option<String>,
    pub outcome_type: String,
}

/// A registry study. `external_id` is the registry's own identifier
/// (an NCT number for ClinicalTrials.gov).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalTrial {
    pub external_id: String,
    pub brief_title: String,
    pub official_title: Option<String>,

    pub status: String,
    pub conditions: Vec<String>,
    pub sponsor_name: Option<String>,
    pub phases: Vec<String>,
    pub minimum_age: Option<String>,
    pub maximum_age: Option<String>,
    pub locations: Vec<Location>,
    pub brief_summary: Option<String>,
    pub interventions: Vec<Intervention>,
    pub enrollment_count: Option<u32>,
    pub start_date: Option<NaiveDate>,

    pub detailed_description: Option<String>,
    pub study_type: Option<String>,
    pub primary_purpose: Option<String>,
    pub completion_date: Option<NaiveDate>,
    pub primary_completion_date: Option<NaiveDate>,

    pub eligibility_criteria: Option<String>,
    pub sex: Option<String>,
    pub healthy_volunteers: Option<bool>,
    pub standard_ages: Vec<String>,

    /// Registry-specific arm group documents, kept as-is.
    pub arm_groups: Vec<serde_json::Value>,

    pub primary_outcomes: Vec<Outcome>,
    pub secondary_outcomes: Vec<Outcome>,
    pub other_outcomes: Vec<Outcome>,

    pub central_contacts: Vec<Contact>,
    pub overall_officials: Vec<Contact>,

    pub source_registry: SourceRegistry,
    pub registry_version: Option<String>,
    pub last_updated: Option<NaiveDate>,
}

/// Row shape for trial lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialPreview {
    pub external_id: String,
    pub title: String,
    pub status: String,
    pub conditions: Vec<String>,
    pub sponsor: Option<String>,
    pub phases: Vec<String>,
    pub age_range: Option<String>,
    pub locations: String,
    pub summary: Option<String>,
    pub interventions: Vec<String>,
    pub enrollment_size: Option<u32>,
    pub start_date: Option<NaiveDate>,
}

/// Full trial page. Flattens the preview so both views share field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialDetail {
    #[serde(flatten)]
    pub preview: TrialPreview,
    pub official_title: Option<String>,
    pub detailed_description: Option<String>,
    pub study_type: Option<String>,
    pub primary_purpose: Option<String>,
    pub completion_date: Option<NaiveDate>,
    pub primary_completion_date: Option<NaiveDate>,
    pub eligibility_criteria: Option<String>,
    pub sex: Option<String>,
    pub healthy_volunteers: Option<bool>,
    pub standard_ages: Vec<String>,
    pub arm_groups: Vec<serde_json::Value>,
    pub primary_outcomes: Vec<Outcome>,
    pub secondary_outcomes: Vec<Outcome>,
    pub other_outcomes: Vec<Outcome>,
    pub central_contacts: Vec<Contact>,
    pub overall_officials: Vec<Contact>,
    pub source_registry: SourceRegistry,
    pub registry_version: Option<String>,
    pub last_updated: Option<NaiveDate>,
}

impl ClinicalTrial {
    pub fn preview(&self) -> TrialPreview {
        TrialPreview {
            external_id:     self.external_id.clone(),
            title:           self.brief_title.clone(),
            status:          self.status.clone(),
            conditions:      self.conditions.clone(),
            sponsor:         self.sponsor_name.clone(),
            phases:          self.phases.clone(),
            age_range:       format_age_range(self.minimum_age.as_deref(), self.maximum_age.as_deref()),
            locations:       format_locations_preview(&self.locations),
            summary:         self.brief_summary.clone(),
            interventions:   self.interventions.iter().map(|i| i.name.clone()).collect(),
            enrollment_size: self.enrollment_count,
            start_date:      self.start_date,
        }
    }

    pub fn detail(&self) -> TrialDetail {
        TrialDetail {
            preview:                 self.preview(),
            official_title:          self.official_title.clone(),
            detailed_description:    self.detailed_description.clone(),
            study_type:              self.study_type.clone(),
            primary_purpose:         self.primary_purpose.clone(),
            completion_date:         self.completion_date,
            primary_completion_date: self.primary_completion_date,
            eligibility_criteria:    self.eligibility_criteria.clone(),
            sex:                     self.sex.clone(),
            healthy_volunteers:      self.healthy_volunteers,
            standard_ages:           self.standard_ages.clone(),
            arm_groups:              self.arm_groups.clone(),
            primary_outcomes:        self.primary_outcomes.clone(),
            secondary_outcomes:      self.secondary_outcomes.clone(),
            other_outcomes:          self.other_outcomes.clone(),
            central_contacts:        self.central_contacts.clone(),
            overall_officials:       self.overall_officials.clone(),
            source_registry:         self.source_registry,
            registry_version:        self.registry_version.clone(),
            last_updated:            self.last_updated,
        }
    }
}

pub fn format_age_range(min: Option<&str>, max: Option<&str>) -> Option<String> {
    let min = min.filter(|s| !s.is_empty());
    let max = max.filter(|s| !s.is_empty());
    match (min, max) {
        (Some(lo), Some(hi)) => Some(format!("{lo} - {hi}")),
        (Some(lo), None)     => Some(format!("{lo}+")),
        (None, Some(hi))     => Some(format!("Up to {hi}")),
        (None, None)         => None,
    }
}

pub fn format_locations_preview(locations: &[Location]) -> String {
    match locations {
        [] => "No locations specified".to_string(),
        few if few.len() <= 3 => few
            .iter()
            .map(Location::city_state)
            .collect::<Vec<_>>()
            .join(" and "),
        [first, rest @ ..] => format!("{} and {} more", first.city_state(), rest.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn loc(city: &str, state: &str) -> Location {
        Location { city: city.into(), state: state.into(), country: "United States".into(), ..Default::default() }
    }

    #[test]
    fn test_age_range_variants() {
        assert_eq!(format_age_range(Some("18 Years"), Some("65 Years")).as_deref(), Some("18 Years - 65 Years"));
        assert_eq!(format_age_range(Some("18 Years"), None).as_deref(), Some("18 Years+"));
        assert_eq!(format_age_range(None, Some("65 Years")).as_deref(), Some("Up to 65 Years"));
        assert_eq!(format_age_range(None, None), None);
        assert_eq!(format_age_range(Some(""), None), None);
    }

    #[test]
    fn test_locations_preview() {
        assert_eq!(format_locations_preview(&[]), "No locations specified");
        assert_eq!(format_locations_preview(&[loc("Boston", "MA")]), "Boston, MA");
        assert_eq!(
            format_locations_preview(&[loc("Boston", "MA"), loc("Austin", "TX"), loc("Denver", "CO")]),
            "Boston, MA and Austin, TX and Denver, CO"
        );
        assert_eq!(
            format_locations_preview(&[loc("Boston", "MA"), loc("Austin", "TX"), loc("Denver", "CO"), loc("Miami", "FL")]),
            "Boston, MA and 3 more"
        );
    }

    #[test]
    fn test_detail_flattens_preview_fields() {
        let trial = ClinicalTrial {
            external_id: "NCT00000001".into(),
            brief_title: "Study".into(),
            status: "RECRUITING".into(),
            interventions: vec![Intervention { intervention_type: "DRUG".into(), name: "Metformin".into(), description: None }],
            ..Default::default()
        };
        let json = serde_json::to_value(trial.detail()).unwrap();
        assert_eq!(json["external_id"], "NCT00000001");
        assert_eq!(json["title"], "Study");
        assert_eq!(json["interventions"][0], "Metformin");
        assert_eq!(json["locations"], "No locations specified");
        assert_eq!(json["source_registry"], "CLINICALTRIALS_GOV");
    }
}

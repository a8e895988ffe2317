//! Query construction for `GET /studies`.
//!
//! Terms come from the transcript (conditions and medications). Age, sex and
//! location filters prefer the patient record and fall back to what the
//! transcript says.

use chrono::NaiveDate;
use scribe_common::{Address, ParsedTranscript, Patient, Sex};
use serde::Serialize;
use std::collections::BTreeMap;

pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Study fields requested from the registry for search results.
pub const SEARCH_FIELDS: &[&str] = &[
    "NCTId",
    "BriefTitle",
    "OfficialTitle",
    "OverallStatus",
    "Condition",
    "LeadSponsorName",
    "Phase",
    "MinimumAge",
    "MaximumAge",
    "Sex",
    "HealthyVolunteers",
    "StdAge",
    "EligibilityCriteria",
    "BriefSummary",
    "DetailedDescription",
    "StudyType",
    "DesignPrimaryPurpose",
    "InterventionType",
    "InterventionName",
    "InterventionDescription",
    "EnrollmentCount",
    "StartDate",
    "PrimaryCompletionDate",
    "CompletionDate",
    "LastUpdatePostDate",
    "LocationFacility",
    "LocationStatus",
    "LocationCity",
    "LocationState",
    "LocationCountry",
    "LocationZip",
    "LocationGeoPoint",
];

const RECRUITING_STATUSES: &str = "RECRUITING|NOT_YET_RECRUITING";

/// Demographics used for filtering, resolved from patient and transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchProfile {
    pub age: Option<u32>,
    pub sex: Option<Sex>,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl SearchProfile {
    pub fn resolve(patient: Option<&Patient>, parsed: &ParsedTranscript, today: NaiveDate) -> Self {
        let age = patient.map(|p| p.age_on(today)).or(parsed.age);
        let sex = patient.map(|p| p.sex).or(parsed.sex);

        let located = |a: &&Address| !a.is_unlocated();
        let address = patient
            .map(|p| &p.address)
            .filter(located)
            .or_else(|| parsed.location.as_ref().filter(located));

        Self {
            age,
            sex,
            city: address.and_then(|a| clean(a.city.as_deref())),
            state: address.and_then(|a| clean(a.state.as_deref())),
        }
    }
}

/// Query parameters, serialised straight into the request URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SearchParams(BTreeMap<&'static str, String>);

impl SearchParams {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn has_terms(&self) -> bool {
        self.0.contains_key("query.term")
    }

    fn set(&mut self, key: &'static str, value: impl Into<String>) {
        self.0.insert(key, value.into());
    }
}

pub fn build_search_params(profile: &SearchProfile, parsed: &ParsedTranscript, page_size: u32) -> SearchParams {
    let mut params = SearchParams::default();
    params.set("format", "json");
    params.set("pageSize", page_size.to_string());
    params.set("fields", SEARCH_FIELDS.join(","));
    params.set("filter.overallStatus", RECRUITING_STATUSES);

    let terms: Vec<String> = parsed
        .conditions
        .iter()
        .filter_map(|c| clean(Some(c.as_str())))
        .map(|c| format!("AREA[Condition]\"{c}\""))
        .chain(
            parsed
                .medications
                .iter()
                .filter_map(|m| clean(Some(m.as_str())))
                .map(|m| format!("AREA[InterventionName]\"{m}\"")),
        )
        .collect();
    if !terms.is_empty() {
        params.set("query.term", terms.join(" OR "));
    }

    let mut filters = Vec::new();
    if let Some(age) = profile.age {
        filters.push(format!(
            "AREA[MinimumAge]RANGE[MIN, {age} years] AND AREA[MaximumAge]RANGE[{age} years, MAX]"
        ));
    }
    match profile.sex {
        Some(Sex::Male)   => filters.push("(AREA[Sex]ALL OR AREA[Sex]MALE)".to_string()),
        Some(Sex::Female) => filters.push("(AREA[Sex]ALL OR AREA[Sex]FEMALE)".to_string()),
        Some(Sex::Other)  => filters.push("AREA[Sex]ALL".to_string()),
        None => {}
    }
    let location: Vec<String> = [
        profile.city.as_ref().map(|c| format!("AREA[LocationCity]\"{c}\"")),
        profile.state.as_ref().map(|s| format!("AREA[LocationState]\"{s}\"")),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !location.is_empty() {
        filters.push(format!("SEARCH[Location]({})", location.join(" AND ")));
    }
    if !filters.is_empty() {
        params.set("filter.advanced", filters.join(" AND "));
    }

    params
}

/// Trim and drop characters that would break out of a quoted Essie term.
fn clean(value: Option<&str>) -> Option<String> {
    let v: String = value?.chars().filter(|c| *c != '"').collect();
    let v = v.trim();
    (!v.is_empty()).then(|| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn patient(address: Address) -> Patient {
        Patient {
            id: Uuid::new_v4(),
            user_id: None,
            first_name: "John".into(),
            last_name: "Doe".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1978, 1, 1).unwrap(),
            sex: Sex::Male,
            email: None,
            phone: None,
            address,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn parsed() -> ParsedTranscript {
        ParsedTranscript {
            conditions: vec!["Diabetes".into(), "Hypertension".into()],
            medications: vec!["Metformin".into(), "Lisinopril".into()],
            age: Some(45),
            sex: Some(Sex::Female),
            location: Some(Address { city: Some("Austin".into()), state: Some("TX".into()), ..Default::default() }),
            ..Default::default()
        }
    }

    #[test]
    fn test_terms_and_status_filter() {
        let p = patient(Address::default());
        let profile = SearchProfile::resolve(Some(&p), &parsed(), today());
        let params = build_search_params(&profile, &parsed(), DEFAULT_PAGE_SIZE);

        assert_eq!(params.get("format"), Some("json"));
        assert_eq!(params.get("pageSize"), Some("50"));
        assert!(params.get("fields").unwrap().starts_with("NCTId,BriefTitle,"));
        assert_eq!(
            params.get("query.term"),
            Some(
                "AREA[Condition]\"Diabetes\" OR AREA[Condition]\"Hypertension\" OR \
                 AREA[InterventionName]\"Metformin\" OR AREA[InterventionName]\"Lisinopril\""
            )
        );
        assert_eq!(params.get("filter.overallStatus"), Some("RECRUITING|NOT_YET_RECRUITING"));
    }

    #[test]
    fn test_patient_record_wins_over_transcript() {
        let p = patient(Address { city: Some("Boston".into()), state: Some("MA".into()), ..Default::default() });
        let profile = SearchProfile::resolve(Some(&p), &parsed(), today());
        assert_eq!(profile.age, Some(46));
        assert_eq!(profile.sex, Some(Sex::Male));

        let params = build_search_params(&profile, &parsed(), DEFAULT_PAGE_SIZE);
        assert_eq!(
            params.get("filter.advanced"),
            Some(
                "AREA[MinimumAge]RANGE[MIN, 46 years] AND AREA[MaximumAge]RANGE[46 years, MAX] AND \
                 (AREA[Sex]ALL OR AREA[Sex]MALE) AND \
                 SEARCH[Location](AREA[LocationCity]\"Boston\" AND AREA[LocationState]\"MA\")"
            )
        );
    }

    #[test]
    fn test_transcript_fills_missing_demographics() {
        let profile = SearchProfile::resolve(None, &parsed(), today());
        assert_eq!(profile.age, Some(45));
        assert_eq!(profile.sex, Some(Sex::Female));
        assert_eq!(profile.city.as_deref(), Some("Austin"));

        let p = patient(Address::default());
        let profile = SearchProfile::resolve(Some(&p), &parsed(), today());
        assert_eq!(profile.state.as_deref(), Some("TX"));
    }

    #[test]
    fn test_no_terms_no_filters() {
        let params = build_search_params(&SearchProfile::default(), &ParsedTranscript::default(), 10);
        assert!(!params.has_terms());
        assert_eq!(params.get("filter.advanced"), None);
        assert_eq!(params.get("pageSize"), Some("10"));
    }

    #[test]
    fn test_quotes_are_stripped_from_terms() {
        let parsed = ParsedTranscript { conditions: vec!["\"Type 2\" diabetes ".into(), "  ".into()], ..Default::default() };
        let params = build_search_params(&SearchProfile::default(), &parsed, 10);
        assert_eq!(params.get("query.term"), Some("AREA[Condition]\"Type 2 diabetes\""));
    }
}

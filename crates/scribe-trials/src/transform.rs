//! ClinicalTrials.gov v2 study JSON → [`ClinicalTrial`].
//!
//! Every module under `protocolSection` is optional. Several fields appear in
//! more than one place depending on API revision (phases under
//! `designModule.phases` or `armsInterventionsModule.phaseInfo`, study type
//! under `designModule` or `statusModule`, enrollment as a number or a
//! string), so lookups try each known location in turn.

use chrono::NaiveDate;
use scribe_common::{ClinicalTrial, Contact, Intervention, Location, Outcome, SourceRegistry};
use serde_json::Value;

use crate::ctg::REGISTRY_VERSION;
use crate::error::{RegistryError, Result};

pub fn transform_study(study: &Value) -> Result<ClinicalTrial> {
    let proto = &study["protocolSection"];
    let id_mod       = &proto["identificationModule"];
    let status_mod   = &proto["statusModule"];
    let sponsor_mod  = first_object(&[&proto["sponsorCollaboratorsModule"], &proto["sponsorModule"]]);
    let desc_mod     = &proto["descriptionModule"];
    let cond_mod     = &proto["conditionsModule"];
    let design_mod   = &proto["designModule"];
    let arms_mod     = &proto["armsInterventionsModule"];
    let elig_mod     = &proto["eligibilityModule"];
    let contacts_mod = &proto["contactsLocationsModule"];
    let outcomes_mod = &proto["outcomesModule"];

    let external_id = text(&id_mod["nctId"])
        .ok_or_else(|| RegistryError::Decode("study without identificationModule.nctId".into()))?;

    let phases = match strings(&design_mod["phases"]) {
        p if !p.is_empty() => p,
        _ => arms_mod["phaseInfo"]
            .as_array()
            .map(|items| items.iter().filter_map(|i| text(&i["phase"])).collect())
            .unwrap_or_default(),
    };

    Ok(ClinicalTrial {
        brief_title: text(&id_mod["briefTitle"]).unwrap_or_default(),
        official_title: text(&id_mod["officialTitle"]),

        status: text(&status_mod["overallStatus"]).unwrap_or_else(|| "UNKNOWN".to_string()),
        conditions: strings(&cond_mod["conditions"]),
        sponsor_name: text(&sponsor_mod["leadSponsor"]["name"])
            .or_else(|| text(&sponsor_mod["leadSponsor"]["leadSponsorName"])),
        phases,
        minimum_age: text(&elig_mod["minimumAge"]),
        maximum_age: text(&elig_mod["maximumAge"]),
        locations: array(&contacts_mod["locations"]).map(location).collect(),
        brief_summary: text_block(&desc_mod["briefSummary"]),
        interventions: array(&arms_mod["interventions"]).map(intervention).collect(),
        enrollment_count: count(&design_mod["enrollmentInfo"]["count"])
            .or_else(|| count(&elig_mod["enrollmentCount"])),
        start_date: date(&status_mod["startDateStruct"]["date"]),

        detailed_description: text_block(&desc_mod["detailedDescription"]),
        study_type: text(&design_mod["studyType"]).or_else(|| text(&status_mod["studyType"])),
        primary_purpose: text(&design_mod["designInfo"]["primaryPurpose"])
            .or_else(|| text(&status_mod["primaryPurpose"])),
        completion_date: date(&status_mod["completionDateStruct"]["date"]),
        primary_completion_date: date(&status_mod["primaryCompletionDateStruct"]["date"]),

        eligibility_criteria: text(&elig_mod["eligibilityCriteria"]),
        sex: text(&elig_mod["sex"]),
        healthy_volunteers: flag(&elig_mod["healthyVolunteers"]),
        standard_ages: strings(&elig_mod["stdAges"]).into_iter()
            .chain(strings(&elig_mod["standardAges"]))
            .collect(),

        arm_groups: array(&arms_mod["armGroups"]).cloned().collect(),

        primary_outcomes: array(&outcomes_mod["primaryOutcomes"]).map(|o| outcome(o, "PRIMARY")).collect(),
        secondary_outcomes: array(&outcomes_mod["secondaryOutcomes"]).map(|o| outcome(o, "SECONDARY")).collect(),
        other_outcomes: array(&outcomes_mod["otherOutcomes"]).map(|o| outcome(o, "OTHER")).collect(),

        central_contacts: array(&contacts_mod["centralContacts"]).map(contact).collect(),
        overall_officials: array(&contacts_mod["overallOfficials"]).map(contact).collect(),

        source_registry: SourceRegistry::ClinicaltrialsGov,
        registry_version: Some(REGISTRY_VERSION.to_string()),
        last_updated: date(&status_mod["lastUpdatePostDateStruct"]["date"]),
        external_id,
    })
}

fn location(v: &Value) -> Location {
    Location {
        status: text(&v["status"]),
        facility: text(&v["facility"]),
        city: text(&v["city"]).unwrap_or_default(),
        state: text(&v["state"]).unwrap_or_default(),
        country: text(&v["country"]).unwrap_or_default(),
        zip_code: text(&v["zip"]).or_else(|| text(&v["zipCode"])),
        latitude: v["geoPoint"]["lat"].as_f64(),
        longitude: v["geoPoint"]["lon"].as_f64(),
    }
}

fn intervention(v: &Value) -> Intervention {
    Intervention {
        intervention_type: text(&v["type"]).unwrap_or_default(),
        name: text(&v["name"]).unwrap_or_default(),
        description: text(&v["description"]),
    }
}

fn outcome(v: &Value, outcome_type: &str) -> Outcome {
    Outcome {
        measure: text(&v["measure"]).unwrap_or_default(),
        description: text(&v["description"]),
        time_frame: text(&v["timeFrame"]),
        outcome_type: outcome_type.to_string(),
    }
}

fn contact(v: &Value) -> Contact {
    Contact {
        name: text(&v["name"]).unwrap_or_default(),
        role: text(&v["role"]),
        affiliation: text(&v["affiliation"]),
        phone: text(&v["phone"]),
        email: text(&v["email"]),
    }
}

// ── Field helpers ─────────────────────────────────────────────────────────────

static NULL: Value = Value::Null;

fn first_object<'a>(candidates: &[&'a Value]) -> &'a Value {
    candidates
        .iter()
        .find(|v| v.is_object())
        .copied()
        .unwrap_or(&NULL)
}

fn array(v: &Value) -> impl Iterator<Item = &Value> {
    v.as_array().into_iter().flatten()
}

fn text(v: &Value) -> Option<String> {
    v.as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Older payloads wrap long text as `{"textBlock": "..."}`.
fn text_block(v: &Value) -> Option<String> {
    text(v).or_else(|| text(&v["textBlock"]))
}

fn strings(v: &Value) -> Vec<String> {
    array(v).filter_map(text).collect()
}

fn count(v: &Value) -> Option<u32> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn flag(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "true"  => Some(true),
            "no" | "false"  => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// `2023-01-15`, `2023-01` or `2023`; partial dates resolve to the first day.
pub(crate) fn parse_partial_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").ok())
        .or_else(|| NaiveDate::parse_from_str(&format!("{s}-01-01"), "%Y-%m-%d").ok())
}

fn date(v: &Value) -> Option<NaiveDate> {
    v.as_str().and_then(parse_partial_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_partial_dates() {
        assert_eq!(parse_partial_date("2023-01-15"), NaiveDate::from_ymd_opt(2023, 1, 15));
        assert_eq!(parse_partial_date("2023-01"), NaiveDate::from_ymd_opt(2023, 1, 1));
        assert_eq!(parse_partial_date("2023"), NaiveDate::from_ymd_opt(2023, 1, 1));
        assert_eq!(parse_partial_date("soon"), None);
    }

    #[test]
    fn test_healthy_volunteers_forms() {
        assert_eq!(flag(&json!(true)), Some(true));
        assert_eq!(flag(&json!("No")), Some(false));
        assert_eq!(flag(&json!("YES")), Some(true));
        assert_eq!(flag(&json!("maybe")), None);
        assert_eq!(flag(&Value::Null), None);
    }

    #[test]
    fn test_enrollment_number_or_string() {
        assert_eq!(count(&json!(120)), Some(120));
        assert_eq!(count(&json!("100")), Some(100));
        assert_eq!(count(&json!(-1)), None);
    }

    #[test]
    fn test_current_api_layout() {
        let study = json!({
            "protocolSection": {
                "identificationModule": { "nctId": "NCT05000001", "briefTitle": "Asthma Study" },
                "statusModule": {
                    "overallStatus": "NOT_YET_RECRUITING",
                    "startDateStruct": { "date": "2024-09" },
                    "lastUpdatePostDateStruct": { "date": "2024-08-30" }
                },
                "sponsorCollaboratorsModule": { "leadSponsor": { "name": "Acme Pharma" } },
                "descriptionModule": { "briefSummary": "Short." },
                "designModule": {
                    "studyType": "INTERVENTIONAL",
                    "phases": ["PHASE2", "PHASE3"],
                    "designInfo": { "primaryPurpose": "TREATMENT" },
                    "enrollmentInfo": { "count": 240 }
                },
                "eligibilityModule": { "healthyVolunteers": true, "stdAges": ["ADULT"] },
                "contactsLocationsModule": {
                    "locations": [{ "city": "Denver", "state": "Colorado", "country": "United States",
                                    "geoPoint": { "lat": 39.74, "lon": -104.99 } }],
                    "centralContacts": [{ "name": "Study Desk", "role": "CONTACT", "email": "desk@example.org" }]
                },
                "outcomesModule": { "primaryOutcomes": [{ "measure": "FEV1", "timeFrame": "12 weeks" }] }
            }
        });

        let trial = transform_study(&study).unwrap();
        assert_eq!(trial.external_id, "NCT05000001");
        assert_eq!(trial.sponsor_name.as_deref(), Some("Acme Pharma"));
        assert_eq!(trial.phases, vec!["PHASE2", "PHASE3"]);
        assert_eq!(trial.study_type.as_deref(), Some("INTERVENTIONAL"));
        assert_eq!(trial.primary_purpose.as_deref(), Some("TREATMENT"));
        assert_eq!(trial.enrollment_count, Some(240));
        assert_eq!(trial.start_date, NaiveDate::from_ymd_opt(2024, 9, 1));
        assert_eq!(trial.last_updated, NaiveDate::from_ymd_opt(2024, 8, 30));
        assert_eq!(trial.healthy_volunteers, Some(true));
        assert_eq!(trial.locations[0].latitude, Some(39.74));
        assert_eq!(trial.central_contacts[0].email.as_deref(), Some("desk@example.org"));
        assert_eq!(trial.primary_outcomes[0].outcome_type, "PRIMARY");
        assert_eq!(trial.primary_outcomes[0].time_frame.as_deref(), Some("12 weeks"));
    }

    #[test]
    fn test_missing_nct_id_is_an_error() {
        let err = transform_study(&json!({ "protocolSection": {} })).unwrap_err();
        assert!(matches!(err, RegistryError::Decode(_)));
    }
}

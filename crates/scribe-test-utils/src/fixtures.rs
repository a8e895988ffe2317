use chrono::NaiveDate;
use scribe_common::{
    Address, AddressInput, ClinicalTrial, Intervention, Location, NormalizedPatient, ParsedTranscript, PatientInput, Sex,
};
use serde_json::{json, Value};

pub const SAMPLE_TRANSCRIPT: &str = "\
Doctor: Good morning, what brings you in today?
Patient: I've been really tired and thirsty all the time for the past month.
Doctor: Your A1C came back at 8.2, which confirms type 2 diabetes. Your blood pressure is also high.
Patient: My father had diabetes too. I smoke about half a pack a day.
Doctor: We'll start you on metformin 500mg twice daily and continue lisinopril. No chest pain?
Patient: No chest pain, no shortness of breath.";

pub fn patient_input() -> PatientInput {
    PatientInput {
        first_name: "Jane".into(),
        last_name: "Doe".into(),
        date_of_birth: NaiveDate::from_ymd_opt(1979, 3, 14).unwrap(),
        sex: Sex::Female,
        email: Some("jane.doe@example.com".into()),
        phone: Some("555-0100".into()),
        address: AddressInput {
            street: Some("1 Main St".into()),
            city: Some("Boston".into()),
            state: Some("MA".into()),
            zip_code: Some("02110".into()),
            country: None,
        },
        user_id: None,
    }
}

pub fn normalized_patient(first: &str, last: &str) -> NormalizedPatient {
    NormalizedPatient {
        first_name: first.into(),
        last_name: last.into(),
        date_of_birth: NaiveDate::from_ymd_opt(1979, 3, 14).unwrap(),
        sex: Sex::Female,
        email: Some(format!("{}@example.com", first.to_lowercase())),
        phone: None,
        address: Address {
            city: Some("Boston".into()),
            state: Some("MA".into()),
            country: Some("USA".into()),
            ..Default::default()
        },
        user_id: None,
    }
}

pub fn parsed_transcript() -> ParsedTranscript {
    ParsedTranscript {
        conditions: vec!["Type 2 Diabetes".into(), "Hypertension".into()],
        medications: vec!["Metformin".into(), "Lisinopril".into()],
        age: Some(45),
        sex: Some(Sex::Female),
        positive_symptoms: vec!["Fatigue".into(), "Increased thirst".into()],
        negative_symptoms: vec!["Chest pain".into()],
        positive_lab_results: vec!["A1C 8.2%".into()],
        family_history: vec!["Father: diabetes".into()],
        negative_lifestyle_factors: vec!["Smoker, half a pack per day".into()],
        ..Default::default()
    }
}

/// What the analyzer LLM returns for [`SAMPLE_TRANSCRIPT`].
pub fn parsed_transcript_json() -> Value {
    json!({
        "conditions": ["Type 2 Diabetes", "Hypertension"],
        "medications": ["Metformin", "Lisinopril"],
        "procedures": null,
        "age": 45,
        "sex": "FEMALE",
        "location": null,
        "positive_symptoms": ["Fatigue", "Increased thirst"],
        "negative_symptoms": ["Chest pain"],
        "positive_lab_results": ["A1C 8.2%"],
        "negative_lab_results": [],
        "positive_imaging_results": [],
        "negative_imaging_results": [],
        "past_diagnoses": [],
        "past_surgeries": [],
        "family_history": ["Father: diabetes"],
        "positive_lifestyle_factors": [],
        "negative_lifestyle_factors": ["Smoker, half a pack per day"],
        "extraction_notes": []
    })
}

pub fn clinical_trial(id: &str) -> ClinicalTrial {
    ClinicalTrial {
        external_id: id.into(),
        brief_title: format!("Study {id}"),
        status: "RECRUITING".into(),
        conditions: vec!["Type 2 Diabetes".into()],
        sponsor_name: Some("Test Pharmaceutical Company".into()),
        phases: vec!["PHASE3".into()],
        minimum_age: Some("18 Years".into()),
        maximum_age: Some("75 Years".into()),
        locations: vec![Location {
            facility: Some("Test Hospital".into()),
            city: "Boston".into(),
            state: "MA".into(),
            country: "United States".into(),
            ..Default::default()
        }],
        brief_summary: Some("A test study.".into()),
        interventions: vec![Intervention {
            intervention_type: "DRUG".into(),
            name: "Test Drug".into(),
            description: None,
        }],
        eligibility_criteria: Some("Inclusion: adults with type 2 diabetes.".into()),
        ..Default::default()
    }
}

/// A full study in the ClinicalTrials.gov v2 JSON layout.
pub fn ctg_study(nct_id: &str, title: &str) -> Value {
    json!({
        "protocolSection": {
            "identificationModule": {
                "nctId": nct_id,
                "briefTitle": title,
                "officialTitle": "A Phase 3 Study of Test Drug in Patients"
            },
            "statusModule": {
                "overallStatus": "RECRUITING",
                "startDateStruct": { "date": "2023-01-15" },
                "studyType": "INTERVENTIONAL",
                "primaryPurpose": "TREATMENT"
            },
            "sponsorModule": {
                "leadSponsor": { "leadSponsorName": "Test Pharmaceutical Company" }
            },
            "descriptionModule": {
                "briefSummary": "This is a test clinical trial",
                "detailedDescription": "Detailed description of the trial"
            },
            "conditionsModule": { "conditions": ["Diabetes", "Hypertension"] },
            "armsInterventionsModule": {
                "phaseInfo": [{ "phase": "PHASE_3" }],
                "interventions": [
                    { "type": "DRUG", "name": "Test Drug", "description": "Experimental drug" }
                ]
            },
            "eligibilityModule": {
                "minimumAge": "18 years",
                "maximumAge": "75 years",
                "enrollmentCount": "100",
                "eligibilityCriteria": "Inclusion criteria...",
                "sex": "ALL",
                "healthyVolunteers": "No",
                "standardAges": ["ADULT", "OLDER_ADULT"]
            },
            "contactsLocationsModule": {
                "locations": [{
                    "status": "RECRUITING",
                    "facility": "Test Hospital",
                    "city": "New York",
                    "state": "NY",
                    "country": "United States",
                    "zip": "10001"
                }]
            },
            "outcomesModule": { "primaryOutcomes": [], "secondaryOutcomes": [] }
        }
    })
}

/// A study with every optional module present but empty.
pub fn ctg_minimal_study(nct_id: &str) -> Value {
    json!({
        "protocolSection": {
            "identificationModule": { "nctId": nct_id, "briefTitle": "Test Trial" },
            "statusModule": { "overallStatus": "RECRUITING" },
            "sponsorModule": { "leadSponsor": { "leadSponsorName": "Test Sponsor" } },
            "descriptionModule": {},
            "conditionsModule": {},
            "armsInterventionsModule": {},
            "eligibilityModule": {},
            "contactsLocationsModule": {},
            "outcomesModule": {}
        }
    })
}

pub fn ctg_search_response(studies: Vec<Value>) -> Value {
    json!({ "studies": studies })
}

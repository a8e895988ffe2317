//! Registry client and proxy tests against a mock ClinicalTrials.gov.

use chrono::{NaiveDate, Utc};
use pretty_assertions::assert_eq;
use reqwest::Method;
use scribe_common::{Address, Patient, Sex, SourceRegistry};
use scribe_test_utils::fixtures::{ctg_minimal_study, ctg_search_response, ctg_study, parsed_transcript};
use scribe_trials::{ClinicalTrialsSource, CtgClient, RegistryError, RegistryProxy};
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{body_string, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn patient() -> Patient {
    Patient {
        id: Uuid::new_v4(),
        user_id: None,
        first_name: "John".into(),
        last_name: "Doe".into(),
        date_of_birth: NaiveDate::from_ymd_opt(1978, 1, 1).unwrap(),
        sex: Sex::Male,
        email: None,
        phone: None,
        address: Address::default(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn client(server: &MockServer) -> CtgClient {
    CtgClient::new(&server.uri(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_find_candidate_trials_maps_studies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/studies"))
        .and(query_param("format", "json"))
        .and(query_param("pageSize", "50"))
        .and(query_param("filter.overallStatus", "RECRUITING|NOT_YET_RECRUITING"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(ctg_search_response(vec![ctg_study("NCT12345678", "Test Clinical Trial")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let trials = client(&server)
        .find_candidate_trials(&patient(), &parsed_transcript())
        .await
        .unwrap();

    assert_eq!(trials.len(), 1);
    let t = &trials[0];
    assert_eq!(t.external_id, "NCT12345678");
    assert_eq!(t.brief_title, "Test Clinical Trial");
    assert_eq!(t.official_title.as_deref(), Some("A Phase 3 Study of Test Drug in Patients"));
    assert_eq!(t.status, "RECRUITING");
    assert_eq!(t.conditions, vec!["Diabetes", "Hypertension"]);
    assert_eq!(t.sponsor_name.as_deref(), Some("Test Pharmaceutical Company"));
    assert_eq!(t.phases, vec!["PHASE_3"]);
    assert_eq!(t.minimum_age.as_deref(), Some("18 years"));
    assert_eq!(t.study_type.as_deref(), Some("INTERVENTIONAL"));
    assert_eq!(t.primary_purpose.as_deref(), Some("TREATMENT"));
    assert_eq!(t.enrollment_count, Some(100));
    assert_eq!(t.start_date, NaiveDate::from_ymd_opt(2023, 1, 15));
    assert_eq!(t.healthy_volunteers, Some(false));
    assert_eq!(t.standard_ages, vec!["ADULT", "OLDER_ADULT"]);
    assert_eq!(t.source_registry, SourceRegistry::ClinicaltrialsGov);
    assert_eq!(t.registry_version.as_deref(), Some("2.0.4"));
    assert_eq!(t.locations[0].zip_code.as_deref(), Some("10001"));
    assert_eq!(t.interventions[0].intervention_type, "DRUG");
    assert_eq!(t.interventions[0].description.as_deref(), Some("Experimental drug"));
}

#[tokio::test]
async fn test_minimal_study_has_empty_collections() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/studies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ctg_search_response(vec![ctg_minimal_study("NCT12345678")])))
        .mount(&server)
        .await;

    let t = client(&server).get_clinical_trial("NCT12345678").await.unwrap();
    assert_eq!(t.brief_title, "Test Trial");
    assert_eq!(t.sponsor_name.as_deref(), Some("Test Sponsor"));
    assert!(t.conditions.is_empty());
    assert!(t.phases.is_empty());
    assert!(t.locations.is_empty());
    assert!(t.interventions.is_empty());
}

#[tokio::test]
async fn test_get_clinical_trial_filters_by_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/studies"))
        .and(query_param("filter.ids", "NCT12345678"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ctg_search_response(vec![ctg_study("NCT12345678", "T")])))
        .expect(1)
        .mount(&server)
        .await;

    let t = client(&server).get_clinical_trial("NCT12345678").await.unwrap();
    assert_eq!(t.external_id, "NCT12345678");
}

#[tokio::test]
async fn test_get_clinical_trial_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ctg_search_response(vec![])))
        .mount(&server)
        .await;

    let err = client(&server).get_clinical_trial("NCT12345678").await.unwrap_err();
    assert_eq!(err.to_string(), "Clinical trial with NCT ID NCT12345678 not found");
}

#[tokio::test]
async fn test_http_error_is_propagated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let err = client(&server)
        .find_candidate_trials(&patient(), &parsed_transcript())
        .await
        .unwrap_err();
    match err {
        RegistryError::Status { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "upstream down");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_no_search_terms_skips_registry() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let trials = client(&server)
        .find_candidate_trials(&patient(), &Default::default())
        .await
        .unwrap();
    assert!(trials.is_empty());
}

#[tokio::test]
async fn test_health_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("pageSize", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ctg_search_response(vec![])))
        .mount(&server)
        .await;
    assert!(client(&server).health_check().await);

    let down = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(503)).mount(&down).await;
    assert!(!client(&down).health_check().await);
}

#[tokio::test]
async fn test_proxy_relays_status_and_body_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/studies"))
        .and(query_param("query.term", "asthma"))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("content-type", "application/json")
                .set_body_string(r#"{"message":"nope"}"#),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/studies/search"))
        .and(body_string(r#"{"q":1}"#))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .mount(&server)
        .await;

    let proxy = RegistryProxy::new(&server.uri(), Duration::from_secs(5)).unwrap();

    let resp = proxy
        .forward(Method::GET, "studies", Some("query.term=asthma"), None, Default::default())
        .await
        .unwrap();
    assert_eq!(resp.status, 404);
    assert_eq!(resp.content_type.as_deref(), Some("application/json"));
    assert_eq!(&resp.body[..], br#"{"message":"nope"}"#);

    let resp = proxy
        .forward(Method::POST, "/studies/search", None, Some("application/json"), r#"{"q":1}"#.into())
        .await
        .unwrap();
    assert_eq!(resp.status, 201);
    assert_eq!(&resp.body[..], b"created");
}

#[tokio::test]
#[ignore] // Requires network access
async fn test_live_registry_search() {
    let client = CtgClient::new(scribe_trials::CTG_BASE_URL, Duration::from_secs(30)).unwrap();
    assert!(client.health_check().await);

    let trials = client
        .find_candidate_trials(&patient(), &parsed_transcript())
        .await
        .expect("registry search failed");
    println!("Found {} candidate trials", trials.len());
    for t in trials.iter().take(5) {
        println!("{} [{}] {}", t.external_id, t.status, t.brief_title);
    }
}

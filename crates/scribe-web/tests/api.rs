use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use pretty_assertions::assert_eq;
use scribe_db::Database;
use scribe_llm::LlmClient;
use scribe_test_utils::fixtures::{ctg_search_response, ctg_study, normalized_patient, parsed_transcript_json};
use scribe_test_utils::{test_database, ScriptedLlmBackend};
use scribe_trials::{CtgClient, RegistryProxy};
use scribe_web::auth::AuthSettings;
use scribe_web::router::build_router;
use scribe_web::state::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "integration-secret";

struct TestApp {
    router: Router,
    db: Arc<Database>,
    llm: Arc<ScriptedLlmBackend>,
    registry: MockServer,
}

async fn app() -> TestApp {
    let registry = MockServer::start().await;
    let db = test_database().await;
    let llm = Arc::new(ScriptedLlmBackend::new());
    let timeout = Duration::from_secs(5);

    let state = AppState::new(
        db.clone(),
        Arc::new(CtgClient::new(&registry.uri(), timeout).unwrap()),
        LlmClient::new(llm.clone()),
        RegistryProxy::new(&registry.uri(), timeout).unwrap(),
        AuthSettings::new(SECRET, "authenticated", "admin", "patient"),
    )
    .unwrap();
    let router = build_router(state, &["*".to_string()]);
    TestApp { router, db, llm, registry }
}

fn token(sub: &str, role: &str) -> String {
    let claims = json!({
        "sub": sub,
        "aud": "authenticated",
        "exp": chrono::Utc::now().timestamp() + 3600,
        "role": "authenticated",
        "app_metadata": { "role": role },
    });
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

fn admin() -> String {
    token("admin-1", "admin")
}

fn request(method: &str, uri: &str, bearer: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

impl TestApp {
    async fn send(&self, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    async fn send_json(&self, req: Request<Body>) -> (StatusCode, Value) {
        let (status, bytes) = self.send(req).await;
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    /// Patient linked to the auth subject `sub`.
    async fn linked_patient(&self, sub: &str) -> scribe_common::Patient {
        let mut input = normalized_patient("Jane", "Doe");
        input.user_id = Some(sub.to_string());
        scribe_db::PatientRepository::new(self.db.clone()).create(&input).await.unwrap()
    }

    async fn mount_study(&self, nct_id: &str) {
        Mock::given(method("GET"))
            .and(path("/studies"))
            .and(query_param("filter.ids", nct_id))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(ctg_search_response(vec![ctg_study(nct_id, "Test Clinical Trial")])),
            )
            .mount(&self.registry)
            .await;
    }
}

fn patient_body() -> Value {
    json!({
        "first_name": "Maria",
        "last_name": "Lopez",
        "date_of_birth": "1985-07-02",
        "sex": "FEMALE",
        "email": "maria@example.com",
        "address": { "city": "Austin", "state": "tx", "zip_code": "78701" }
    })
}

// ── Public routes ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_liveness_is_public() {
    let app = app().await;
    let (status, body) = app.send_json(request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_api_health_reports_registry() {
    let app = app().await;
    Mock::given(method("GET"))
        .and(path("/studies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ctg_search_response(vec![])))
        .mount(&app.registry)
        .await;

    let (status, body) = app.send_json(request("GET", "/api/v1/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], true);
    assert_eq!(body["registry"], true);
    assert_eq!(body["llm"]["model"], "scripted");
}

#[tokio::test]
async fn test_dashboard_renders() {
    let app = app().await;
    let (status, bytes) = app.send(request("GET", "/", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(bytes).unwrap();
    assert!(html.contains("TranscriptScribe"));
    assert!(html.contains("Pending Recommendations"));
}

// ── Auth ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_admin_routes_require_token_and_role() {
    let app = app().await;

    let (status, body) = app.send_json(request("GET", "/api/v1/patients", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = app.send_json(request("GET", "/api/v1/patients", Some("not-a-jwt"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let patient_token = token("user-1", "patient");
    let (status, _) = app.send_json(request("GET", "/api/v1/patients", Some(&patient_token), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send_json(request("GET", "/api/v1/patients", Some(&admin()), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_portal_requires_linked_patient() {
    let app = app().await;
    let unlinked = token("nobody", "patient");
    let (status, _) = app.send_json(request("GET", "/api/v1/me", Some(&unlinked), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let patient = app.linked_patient("user-1").await;
    let (status, body) = app.send_json(request("GET", "/api/v1/me", Some(&token("user-1", "patient")), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], patient.id.to_string());
}

// ── Patients and transcripts ────────────────────────────────────────────────

#[tokio::test]
async fn test_patient_validation_reports_every_field() {
    let app = app().await;
    let body = json!({
        "first_name": "M",
        "last_name": "L",
        "date_of_birth": "1850-01-01",
        "sex": "FEMALE",
        "address": { "state": "Texas" }
    });
    let (status, resp) = app.send_json(request("POST", "/api/v1/patients", Some(&admin()), Some(body))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(resp["error"], "validation_error");
    for field in ["first_name", "last_name", "date_of_birth", "address.state"] {
        assert!(resp["fields"].get(field).is_some(), "missing {field}: {resp}");
    }
}

#[tokio::test]
async fn test_patient_crud() {
    let app = app().await;
    let (status, created) = app
        .send_json(request("POST", "/api/v1/patients", Some(&admin()), Some(patient_body())))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["address"]["state"], "TX");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, count) = app.send_json(request("GET", "/api/v1/patients/count", Some(&admin()), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count["count"], 1);

    let (status, found) = app
        .send_json(request("GET", "/api/v1/patients?search=lop", Some(&admin()), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found.as_array().unwrap().len(), 1);

    let (status, _) = app
        .send_json(request("DELETE", &format!("/api/v1/patients/{id}"), Some(&admin()), None))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app
        .send_json(request("GET", &format!("/api/v1/patients/{id}"), Some(&admin()), None))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_transcript_upload_is_accepted_and_processed() {
    let app = app().await;
    let patient = app.linked_patient("user-1").await;
    app.llm.push_json(parsed_transcript_json());

    let uri = format!("/api/v1/patients/{}/transcripts", patient.id);
    let body = json!({ "raw_transcript": "Doctor: How are you?\nPatient: Tired and thirsty." });
    let (status, created) = app.send_json(request("POST", &uri, Some(&admin()), Some(body))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(created["status"], "PENDING");

    let id = created["id"].as_str().unwrap().to_string();
    let mut last = Value::Null;
    for _ in 0..50 {
        let (_, t) = app
            .send_json(request("GET", &format!("/api/v1/transcripts/{id}"), Some(&admin()), None))
            .await;
        if t["status"] == "COMPLETED" {
            last = t;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(last["parsed"]["conditions"], json!(["Type 2 Diabetes", "Hypertension"]));

    let (status, _) = app
        .send_json(request("POST", &format!("/api/v1/transcripts/{id}/match"), Some(&admin()), None))
        .await;
    // No mocked search endpoint: the registry answers 404.
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_blank_transcript_is_unprocessable() {
    let app = app().await;
    let patient = app.linked_patient("user-1").await;
    let uri = format!("/api/v1/patients/{}/transcripts", patient.id);
    let (status, body) = app
        .send_json(request("POST", &uri, Some(&admin()), Some(json!({ "raw_transcript": "  " }))))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["fields"].get("raw_transcript").is_some());
}

// ── Portal ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_saved_trials_toggle() {
    let app = app().await;
    app.linked_patient("user-1").await;
    app.mount_study("NCT001").await;
    let me = token("user-1", "patient");

    let (status, _) = app.send(request("PUT", "/api/v1/me/saved-trials/NCT001", Some(&me), None)).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.send(request("PUT", "/api/v1/me/saved-trials/NCT001", Some(&me), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, saved) = app.send_json(request("GET", "/api/v1/me/saved-trials", Some(&me), None)).await;
    assert_eq!(saved[0]["trial_id"], "NCT001");
    assert_eq!(saved[0]["trial"]["title"], "Test Clinical Trial");

    let (status, _) = app.send(request("DELETE", "/api/v1/me/saved-trials/NCT001", Some(&me), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, ids) = app.send_json(request("GET", "/api/v1/me/saved-trials/ids", Some(&me), None)).await;
    assert_eq!(ids, json!([]));
}

#[tokio::test]
async fn test_provider_recommendation_flow() {
    let app = app().await;
    let patient = app.linked_patient("user-1").await;
    app.mount_study("NCT001").await;
    let me = token("user-1", "patient");

    let uri = format!("/api/v1/patients/{}/provider-recommendations", patient.id);
    let (status, rec) = app
        .send_json(request("POST", &uri, Some(&admin()), Some(json!({ "trial_id": "NCT001", "note": "Ask me" }))))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(rec["status"], "PENDING");

    let (status, accepted) = app
        .send_json(request("POST", "/api/v1/me/provider-recommendations/NCT001/accept", Some(&me), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["status"], "ACCEPTED");

    let (_, pending) = app
        .send_json(request("GET", "/api/v1/me/provider-recommendations?status=PENDING", Some(&me), None))
        .await;
    assert_eq!(pending, json!([]));

    let (status, _) = app
        .send_json(request("POST", "/api/v1/me/provider-recommendations/NCT999/reject", Some(&me), None))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_chat_session_roundtrip() {
    let app = app().await;
    app.linked_patient("user-1").await;
    app.mount_study("NCT001").await;
    let me = token("user-1", "patient");

    let (status, session) = app
        .send_json(request("POST", "/api/v1/me/chat/sessions", Some(&me), Some(json!({ "trial_id": "NCT001" }))))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(session["title"], "Test Clinical Trial");

    app.llm.push_text("The study lasts twelve weeks.");
    let uri = format!("/api/v1/me/chat/sessions/{}/messages", session["id"].as_str().unwrap());
    let (status, reply) = app
        .send_json(request("POST", &uri, Some(&me), Some(json!({ "message": "How long is it?" }))))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["sender"], "bot");

    // Another patient cannot read the session.
    app.linked_patient("user-2").await;
    let (status, _) = app.send_json(request("GET", &uri, Some(&token("user-2", "patient")), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Proxy ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_proxy_relays_upstream_verbatim() {
    let app = app().await;
    Mock::given(method("GET"))
        .and(path("/studies/NCT404"))
        .respond_with(ResponseTemplate::new(404).set_body_raw("no such study", "text/plain"))
        .mount(&app.registry)
        .await;
    Mock::given(method("GET"))
        .and(path("/studies"))
        .and(query_param("query.term", "asthma"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "studies": [], "totalCount": 0 })))
        .mount(&app.registry)
        .await;

    let (status, bytes) = app.send(request("GET", "/api/ctg-proxy/studies/NCT404", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(bytes, b"no such study");

    let (status, body) = app
        .send_json(request("GET", "/api/ctg-proxy/studies?query.term=asthma", None, None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "studies": [], "totalCount": 0 }));
}

#[tokio::test]
async fn test_proxy_rejects_traversal() {
    let app = app().await;
    for uri in [
        "/api/ctg-proxy/studies/../../etc",
        "/api/ctg-proxy/.%2e/.%2e/secret",
        "/api/ctg-proxy/%2e./%2e./secret",
        "/api/ctg-proxy/%2E%2e/%2e%2E/secret",
        "/api/ctg-proxy/%252e%252E/secret",
    ] {
        let (status, body) = app.send_json(request("GET", uri, None, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error"], "bad_request");
    }
}

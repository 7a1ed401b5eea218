use api_rest::{router, AppState};
use api_shared::ApiKey;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use clinic_authz_core::{AuthzConfig, Directory, DirectoryBackend};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const DIRECTORY: &str = r#"
roles:
  - id: "1"
    name: super_admin
    display_name: Super Admin
    is_system_role: true
  - id: "3"
    name: nurse
    display_name: Nurse
    permissions: [patients.view, appointments.view]
users:
  - id: sa1
    name: Sam Super
    email: sam@clinic.example
    role: super_admin
  - id: n1
    name: Nia Nurse
    email: nia@clinic.example
    role: nurse
  - id: n2
    name: Ned Former
    email: ned@clinic.example
    role: nurse
    is_active: false
clinics:
  - id: c1
    name: Harbour Clinic
    code: HRB
  - id: c2
    name: Hillside Clinic
    code: HLS
clinic_access:
  n1: [c1]
"#;

const KEY: &str = "test-key";

fn app() -> Router {
    let backend = Arc::new(DirectoryBackend::new(Directory::parse(DIRECTORY).unwrap()));
    let cfg = Arc::new(AuthzConfig::new("unused.yaml".into(), "/dashboard".into(), false).unwrap());
    router(AppState::new(backend, cfg, ApiKey::new(KEY).unwrap()))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn health_is_open() {
    let (status, body) = send(&app(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
}

#[tokio::test]
async fn permission_catalog_falls_back_to_builtin() {
    let (status, body) = send(&app(), get("/permissions")).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"patients.view"));
    assert!(ids.contains(&"roles.manage"));
}

#[tokio::test]
async fn check_single_any_and_all() {
    let app = app();

    let (_, body) = send(
        &app,
        json_request("POST", "/users/n1/check", json!({"permissions": ["patients.view"]}), None),
    )
    .await;
    assert_eq!(body["allowed"], json!(true));

    let (_, body) = send(
        &app,
        json_request(
            "POST",
            "/users/n1/check",
            json!({"permissions": ["patients.delete", "appointments.view"], "mode": "any"}),
            None,
        ),
    )
    .await;
    assert_eq!(body["allowed"], json!(true));

    let (_, body) = send(
        &app,
        json_request(
            "POST",
            "/users/n1/check",
            json!({"permissions": ["patients.view", "invoices.view"], "mode": "all"}),
            None,
        ),
    )
    .await;
    assert_eq!(body["allowed"], json!(false));
}

#[tokio::test]
async fn empty_permission_sets_follow_any_and_all_semantics() {
    let app = app();
    for (user, mode, expected) in [
        ("sa1", "any", false),
        ("n1", "any", false),
        ("n1", "all", true),
    ] {
        let (_, body) = send(
            &app,
            json_request(
                "POST",
                &format!("/users/{user}/check"),
                json!({"permissions": [], "mode": mode}),
                None,
            ),
        )
        .await;
        assert_eq!(body["allowed"], json!(expected), "{user} {mode}");
    }
}

#[tokio::test]
async fn single_mode_requires_exactly_one_permission() {
    let (status, _) = send(
        &app(),
        json_request(
            "POST",
            "/users/n1/check",
            json!({"permissions": ["patients.view", "appointments.view"]}),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let (status, _) = send(
        &app(),
        json_request("POST", "/users/ghost/check", json!({"permissions": ["patients.view"]}), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn clinic_checks_respect_grants_and_bypass() {
    let app = app();
    let (_, body) = send(&app, get("/users/n1/clinics/c1/access")).await;
    assert_eq!(body["allowed"], json!(true));
    let (_, body) = send(&app, get("/users/n1/clinics/c2/access")).await;
    assert_eq!(body["allowed"], json!(false));
    let (_, body) = send(&app, get("/users/sa1/clinics/c2/access")).await;
    assert_eq!(body["allowed"], json!(true));
    let (_, body) = send(&app, get("/users/n2/clinics/c1/access")).await;
    assert_eq!(body["allowed"], json!(false));
}

#[tokio::test]
async fn navigation_is_filtered_for_the_user() {
    let (status, body) = send(&app(), get("/users/n1/navigation")).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Dashboard", "Patients", "Appointments"]);
}

#[tokio::test]
async fn inactive_users_see_no_navigation() {
    let (_, body) = send(&app(), get("/users/n2/navigation")).await;
    assert_eq!(body["items"], json!([]));
}

#[tokio::test]
async fn mutations_require_the_api_key() {
    let app = app();
    let body = json!({"permissions": ["patients.view"]});

    let (status, _) = send(&app, json_request("PUT", "/roles/3/permissions", body.clone(), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        json_request("PUT", "/roles/3/permissions", body, Some("wrong")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::post("/users/n1/clinics/c2").body(Body::empty()).unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn replacing_role_permissions_changes_decisions() {
    let app = app();
    let (status, body) = send(
        &app,
        json_request(
            "PUT",
            "/roles/3/permissions",
            json!({"permissions": ["invoices.view"]}),
            Some(KEY),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["permissions"], json!(["invoices.view"]));

    let (_, body) = send(
        &app,
        json_request("POST", "/users/n1/check", json!({"permissions": ["patients.view"]}), None),
    )
    .await;
    assert_eq!(body["allowed"], json!(false));
}

#[tokio::test]
async fn role_replacement_rejects_bad_input() {
    let app = app();

    let (status, _) = send(
        &app,
        json_request(
            "PUT",
            "/roles/3/permissions",
            json!({"permissions": ["vault.open"]}),
            Some(KEY),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        json_request("PUT", "/roles/1/permissions", json!({"permissions": []}), Some(KEY)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        json_request("PUT", "/roles/9/permissions", json!({"permissions": []}), Some(KEY)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn grant_and_revoke_clinic_access() {
    let app = app();

    let request = Request::post("/users/n1/clinics/c2")
        .header("x-api-key", KEY)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["clinics"], json!(["c1", "c2"]));

    let request = Request::delete("/users/n1/clinics/c1")
        .header("x-api-key", KEY)
        .body(Body::empty())
        .unwrap();
    let (_, body) = send(&app, request).await;
    assert_eq!(body["clinics"], json!(["c2"]));

    let (_, body) = send(&app, get("/users/n1/clinics")).await;
    assert_eq!(body["clinics"], json!(["c2"]));

    let request = Request::post("/users/n1/clinics/c404")
        .header("x-api-key", KEY)
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let (status, body) = send(&app(), get("/api-docs/openapi.json")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"].get("/users/{id}/check").is_some());
}

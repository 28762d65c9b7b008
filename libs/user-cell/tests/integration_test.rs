use std::sync::Arc;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt;
use serde_json::{json, Value};
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{body_json as body_json_matcher, method, path, query_param};

use shared_config::AppConfig;
use shared_models::auth::Role;
use shared_utils::test_utils::{TestConfig, TestUser, JwtTestUtils, MockSupabaseResponses};
use user_cell::router::user_routes;

fn create_test_app(config: AppConfig) -> Router {
    user_routes(Arc::new(config))
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json");

    match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn mount_caller_role(mock_server: &MockServer, caller: &TestUser, role: Role) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", caller.id)))
        .and(query_param("select", "role"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::role_row(role)
        ])))
        .mount(mock_server)
        .await;
}

async fn mount_user_row(mock_server: &MockServer, user_id: &str) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", user_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::user_row(user_id, "jane@example.com", Role::Patient)
        ])))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_requires_token() {
    let app = create_test_app(TestConfig::default().to_app_config());

    let request = Request::builder()
        .method("GET")
        .uri("/u1")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_reads_own_profile_without_role_lookup() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let patient = TestUser::patient("jane@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.supabase_jwt_secret, Some(1));
    mount_user_row(&mock_server, &patient.id).await;

    let app = create_test_app(config);
    let uri = format!("/{}", patient.id);
    let response = app.oneshot(request("GET", &uri, &token, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], patient.id);
    assert_eq!(body["blood_group"], "O+");
    assert_eq!(body["role"], "patient");
}

#[tokio::test]
async fn test_query_form_requires_user_id() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let patient = TestUser::patient("jane@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.supabase_jwt_secret, Some(1));

    let app = create_test_app(config);
    let response = app.oneshot(request("GET", "/", &token, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("Missing userId"));
}

#[tokio::test]
async fn test_query_form_reads_profile() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let patient = TestUser::patient("jane@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.supabase_jwt_secret, Some(1));
    mount_user_row(&mock_server, &patient.id).await;

    let app = create_test_app(config);
    let uri = format!("/?userId={}", patient.id);
    let response = app.oneshot(request("GET", &uri, &token, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["email"], "jane@example.com");
}

#[tokio::test]
async fn test_linked_doctor_reads_patient() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.supabase_jwt_secret, Some(1));
    mount_caller_role(&mock_server, &doctor, Role::Doctor).await;
    mount_user_row(&mock_server, "p1").await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_patient"))
        .and(query_param("doctor_id", format!("eq.{}", doctor.id)))
        .and(query_param("patient_id", "eq.p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::link_row(&doctor.id, "p1")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let response = app.oneshot(request("GET", "/p1", &token, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["id"], "p1");
}

#[tokio::test]
async fn test_unlinked_doctor_is_forbidden() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.supabase_jwt_secret, Some(1));
    mount_caller_role(&mock_server, &doctor, Role::Doctor).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_patient"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let response = app.oneshot(request("GET", "/p1", &token, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_patient_cannot_read_other_patient() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let patient = TestUser::patient("jane@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.supabase_jwt_secret, Some(1));
    mount_caller_role(&mock_server, &patient, Role::Patient).await;

    let app = create_test_app(config);
    let response = app.oneshot(request("GET", "/p2", &token, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_reads_any_user() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let admin = TestUser::hospital_admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.supabase_jwt_secret, Some(1));
    mount_caller_role(&mock_server, &admin, Role::HospitalAdmin).await;
    mount_user_row(&mock_server, "p1").await;

    let app = create_test_app(config);
    let response = app.oneshot(request("GET", "/p1", &token, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_user_is_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let patient = TestUser::patient("jane@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.supabase_jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let uri = format!("/{}", patient.id);
    let response = app.oneshot(request("GET", &uri, &token, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_own_profile_sends_only_editable_fields() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let patient = TestUser::patient("jane@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.supabase_jwt_secret, Some(1));

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", patient.id)))
        .and(body_json_matcher(json!({ "phone": "+91 99999 00000", "blood_group": "B+" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::user_row(&patient.id, "jane@example.com", Role::Patient)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let uri = format!("/{}", patient.id);
    let response = app.oneshot(request("PUT", &uri, &token, Some(json!({
        "phone": "+91 99999 00000",
        "blood_group": "b+",
        "role": "system_admin"
    })))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_update_other_user_requires_system_admin() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.supabase_jwt_secret, Some(1));
    mount_caller_role(&mock_server, &doctor, Role::Doctor).await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let response = app.oneshot(request("PUT", "/p1", &token, Some(json!({
        "name": "Renamed"
    })))).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_system_admin_updates_any_user() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let admin = TestUser::system_admin("root@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.supabase_jwt_secret, Some(1));
    mount_caller_role(&mock_server, &admin, Role::SystemAdmin).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", "eq.p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::user_row("p1", "jane@example.com", Role::Patient)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let response = app.oneshot(request("PUT", "/p1", &token, Some(json!({
        "name": "Jane Doe"
    })))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

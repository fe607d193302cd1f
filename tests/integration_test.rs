// Integration tests for Xero Gateway
//
// These tests drive the full HTTP stack (routing, middleware, JSON shapes)
// against a mocked Xero identity and accounting API.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use mockito::{Matcher, ServerGuard};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceExt;

use xero_gateway::{
    adapter::XeroAdapter,
    auth::{Credentials, TokenSet, TokenStore},
    http_client::ClientOptions,
    routes::{self, AppState},
};

const API_KEY: &str = "test-api-key-secret";

// ==================================================================================================
// Test Helpers
// ==================================================================================================

fn options(server: &ServerGuard) -> ClientOptions {
    ClientOptions {
        identity_url: server.url(),
        api_url: server.url(),
        ..ClientOptions::default()
    }
}

async fn mock_identity(server: &mut ServerGuard) {
    let body = json!({
        "authorization_endpoint": format!("{}/identity/connect/authorize", server.url()),
        "token_endpoint": format!("{}/connect/token", server.url()),
    });
    server
        .mock("GET", "/.well-known/openid-configuration")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;
    server
        .mock("GET", "/connections")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!([{"id": "c1", "tenantId": "tenant-1", "tenantType": "ORGANISATION", "tenantName": "Demo Co"}])
                .to_string(),
        )
        .create_async()
        .await;
}

/// Application state with an initialized adapter pointed at the mock server
async fn create_test_app_state(server: &mut ServerGuard, token: Option<TokenSet>) -> AppState {
    mock_identity(server).await;

    let creds = Credentials::new("client-id", "client-secret", "http://localhost:8000/callback");
    let mut adapter = XeroAdapter::with_options(creds, token, options(server))
        .expect("Failed to create adapter");
    adapter
        .init_client()
        .await
        .expect("Failed to initialize adapter");

    AppState {
        proxy_api_key: API_KEY.to_string(),
        adapter: Arc::new(Mutex::new(adapter)),
        token_store: Arc::new(TokenStore::open_in_memory().expect("Failed to open store")),
    }
}

fn live_token() -> TokenSet {
    let mut token = TokenSet::new("access-1", "refresh-1");
    token.expires_at = Some(Utc::now().timestamp() + 1800);
    token
}

fn build_test_app(state: AppState) -> Router {
    routes::build_app(state)
}

async fn parse_json_body(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn journal_body() -> String {
    json!({
        "narration": "Month end accrual",
        "date": "2024-03-31",
        "journalLines": [
            {"accountCode": "200", "amount": "12.50", "description": "Revenue"},
            {"accountCode": "400", "amount": -12.5, "description": "Expense"}
        ]
    })
    .to_string()
}

// ==================================================================================================
// Health Check Tests
// ==================================================================================================

#[tokio::test]
async fn test_root_endpoint() {
    let mut server = mockito::Server::new_async().await;
    let app = build_test_app(create_test_app_state(&mut server, None).await);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = parse_json_body(response.into_body()).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_health_endpoint() {
    let mut server = mockito::Server::new_async().await;
    let app = build_test_app(create_test_app_state(&mut server, None).await);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = parse_json_body(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
}

// ==================================================================================================
// OAuth Flow Tests
// ==================================================================================================

#[tokio::test]
async fn test_connect_redirects_to_consent_url() {
    let mut server = mockito::Server::new_async().await;
    let app = build_test_app(create_test_app_state(&mut server, None).await);

    let response = app
        .oneshot(Request::builder().uri("/connect").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with(&format!("{}/identity/connect/authorize?", server.url())));
    assert!(location.contains("response_type=code"));
    assert!(location.contains("offline_access"));
}

#[tokio::test]
async fn test_callback_persists_token() {
    let mut server = mockito::Server::new_async().await;
    let state = create_test_app_state(&mut server, None).await;
    let token_mock = server
        .mock("POST", "/connect/token")
        .match_body(Matcher::UrlEncoded("code".into(), "auth-code".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"access-cb","refresh_token":"refresh-cb","expires_in":1800}"#)
        .create_async()
        .await;

    let store = state.token_store.clone();
    let app = build_test_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/callback?code=auth-code&scope=openid")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    token_mock.assert_async().await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = parse_json_body(response.into_body()).await;
    assert_eq!(json["status"], "connected");
    assert_eq!(json["tenants"][0]["tenantId"], "tenant-1");

    let stored = store.load().unwrap().expect("token should be persisted");
    assert_eq!(stored.access_token, "access-cb");
    assert_eq!(stored.refresh_token, "refresh-cb");
}

#[tokio::test]
async fn test_callback_with_provider_error() {
    let mut server = mockito::Server::new_async().await;
    let state = create_test_app_state(&mut server, None).await;
    let store = state.token_store.clone();
    let app = build_test_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/callback?error=access_denied")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = parse_json_body(response.into_body()).await;
    assert_eq!(json["error"]["type"], "validation_error");
    assert!(store.load().unwrap().is_none());
}

// ==================================================================================================
// Authentication Tests
// ==================================================================================================

#[tokio::test]
async fn test_accounts_requires_api_key() {
    let mut server = mockito::Server::new_async().await;
    let app = build_test_app(create_test_app_state(&mut server, Some(live_token())).await);

    let response = app
        .oneshot(Request::builder().uri("/accounts").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = parse_json_body(response.into_body()).await;
    assert_eq!(json["error"]["type"], "auth_error");
}

// ==================================================================================================
// Journal Tests
// ==================================================================================================

#[tokio::test]
async fn test_create_journal_success() {
    let mut server = mockito::Server::new_async().await;
    let state = create_test_app_state(&mut server, Some(live_token())).await;
    let journals = server
        .mock("PUT", "/api.xro/2.0/ManualJournals")
        .match_header("xero-tenant-id", "tenant-1")
        .match_body(Matcher::PartialJson(json!({
            "ManualJournals": [{
                "Status": "DRAFT",
                "JournalLines": [{"LineAmount": 12.5}, {"LineAmount": -12.5}]
            }]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ManualJournals":[{"ManualJournalID":"mj-1"}]}"#)
        .create_async()
        .await;

    let app = build_test_app(state);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/journals")
                .header("content-type", "application/json")
                .header("x-api-key", API_KEY)
                .body(Body::from(journal_body()))
                .unwrap(),
        )
        .await
        .unwrap();

    journals.assert_async().await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = parse_json_body(response.into_body()).await;
    assert_eq!(
        json,
        json!({"statusCode": 200, "message": "Successfully created journal."})
    );
}

#[tokio::test]
async fn test_create_journal_remote_rejection_is_reshaped() {
    let mut server = mockito::Server::new_async().await;
    let state = create_test_app_state(&mut server, Some(live_token())).await;
    server
        .mock("PUT", "/api.xro/2.0/ManualJournals")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"Type":"ValidationException"}"#)
        .create_async()
        .await;

    let app = build_test_app(state);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/journals")
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {}", API_KEY))
                .body(Body::from(journal_body()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = parse_json_body(response.into_body()).await;
    assert_eq!(json, json!({"statusCode": 400, "message": "Bad Request"}));
}

#[tokio::test]
async fn test_create_journal_refreshes_expired_token() {
    let mut server = mockito::Server::new_async().await;

    let mut expired = TokenSet::new("access-old", "refresh-old");
    expired.expires_at = Some(Utc::now().timestamp() - 10);

    // Tokens issued with expires_in=0 are expired immediately, so both the
    // startup refresh and the request refresh hit the token endpoint
    let refresh = server
        .mock("POST", "/connect/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"access-new","refresh_token":"refresh-new","expires_in":0}"#)
        .expect(2)
        .create_async()
        .await;
    let state = create_test_app_state(&mut server, Some(expired)).await;

    let journals = server
        .mock("PUT", "/api.xro/2.0/ManualJournals")
        .match_header("authorization", "Bearer access-new")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ManualJournals":[]}"#)
        .create_async()
        .await;

    let app = build_test_app(state);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/journals")
                .header("content-type", "application/json")
                .header("x-api-key", API_KEY)
                .body(Body::from(journal_body()))
                .unwrap(),
        )
        .await
        .unwrap();

    refresh.assert_async().await;
    journals.assert_async().await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_journal_refresh_failure_is_reshaped() {
    let mut server = mockito::Server::new_async().await;

    let mut expired = TokenSet::new("access-old", "refresh-old");
    expired.expires_at = Some(Utc::now().timestamp() - 10);

    let refresh = server
        .mock("POST", "/connect/token")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"invalid_grant"}"#)
        .expect(2)
        .create_async()
        .await;
    let state = create_test_app_state(&mut server, Some(expired)).await;

    let journals = server
        .mock("PUT", "/api.xro/2.0/ManualJournals")
        .expect(0)
        .create_async()
        .await;

    let app = build_test_app(state);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/journals")
                .header("content-type", "application/json")
                .header("x-api-key", API_KEY)
                .body(Body::from(journal_body()))
                .unwrap(),
        )
        .await
        .unwrap();

    refresh.assert_async().await;
    journals.assert_async().await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = parse_json_body(response.into_body()).await;
    assert_eq!(json, json!({"statusCode": 400, "message": "Bad Request"}));
}

// ==================================================================================================
// Accounts Tests
// ==================================================================================================

#[tokio::test]
async fn test_get_accounts() {
    let mut server = mockito::Server::new_async().await;
    let state = create_test_app_state(&mut server, Some(live_token())).await;
    server
        .mock("GET", "/api.xro/2.0/Accounts")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"Accounts": [
                {"AccountID": "a1", "Code": "200", "Name": "Sales", "Type": "REVENUE"},
                {"AccountID": "a2", "Code": "400", "Name": "Advertising", "Type": "EXPENSE"}
            ]})
            .to_string(),
        )
        .create_async()
        .await;

    let app = build_test_app(state);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/accounts")
                .header("x-api-key", API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = parse_json_body(response.into_body()).await;
    let accounts = json.as_array().unwrap();
    assert_eq!(accounts.len(), 2);
    assert_eq!(accounts[0]["id"], "a1");
    assert_eq!(accounts[0]["code"], "200");
    assert_eq!(accounts[0]["name"], "Sales");
    assert_eq!(accounts[1]["type"]["Type"], "EXPENSE");
}

#[tokio::test]
async fn test_get_accounts_empty_is_not_found() {
    let mut server = mockito::Server::new_async().await;
    let state = create_test_app_state(&mut server, Some(live_token())).await;
    server
        .mock("GET", "/api.xro/2.0/Accounts")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"Accounts":[]}"#)
        .create_async()
        .await;

    let app = build_test_app(state);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/accounts")
                .header("x-api-key", API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = parse_json_body(response.into_body()).await;
    assert_eq!(json["error"]["message"], "No accounts found.");
}

#[tokio::test]
async fn test_get_accounts_before_authorization() {
    let mut server = mockito::Server::new_async().await;
    let app = build_test_app(create_test_app_state(&mut server, None).await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/accounts")
                .header("x-api-key", API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = parse_json_body(response.into_body()).await;
    assert_eq!(json["error"]["type"], "not_ready");
}

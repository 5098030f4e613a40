//! End-to-end tests for the four identity operations over HTTP, against a
//! real PostgreSQL store and (where noted) a mocked upstream provider.

mod common;

use common::TestApp;
use login_service::config::UpstreamConfig;
use reqwest::Client;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn register_then_login_locally() {
    let app = TestApp::spawn_local_only().await;
    let client = Client::new();

    let response = client
        .post(format!("{}/auth/register", app.address))
        .json(&json!({
            "username": "alice",
            "password": "pw-1",
            "email": "alice@example.com"
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);

    let response = client
        .post(format!("{}/auth/login", app.address))
        .json(&json!({"username": "alice", "password": "pw-1"}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);

    let response = client
        .post(format!("{}/auth/login", app.address))
        .json(&json!({"username": "alice", "password": "wrong"}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 401);

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn duplicate_registration_is_a_conflict() {
    let app = TestApp::spawn_local_only().await;
    let client = Client::new();

    let payload = json!({"username": "bob", "password": "pw", "email": null});

    let response = client
        .post(format!("{}/auth/register", app.address))
        .json(&payload)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);

    let response = client
        .post(format!("{}/auth/register", app.address))
        .json(&payload)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 409);

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn verify_reports_local_existence() {
    let app = TestApp::spawn_local_only().await;
    let client = Client::new();

    client
        .post(format!("{}/auth/register", app.address))
        .json(&json!({"username": "carol", "password": "pw"}))
        .send()
        .await
        .expect("Failed to execute request");

    let response = client
        .get(format!("{}/auth/verify/carol", app.address))
        .send()
        .await
        .expect("Failed to execute request");
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["exists"], true);

    let response = client
        .get(format!("{}/auth/verify/nobody", app.address))
        .send()
        .await
        .expect("Failed to execute request");
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["exists"], false);

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn password_update_replaces_the_old_secret() {
    let app = TestApp::spawn_local_only().await;
    let client = Client::new();

    client
        .post(format!("{}/auth/register", app.address))
        .json(&json!({"username": "dave", "password": "old"}))
        .send()
        .await
        .expect("Failed to execute request");

    let response = client
        .put(format!("{}/auth/update-password", app.address))
        .json(&json!({"username": "dave", "new_password": "new"}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);

    let response = client
        .post(format!("{}/auth/login", app.address))
        .json(&json!({"username": "dave", "password": "old"}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 401);

    let response = client
        .post(format!("{}/auth/login", app.address))
        .json(&json!({"username": "dave", "password": "new"}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn updating_an_unknown_user_is_not_found() {
    let app = TestApp::spawn_local_only().await;
    let client = Client::new();

    let response = client
        .put(format!("{}/auth/update-password", app.address))
        .json(&json!({"username": "ghost", "new_password": "new"}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 404);

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn upstream_grant_wins_without_a_local_record() {
    let upstream = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "ok",
            "token": "tok-1"
        })))
        .mount(&upstream)
        .await;

    let app = TestApp::spawn(UpstreamConfig {
        enabled: true,
        base_url: upstream.uri(),
        api_key: SecretString::new("test-key".to_string()),
        ..UpstreamConfig::default()
    })
    .await;
    let client = Client::new();

    // No local registration: the upstream grant alone decides the login.
    let response = client
        .post(format!("{}/auth/login", app.address))
        .json(&json!({"username": "erin", "password": "pw"}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn local_grant_pushes_credentials_to_a_failing_upstream() {
    let upstream = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "message": "unknown user"
        })))
        .mount(&upstream)
        .await;

    // Hit once by the registration's best-effort mirror and once by the
    // register-as-sync push triggered by the fallback grant.
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(2)
        .mount(&upstream)
        .await;

    let app = TestApp::spawn(UpstreamConfig {
        enabled: true,
        base_url: upstream.uri(),
        api_key: SecretString::new("test-key".to_string()),
        ..UpstreamConfig::default()
    })
    .await;
    let client = Client::new();

    // The registration itself also hits /auth/register once.
    let response = client
        .post(format!("{}/auth/register", app.address))
        .json(&json!({
            "username": "frank",
            "password": "pw",
            "email": "frank@example.com"
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);

    let response = client
        .post(format!("{}/auth/login", app.address))
        .json(&json!({"username": "frank", "password": "pw"}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);

    app.cleanup().await;
}

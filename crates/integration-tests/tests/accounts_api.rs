//! HTTP tests for signup, verification, self-service, and health.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use chrono::{TimeDelta, Utc};
use serde_json::json;

use userhub_core::Email;
use userhub_integration_tests::{TestApp, basic, get, json_request, request};

// ============================================================================
// Signup
// ============================================================================

#[tokio::test]
async fn test_create_account_returns_projection() {
    let app = TestApp::new();
    let response = app.create_account("alice@example.com", "pw123").await;

    assert_eq!(response.status, StatusCode::CREATED);
    let body = response.json();
    assert_eq!(body["email"], "alice@example.com");
    assert_eq!(body["firstName"], "Alice");
    assert_eq!(body["lastName"], "Jones");
    assert_eq!(body["emailVerified"], false);
    assert!(body["id"].is_number());
    assert!(body["accountCreated"].is_string());
    assert_eq!(body["accountCreated"], body["accountUpdated"]);
    assert!(body.get("password").is_none());
    assert!(body.get("passwordHash").is_none());

    // The link goes to the publisher, never the caller.
    assert_eq!(app.publisher.messages().len(), 1);
    assert!(!response.body.is_empty());
    let token = app.publisher.last_token().unwrap();
    assert!(!String::from_utf8_lossy(&response.body).contains(&token));
}

#[tokio::test]
async fn test_create_account_validation() {
    let app = TestApp::new();

    let cases = [
        json!({"email": "not-an-email", "password": "pw", "firstName": "A", "lastName": "B"}),
        json!({"email": "a@example.com", "password": "", "firstName": "A", "lastName": "B"}),
        json!({"email": "a@example.com", "password": "pw", "firstName": " ", "lastName": "B"}),
        json!({"email": "a@example.com", "password": "pw", "firstName": "A"}),
        json!({"email": "a@example.com", "password": "pw", "firstName": "A", "lastName": "B", "emailVerified": true}),
    ];
    for body in cases {
        let response = app.post_user(&body).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "accepted {body}");
        assert_eq!(response.json()["error"], "validation_error");
    }
    assert!(app.accounts.is_empty());
}

#[tokio::test]
async fn test_duplicate_signup_is_rejected() {
    let app = TestApp::new();
    assert_eq!(
        app.create_account("alice@example.com", "pw").await.status,
        StatusCode::CREATED
    );

    let response = app.create_account("alice@example.com", "other").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "conflict");
    assert_eq!(app.accounts.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_signups_exactly_one_succeeds() {
    let app = std::sync::Arc::new(TestApp::new());

    let mut handles = Vec::new();
    for _ in 0..10 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            app.create_account("race@example.com", "pw").await.status
        }));
    }

    let mut created = 0;
    for handle in handles {
        let status = handle.await.unwrap();
        if status == StatusCode::CREATED {
            created += 1;
        } else {
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }
    assert_eq!(created, 1);
    assert_eq!(app.accounts.len(), 1);
}

// ============================================================================
// Verification
// ============================================================================

#[tokio::test]
async fn test_verify_link_flips_flag() {
    let app = TestApp::new();
    app.create_account("alice@example.com", "pw").await;

    let response = app.follow_last_link().await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["emailVerified"], true);

    // Following the link again is harmless.
    let again = app.follow_last_link().await;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(again.json()["emailVerified"], true);
}

#[tokio::test]
async fn test_expired_link_is_gone() {
    let app = TestApp::new();
    app.create_account("alice@example.com", "pw").await;

    let stale = app
        .tokens
        .issue_at(
            &Email::parse("alice@example.com").unwrap(),
            Utc::now() - TimeDelta::hours(25),
        )
        .unwrap();
    let response = app
        .send(get(&format!("/v1/user/verify?token={stale}"), None))
        .await;

    assert_eq!(response.status, StatusCode::GONE);
    assert_eq!(response.json()["error"], "expired");
}

#[tokio::test]
async fn test_tampered_or_missing_link_is_bad_request() {
    let app = TestApp::new();
    app.create_account("alice@example.com", "pw").await;
    let token = app.publisher.last_token().unwrap();

    let mut tampered = token.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'Q' } else { 'A' });

    for uri in [
        format!("/v1/user/verify?token={tampered}"),
        "/v1/user/verify?token=garbage".to_string(),
        "/v1/user/verify".to_string(),
    ] {
        let response = app.send(get(&uri, None)).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{uri}");
    }

    // Still unverified.
    let response = app
        .send(get("/v1/user/self", Some(&basic("alice@example.com", "pw"))))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

// ============================================================================
// Self get / update
// ============================================================================

#[tokio::test]
async fn test_self_requires_credentials() {
    let app = TestApp::new();
    app.create_verified("alice@example.com", "pw").await;

    let response = app.send(get("/v1/user/self", None)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(response.header("www-authenticate").unwrap().starts_with("Basic"));

    let response = app
        .send(get("/v1/user/self", Some(&basic("alice@example.com", "wrong"))))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app
        .send(get("/v1/user/self", Some(&basic("nobody@example.com", "pw"))))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unverified_account_is_forbidden() {
    let app = TestApp::new();
    app.create_account("alice@example.com", "pw").await;
    let auth = basic("alice@example.com", "pw");

    let response = app.send(get("/v1/user/self", Some(&auth))).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.json()["error"], "unverified");

    let response = app
        .send(json_request(
            Method::PUT,
            "/v1/user/self",
            Some(&auth),
            &json!({"firstName": "Al"}),
        ))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_alice_updates_last_name() {
    let app = TestApp::new();
    app.create_verified("alice@example.com", "pw123").await;
    let auth = basic("alice@example.com", "pw123");

    let response = app
        .send(json_request(
            Method::PUT,
            "/v1/user/self",
            Some(&auth),
            &json!({"lastName": "Smith"}),
        ))
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert!(response.body.is_empty());

    let response = app.send(get("/v1/user/self", Some(&auth))).await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["lastName"], "Smith");
    assert_eq!(body["firstName"], "Alice");
    assert_eq!(body["emailVerified"], true);

    let created: chrono::DateTime<Utc> = body["accountCreated"].as_str().unwrap().parse().unwrap();
    let updated: chrono::DateTime<Utc> = body["accountUpdated"].as_str().unwrap().parse().unwrap();
    assert!(updated > created);
}

#[tokio::test]
async fn test_update_rejects_disallowed_fields() {
    let app = TestApp::new();
    let before = app.create_verified("alice@example.com", "pw").await;
    let auth = basic("alice@example.com", "pw");

    for body in [
        json!({"email": "mallory@example.com"}),
        json!({"firstName": "Al", "email": "mallory@example.com"}),
        json!({"accountCreated": "2020-01-01T00:00:00Z"}),
        json!({"accountUpdated": "2020-01-01T00:00:00Z"}),
        json!({"id": 99}),
        json!({"nickname": "al"}),
    ] {
        let response = app
            .send(json_request(Method::PUT, "/v1/user/self", Some(&auth), &body))
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "accepted {body}");
    }

    let after = app.send(get("/v1/user/self", Some(&auth))).await.json();
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_update_password() {
    let app = TestApp::new();
    app.create_verified("alice@example.com", "old-pw").await;

    let response = app
        .send(json_request(
            Method::PUT,
            "/v1/user/self",
            Some(&basic("alice@example.com", "old-pw")),
            &json!({"password": "new-pw"}),
        ))
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let old = app
        .send(get("/v1/user/self", Some(&basic("alice@example.com", "old-pw"))))
        .await;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);
    let new = app
        .send(get("/v1/user/self", Some(&basic("alice@example.com", "new-pw"))))
        .await;
    assert_eq!(new.status, StatusCode::OK);
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_healthz() {
    let app = TestApp::new();

    let response = app.send(get("/healthz", None)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.is_empty());
    assert_eq!(
        response.header("cache-control"),
        Some("no-cache, no-store, must-revalidate")
    );
    assert!(response.header("x-request-id").is_some());

    let response = app.send(get("/healthz?verbose=1", None)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let with_body = Request::builder()
        .method(Method::GET)
        .uri("/healthz")
        .body(Body::from("ping"))
        .unwrap();
    assert_eq!(app.send(with_body).await.status, StatusCode::BAD_REQUEST);

    let response = app.send(request(Method::POST, "/healthz", None)).await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);

    app.accounts.set_unavailable(true);
    let response = app.send(get("/healthz", None)).await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.header("pragma"), Some("no-cache"));
}

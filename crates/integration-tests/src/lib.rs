//! Integration tests for userhub.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p userhub-integration-tests
//! ```
//!
//! The full router from `userhub_api::app` is driven in-process with
//! `tower::ServiceExt::oneshot`. Accounts and pictures live in the in-memory
//! repositories, blobs in an in-memory object store, and verification
//! messages are captured by a recording publisher. No database or network
//! is needed.
//!
//! # Test Categories
//!
//! - `accounts_api` - signup, verification, self get/update, health
//! - `pictures_api` - upload, get, delete, orphan reconciliation

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use chrono::TimeDelta;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;

use userhub_api::db::memory::{InMemoryAccountRepository, InMemoryPictureRepository};
use userhub_api::metrics::PrometheusMetrics;
use userhub_api::notify::memory::RecordingPublisher;
use userhub_api::services::{AccountService, PictureService, VerificationTokens};
use userhub_api::state::AppState;
use userhub_api::storage::ObjectStoreBlobs;

/// Signing key used by every test app.
pub const TOKEN_SECRET: &str = "k9$Qv2!mX7@pL4#zR8&nT1*wY5^bC3%d";

/// Picture ceiling used by every test app.
pub const MAX_PICTURE_BYTES: usize = 4096;

/// Smallest byte sequence that starts like a PNG.
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01";

const MULTIPART_BOUNDARY: &str = "userhub-test-boundary";

/// A router plus handles on every in-memory backend behind it.
pub struct TestApp {
    pub router: Router,
    pub accounts: Arc<InMemoryAccountRepository>,
    pub pictures: Arc<InMemoryPictureRepository>,
    pub blobs: Arc<ObjectStoreBlobs>,
    pub publisher: Arc<RecordingPublisher>,
    pub metrics: Arc<PrometheusMetrics>,
    pub tokens: VerificationTokens,
}

/// A buffered response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    /// Body parsed as JSON.
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|e| panic!("body is not JSON ({e}): {:?}", self.body))
    }

    /// Header value as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        let accounts = Arc::new(InMemoryAccountRepository::new());
        let pictures = Arc::new(InMemoryPictureRepository::new());
        let blobs = Arc::new(ObjectStoreBlobs::in_memory("https://pics.test"));
        let publisher = Arc::new(RecordingPublisher::new());
        let metrics = Arc::new(PrometheusMetrics::new().unwrap());
        let tokens = VerificationTokens::new(SecretString::from(TOKEN_SECRET), TimeDelta::hours(24));

        let account_service = AccountService::new(
            accounts.clone(),
            tokens.clone(),
            publisher.clone(),
            metrics.clone(),
            Url::parse("http://localhost:8080").unwrap(),
        );
        let picture_service = PictureService::new(
            account_service.clone(),
            pictures.clone(),
            blobs.clone(),
            metrics.clone(),
            MAX_PICTURE_BYTES,
        );
        let router = userhub_api::app(AppState::new(
            account_service,
            picture_service,
            metrics.clone(),
        ));

        Self {
            router,
            accounts,
            pictures,
            blobs,
            publisher,
            metrics,
            tokens,
        }
    }

    /// Send one request through the router.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// `POST /v1/user` with a raw JSON body.
    pub async fn post_user(&self, body: &Value) -> TestResponse {
        self.send(json_request(Method::POST, "/v1/user", None, body))
            .await
    }

    /// Create an account with default names.
    pub async fn create_account(&self, email: &str, password: &str) -> TestResponse {
        self.post_user(&json!({
            "email": email,
            "password": password,
            "firstName": "Alice",
            "lastName": "Jones",
        }))
        .await
    }

    /// Follow the most recently published verification link.
    pub async fn follow_last_link(&self) -> TestResponse {
        let token = self.publisher.last_token().expect("no link published");
        self.send(get(&format!("/v1/user/verify?token={token}"), None))
            .await
    }

    /// Create an account and verify it through the HTTP link.
    pub async fn create_verified(&self, email: &str, password: &str) -> Value {
        let created = self.create_account(email, password).await;
        assert_eq!(created.status, StatusCode::CREATED, "{:?}", created.body);
        let verified = self.follow_last_link().await;
        assert_eq!(verified.status, StatusCode::OK, "{:?}", verified.body);
        verified.json()
    }

    /// Upload `bytes` as the `file` part of a multipart form.
    pub async fn upload(
        &self,
        auth: &str,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> TestResponse {
        self.send(multipart_request(
            "/v1/user/self/pic",
            auth,
            "file",
            file_name,
            content_type,
            bytes,
        ))
        .await
    }
}

/// `Authorization` header value for HTTP Basic.
#[must_use]
pub fn basic(email: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{email}:{password}")))
}

/// Build a request with an optional `Authorization` header and no body.
#[must_use]
pub fn request(method: Method, uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::empty()).unwrap()
}

/// `GET` without a body.
#[must_use]
pub fn get(uri: &str, auth: Option<&str>) -> Request<Body> {
    request(Method::GET, uri, auth)
}

/// Build a JSON request.
#[must_use]
pub fn json_request(method: Method, uri: &str, auth: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Build a `multipart/form-data` POST carrying one file part.
#[must_use]
pub fn multipart_request(
    uri: &str,
    auth: &str,
    field: &str,
    file_name: &str,
    content_type: &str,
    bytes: &[u8],
) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{MULTIPART_BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, auth)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

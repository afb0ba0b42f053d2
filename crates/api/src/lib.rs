//! userhub API library.
//!
//! Account signup with email verification, Basic-authenticated self
//! service, and a single profile picture per account stored in an object
//! store with its metadata in `PostgreSQL`.
//!
//! The binary in `main.rs` wires real backends into [`app`]; tests wire the
//! in-memory ones (enabled by the `test-support` feature).

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;

use axum::{Router, http::Request, response::Response};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::state::AppState;

/// Build the full router with tracing, request IDs, and Sentry layers.
pub fn app(state: AppState) -> Router {
    let max_picture_bytes = state.pictures().max_bytes();

    Router::new()
        .merge(routes::routes(max_picture_bytes))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    // Path only: the query of a verification link is a token.
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id = tracing::field::Empty,
                        account_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &Response, latency: std::time::Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        body::Body,
        http::{StatusCode, header},
    };
    use base64::{Engine, engine::general_purpose::STANDARD};
    use chrono::TimeDelta;
    use secrecy::SecretString;
    use tower::ServiceExt;
    use tracing::Subscriber;
    use tracing::field::{Field, Visit};
    use tracing::span::{Id, Record};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use tracing_subscriber::registry::LookupSpan;
    use url::Url;

    use super::*;
    use crate::db::memory::{InMemoryAccountRepository, InMemoryPictureRepository};
    use crate::metrics::PrometheusMetrics;
    use crate::models::CreateAccountRequest;
    use crate::notify::memory::RecordingPublisher;
    use crate::services::{AccountService, PictureService, VerificationTokens};
    use crate::storage::ObjectStoreBlobs;

    /// Names of fields recorded on `http_request` spans after creation.
    #[derive(Clone, Default)]
    struct RecordedFields(Arc<Mutex<Vec<String>>>);

    struct FieldNames<'a>(&'a mut Vec<String>);

    impl Visit for FieldNames<'_> {
        fn record_debug(&mut self, field: &Field, _value: &dyn std::fmt::Debug) {
            self.0.push(field.name().to_string());
        }
    }

    impl<S> Layer<S> for RecordedFields
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_record(&self, span: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
            if ctx.span(span).is_some_and(|s| s.name() == "http_request") {
                let mut names = self.0.lock().unwrap();
                values.record(&mut FieldNames(&mut *names));
            }
        }
    }

    async fn state_with_verified(email: &str, password: &str) -> AppState {
        let metrics = Arc::new(PrometheusMetrics::new().unwrap());
        let accounts = AccountService::new(
            Arc::new(InMemoryAccountRepository::new()),
            VerificationTokens::new(
                SecretString::from("k9$Qv2!mX7@pL4#zR8&nT1*wY5^bC3%d"),
                TimeDelta::hours(24),
            ),
            Arc::new(RecordingPublisher::new()),
            metrics.clone(),
            Url::parse("http://localhost:8080").unwrap(),
        );
        let pictures = PictureService::new(
            accounts.clone(),
            Arc::new(InMemoryPictureRepository::new()),
            Arc::new(ObjectStoreBlobs::in_memory("https://pics.test")),
            metrics.clone(),
            1024,
        );

        let account = accounts
            .create_account(CreateAccountRequest {
                email: email.to_string(),
                password: password.to_string(),
                first_name: "Alice".to_string(),
                last_name: "Jones".to_string(),
            })
            .await
            .unwrap();
        accounts.verify_email(&account.email).await.unwrap();

        AppState::new(accounts, pictures, metrics)
    }

    #[tokio::test]
    async fn test_request_span_records_ids_and_outcome() {
        let recorded = RecordedFields::default();
        let _guard =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(recorded.clone()));

        let state = state_with_verified("alice@example.com", "pw123").await;
        let credentials = STANDARD.encode("alice@example.com:pw123");
        let response = app(state)
            .oneshot(
                Request::builder()
                    .uri("/v1/user/self")
                    .header(header::AUTHORIZATION, format!("Basic {credentials}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let names = recorded.0.lock().unwrap().clone();
        for field in ["request_id", "account_id", "status", "latency_ms"] {
            assert!(
                names.iter().any(|n| n == field),
                "{field} not recorded: {names:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_anonymous_request_span_has_no_account_id() {
        let recorded = RecordedFields::default();
        let _guard =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(recorded.clone()));

        let state = state_with_verified("alice@example.com", "pw123").await;
        let response = app(state)
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let names = recorded.0.lock().unwrap().clone();
        assert!(names.iter().any(|n| n == "request_id"));
        assert!(!names.iter().any(|n| n == "account_id"));
    }
}

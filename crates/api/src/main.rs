//! userhub API server.
//!
//! # Architecture
//!
//! - Axum web framework, JSON API with HTTP Basic authentication
//! - `PostgreSQL` for accounts and picture metadata
//! - S3-compatible object store for picture blobs
//! - Verification links delivered by SMTP, webhook, or log only

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use chrono::TimeDelta;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use userhub_api::config::ApiConfig;
use userhub_api::db::{self, PgAccountRepository, PgPictureRepository};
use userhub_api::metrics::PrometheusMetrics;
use userhub_api::notify::publisher_from_config;
use userhub_api::services::{AccountService, PictureService, VerificationTokens};
use userhub_api::state::AppState;
use userhub_api::storage::ObjectStoreBlobs;

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ApiConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = ApiConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "userhub_api=info,tower_http=debug".into());

    let json_layer = config
        .log_json
        .then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!config.log_json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p userhub-cli -- migrate

    let blobs = ObjectStoreBlobs::from_config(&config.storage)
        .expect("Failed to configure picture storage");
    tracing::info!(
        bucket = %config.storage.bucket,
        backend = ?config.storage.backend,
        "Picture storage configured"
    );

    let publisher = publisher_from_config(&config.notifications, config.tokens.ttl_hours)
        .expect("Failed to configure verification publisher");

    let tokens = VerificationTokens::new(
        config.tokens.secret.clone(),
        TimeDelta::hours(config.tokens.ttl_hours),
    );
    let metrics =
        Arc::new(PrometheusMetrics::new().expect("Failed to register operation counters"));

    let accounts = AccountService::new(
        Arc::new(PgAccountRepository::new(pool.clone())),
        tokens,
        publisher,
        metrics.clone(),
        config.base_url.clone(),
    );
    let pictures = PictureService::new(
        accounts.clone(),
        Arc::new(PgPictureRepository::new(pool)),
        Arc::new(blobs),
        metrics.clone(),
        config.storage.max_picture_bytes,
    );

    let app = userhub_api::app(AppState::new(accounts, pictures, metrics));

    let addr = config.socket_addr();
    tracing::info!("userhub-api listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod importer;
pub mod mapper;
pub mod models;
pub mod orchestrator;
pub mod provider;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod worker;

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use sqlx::PgPool;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::mirror::PgMirrorStore;
use crate::db::sync_queue::{BackoffPolicy, PgSyncQueueStore};
use crate::mapper::ProductMapper;
use crate::provider::client::ProviderClient;
use crate::rate_limit::ProviderGate;
use crate::state::{AppState, SharedState};

pub fn build_state(pool: PgPool, config: Config) -> SharedState {
    let gate = Arc::new(ProviderGate::new(config.call_spacing));
    let provider = Arc::new(ProviderClient::new(gate, config.encryption_key.clone()));
    let queue = Arc::new(PgSyncQueueStore::new(
        pool.clone(),
        BackoffPolicy {
            base: config.backoff_base,
            max: config.backoff_max,
        },
    ));
    let mirror = Arc::new(PgMirrorStore::new(pool.clone()));
    let mapper = Arc::new(ProductMapper::new(pool.clone()));

    Arc::new(AppState {
        pool,
        config,
        queue,
        mirror,
        provider,
        mapper,
    })
}

pub fn build_app(state: SharedState) -> Router {
    Router::new()
        .merge(routes::api_routes())
        .merge(routes::webhook_routes())
        .route("/health", axum::routing::get(health))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

pub mod queue;
pub mod sync;
pub mod webhook;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Queue monitoring
        .route("/api/v1/queue/stats", get(queue::stats))
        .route("/api/v1/queue/items", get(queue::list_items))
        .route("/api/v1/queue/retry/{id}", post(queue::retry))
        .route("/api/v1/queue/{id}", delete(queue::delete))
        // Full sync
        .route("/api/v1/sync/full/{integration_id}", post(sync::full_sync))
}

pub fn webhook_routes() -> Router<SharedState> {
    Router::new().route("/v1/webhook/{integration_id}", post(webhook::ingest))
}

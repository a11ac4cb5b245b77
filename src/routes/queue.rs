use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::AdminAuth;
use crate::error::AppError;
use crate::models::queue_item::{status, QueueStats};
use crate::models::QueueItem;
use crate::state::SharedState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

pub async fn stats(
    _auth: AdminAuth,
    State(state): State<SharedState>,
) -> Result<Json<QueueStats>, AppError> {
    Ok(Json(state.queue.stats().await?))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_items(
    _auth: AdminAuth,
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Some(s) = query.status.as_deref() {
        if !status::is_valid(s) {
            return Err(AppError::BadRequest(format!("unknown status '{s}'")));
        }
    }
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let items = state.queue.list(query.status.as_deref(), limit).await?;
    Ok(Json(json!({ "items": items })))
}

pub async fn retry(
    _auth: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<QueueItem>, AppError> {
    let item = state.queue.retry(id).await?;
    tracing::info!(item = %item.id, "Queue item requeued by operator");
    Ok(Json(item))
}

pub async fn delete(
    _auth: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.queue.delete_pending(id).await?;
    tracing::info!(item = %id, "Pending queue item deleted by operator");
    Ok(StatusCode::NO_CONTENT)
}

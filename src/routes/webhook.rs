use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use crate::auth;
use crate::db;
use crate::error::AppError;
use crate::models::WebhookEvent;
use crate::orchestrator::{self, OrchestrationError};
use crate::state::SharedState;

/// Inbound ERP events. Authenticated by the integration's own webhook
/// token; the orchestrator decides what (if anything) to enqueue.
pub async fn ingest(
    State(state): State<SharedState>,
    Path(integration_id): Path<Uuid>,
    headers: HeaderMap,
    Json(event): Json<WebhookEvent>,
) -> Result<Response, AppError> {
    let integration = db::integrations::find_by_id(&state.pool, integration_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Integration not found".to_string()))?;

    let token = auth::bearer_token(&headers)
        .ok_or_else(|| AppError::Unauthorized("Missing webhook token".to_string()))?;
    if !auth::constant_time_eq(token.as_bytes(), integration.webhook_token.as_bytes()) {
        return Err(AppError::Unauthorized("Invalid webhook token".to_string()));
    }
    if !integration.is_active {
        return Err(AppError::Forbidden("Integration is deactivated".to_string()));
    }

    let items = orchestrator::handle_event(
        state.queue.as_ref(),
        state.mirror.as_ref(),
        state.mapper.as_ref(),
        &integration,
        &event,
    )
    .await
    .map_err(|e| match e {
        OrchestrationError::Validation(msg) => AppError::Validation(msg),
        OrchestrationError::Store(err) => err.into(),
    })?;

    if items.is_empty() {
        tracing::debug!(integration = %integration.id, kind = ?event.event_type, "Webhook resolved to no-op");
        return Ok((StatusCode::OK, Json(json!({ "status": "noop" }))).into_response());
    }

    let ids: Vec<Uuid> = items.iter().map(|item| item.id).collect();
    tracing::info!(
        integration = %integration.id,
        kind = ?event.event_type,
        count = ids.len(),
        "Webhook enqueued sync work"
    );
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "queued", "itemIds": ids })),
    )
        .into_response())
}

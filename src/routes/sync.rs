use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::auth::AdminAuth;
use crate::db;
use crate::error::AppError;
use crate::importer::{self, SyncReport};
use crate::state::SharedState;

/// Operator-triggered full mirror of the provider ledger. Runs inline
/// and answers with the aggregate report, partial counts included on
/// abort.
pub async fn full_sync(
    _auth: AdminAuth,
    State(state): State<SharedState>,
    Path(integration_id): Path<Uuid>,
) -> Result<Json<SyncReport>, AppError> {
    let integration = db::integrations::find_by_id(&state.pool, integration_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Integration not found".to_string()))?;
    if !integration.is_active {
        return Err(AppError::Forbidden("Integration is deactivated".to_string()));
    }

    let report = importer::run_full_sync(
        state.mirror.as_ref(),
        state.provider.as_ref(),
        &integration,
        state.config.batch_size,
    )
    .await;

    if report.success {
        db::integrations::touch_last_sync(&state.pool, integration.id).await?;
    }

    Ok(Json(report))
}

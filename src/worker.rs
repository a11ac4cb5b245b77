use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::db::{self, MirrorStore, SyncQueueStore};
use crate::models::mirror::mirror_status;
use crate::models::queue_item::{
    CancelContractPayload, CreateClientPayload, CreateContractPayload, QueueItem, SyncAction,
    UpdateClientPayload,
};
use crate::models::{Integration, MirrorClient, MirrorContract};
use crate::provider::{ProviderApi, ProviderError};
use crate::state::SharedState;

/// Backstop over the provider client's own 30s call timeout; an item can
/// make two provider calls (lookup + create).
const ITEM_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Default, Clone, Copy)]
pub struct RunStats {
    pub processed: usize,
    pub failed: usize,
}

/// Start the queue processor as a cancellable periodic task.
pub fn spawn(state: SharedState, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(state, shutdown))
}

async fn run(state: SharedState, mut shutdown: watch::Receiver<bool>) {
    let mut tick = tokio::time::interval(state.config.poll_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        interval_secs = state.config.poll_interval.as_secs(),
        "Queue processor started"
    );

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let stats = run_once(&state).await;
                if stats.processed > 0 || stats.failed > 0 {
                    tracing::info!(
                        processed = stats.processed,
                        failed = stats.failed,
                        "Queue run finished"
                    );
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tracing::info!("Queue processor stopped");
}

/// One full pass over all active integrations. Infrastructure failures
/// are logged and skip the run; the loop never dies over them.
pub async fn run_once(state: &SharedState) -> RunStats {
    let integrations = match db::integrations::list_active(&state.pool).await {
        Ok(list) => list,
        Err(e) => {
            tracing::error!("Failed to list active integrations, skipping run: {e}");
            return RunStats::default();
        }
    };

    let mut totals = RunStats::default();
    for integration in &integrations {
        let stats = process_integration(
            state.queue.as_ref(),
            state.mirror.as_ref(),
            state.provider.as_ref(),
            integration,
            state.config.batch_size,
        )
        .await;
        totals.processed += stats.processed;
        totals.failed += stats.failed;
    }
    totals
}

/// Claim and work one batch for a single integration. Items run
/// sequentially in claim order; FIFO within an integration is a
/// correctness requirement, not just fairness.
pub async fn process_integration(
    queue: &dyn SyncQueueStore,
    mirror: &dyn MirrorStore,
    provider: &dyn ProviderApi,
    integration: &Integration,
    batch_size: i64,
) -> RunStats {
    let items = match queue.claim_batch(integration.id, batch_size).await {
        Ok(items) => items,
        Err(e) => {
            tracing::error!(integration = %integration.id, "Failed to claim batch: {e}");
            return RunStats::default();
        }
    };

    let mut stats = RunStats::default();
    for item in items {
        let outcome = match tokio::time::timeout(
            ITEM_TIMEOUT,
            execute_item(mirror, provider, integration, &item),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(ItemError::Transient(format!(
                "item timed out after {}s",
                ITEM_TIMEOUT.as_secs()
            ))),
        };

        match outcome {
            Ok(()) => {
                if let Err(e) = queue.mark_success(item.id).await {
                    tracing::error!(item = %item.id, "Failed to record success: {e}");
                }
                tracing::debug!(item = %item.id, action = %item.action, "Queue item succeeded");
                stats.processed += 1;
            }
            Err(ItemError::Transient(msg)) => {
                tracing::warn!(
                    item = %item.id,
                    action = %item.action,
                    attempt = item.attempts + 1,
                    "Queue item failed (will retry): {msg}"
                );
                if let Err(e) = queue.mark_failure(&item, &msg).await {
                    tracing::error!(item = %item.id, "Failed to record failure: {e}");
                }
                stats.failed += 1;
            }
            Err(ItemError::Permanent(msg)) => {
                tracing::warn!(
                    item = %item.id,
                    action = %item.action,
                    "Queue item failed permanently: {msg}"
                );
                if let Err(e) = queue.mark_failed_permanent(item.id, &msg).await {
                    tracing::error!(item = %item.id, "Failed to record failure: {e}");
                }
                stats.failed += 1;
            }
        }
    }
    stats
}

enum ItemError {
    Transient(String),
    Permanent(String),
}

impl From<ProviderError> for ItemError {
    fn from(err: ProviderError) -> Self {
        match err {
            // Auth failures retry: an operator can fix the credentials
            // and the item should then go through.
            ProviderError::Transient(_) | ProviderError::Auth(_) => {
                ItemError::Transient(err.to_string())
            }
            ProviderError::Permanent(msg) => ItemError::Permanent(msg),
        }
    }
}

async fn execute_item(
    mirror: &dyn MirrorStore,
    provider: &dyn ProviderApi,
    integration: &Integration,
    item: &QueueItem,
) -> Result<(), ItemError> {
    let action = item
        .action()
        .ok_or_else(|| ItemError::Permanent(format!("unknown action '{}'", item.action)))?;

    match action {
        SyncAction::CreateClient => {
            let payload: CreateClientPayload = decode(item)?;
            let provider_id = provider.create_client(integration, &payload).await?;
            let row = MirrorClient {
                integration_id: integration.id,
                provider_id,
                name: payload.name,
                document: payload.document,
                email: payload.email,
                phone: payload.phone,
                status: mirror_status::ATIVO.to_string(),
                synced_at: Utc::now(),
            };
            if let Err(e) = mirror.upsert_client(&row).await {
                tracing::warn!(item = %item.id, "Mirror update after create_client failed: {e}");
            }
        }
        SyncAction::UpdateClient => {
            let payload: UpdateClientPayload = decode(item)?;
            provider.update_client(integration, &payload).await?;
            if payload.reactivate {
                if let Err(e) = mirror
                    .set_client_status(
                        integration.id,
                        payload.client_provider_id,
                        mirror_status::ATIVO,
                    )
                    .await
                {
                    tracing::warn!(item = %item.id, "Mirror update after reactivation failed: {e}");
                }
            }
        }
        SyncAction::CreateContract => {
            let payload: CreateContractPayload = decode(item)?;
            let client = provider
                .find_client_by_document(integration, &payload.document)
                .await?
                .ok_or_else(|| {
                    ItemError::Permanent(format!(
                        "provider has no client with document {}",
                        payload.document
                    ))
                })?;
            let contract_id = provider
                .create_contract(integration, client.id, &payload)
                .await?;
            let row = MirrorContract {
                integration_id: integration.id,
                provider_id: contract_id,
                client_provider_id: client.id,
                plan_id: payload.plan_id,
                amount: None,
                status: mirror_status::ATIVO.to_string(),
                synced_at: Utc::now(),
            };
            if let Err(e) = mirror.upsert_contract(&row).await {
                tracing::warn!(item = %item.id, "Mirror update after create_contract failed: {e}");
            }
        }
        SyncAction::CancelContract => {
            let payload: CancelContractPayload = decode(item)?;
            provider
                .cancel_contract(integration, payload.contract_provider_id)
                .await?;
            if let Err(e) = mirror
                .set_contract_status(
                    integration.id,
                    payload.contract_provider_id,
                    mirror_status::CANCELADO,
                )
                .await
            {
                tracing::warn!(item = %item.id, "Mirror update after cancel_contract failed: {e}");
            }
        }
    }

    Ok(())
}

fn decode<T: serde::de::DeserializeOwned>(item: &QueueItem) -> Result<T, ItemError> {
    serde_json::from_value(item.payload.clone())
        .map_err(|e| ItemError::Permanent(format!("invalid payload: {e}")))
}

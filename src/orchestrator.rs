use serde::Serialize;
use uuid::Uuid;

use crate::db::{MirrorStore, StoreError, SyncQueueStore};
use crate::mapper::PlanResolver;
use crate::models::queue_item::{
    CancelContractPayload, CreateClientPayload, CreateContractPayload, SyncAction,
    UpdateClientPayload,
};
use crate::models::webhook::WebhookEventType;
use crate::models::{Integration, MirrorClient, MirrorContract, QueueItem, WebhookEvent};

#[derive(Debug)]
pub enum OrchestrationError {
    /// Rejected before anything is enqueued; surfaced to the caller.
    Validation(String),
    Store(StoreError),
}

impl std::fmt::Display for OrchestrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrchestrationError::Validation(msg) => write!(f, "validation error: {msg}"),
            OrchestrationError::Store(err) => write!(f, "{err}"),
        }
    }
}

impl From<StoreError> for OrchestrationError {
    fn from(err: StoreError) -> Self {
        OrchestrationError::Store(err)
    }
}

/// Current mirrored state relevant to one event, read before deciding.
#[derive(Debug, Default)]
pub struct MirrorSnapshot {
    pub client: Option<MirrorClient>,
    pub active_contract: Option<MirrorContract>,
}

/// One queue item to be: an action plus its frozen payload.
#[derive(Debug)]
pub struct PlannedItem {
    pub action: SyncAction,
    pub payload: serde_json::Value,
}

/// Map an ERP event onto zero or more queue items, based on the mirrored
/// state. Pure decision logic; `plan_id` is the already-resolved provider
/// plan for the event's product code (None when unmapped or absent).
///
/// | event              | client          | active contract | emitted                        |
/// |--------------------|-----------------|-----------------|--------------------------------|
/// | client.created     | none            | —               | create_client, create_contract |
/// | client.created     | inactive        | none            | update_client, create_contract |
/// | client.created     | active          | —               | (duplicate delivery, no-op)    |
/// | contract.updated   | present         | present         | update_client                  |
/// | contract.updated   | present         | none            | (no-op)                        |
/// | contract.updated   | none            | —               | validation error               |
/// | contract.cancelled | present         | present         | cancel_contract                |
/// | contract.cancelled | otherwise       |                 | (already cancelled, no-op)     |
pub fn decide(
    event: &WebhookEvent,
    plan_id: Option<i64>,
    snapshot: &MirrorSnapshot,
) -> Result<Vec<PlannedItem>, OrchestrationError> {
    match event.event_type {
        WebhookEventType::ClientCreated => match &snapshot.client {
            None => {
                let plan_id = require_plan(event, plan_id)?;
                Ok(vec![
                    planned(
                        SyncAction::CreateClient,
                        &CreateClientPayload {
                            name: event.client.name.clone(),
                            document: event.client.document.clone(),
                            email: event.client.email.clone(),
                            phone: event.client.phone.clone(),
                            plan_id,
                        },
                    ),
                    planned(
                        SyncAction::CreateContract,
                        &CreateContractPayload {
                            document: event.client.document.clone(),
                            plan_id,
                        },
                    ),
                ])
            }
            Some(client) if !client.is_active() && snapshot.active_contract.is_none() => {
                let plan_id = require_plan(event, plan_id)?;
                Ok(vec![
                    planned(
                        SyncAction::UpdateClient,
                        &UpdateClientPayload {
                            client_provider_id: client.provider_id,
                            name: event.client.name.clone(),
                            email: event.client.email.clone(),
                            phone: event.client.phone.clone(),
                            reactivate: true,
                        },
                    ),
                    planned(
                        SyncAction::CreateContract,
                        &CreateContractPayload {
                            document: event.client.document.clone(),
                            plan_id,
                        },
                    ),
                ])
            }
            // Already known and active: duplicate delivery.
            Some(_) => Ok(vec![]),
        },
        WebhookEventType::ContractUpdated => match &snapshot.client {
            None => Err(OrchestrationError::Validation(format!(
                "contract update for unknown client (document {})",
                event.client.document
            ))),
            Some(client) => {
                if snapshot.active_contract.is_some() {
                    Ok(vec![planned(
                        SyncAction::UpdateClient,
                        &UpdateClientPayload {
                            client_provider_id: client.provider_id,
                            name: event.client.name.clone(),
                            email: event.client.email.clone(),
                            phone: event.client.phone.clone(),
                            reactivate: false,
                        },
                    )])
                } else {
                    Ok(vec![])
                }
            }
        },
        WebhookEventType::ContractCancelled => {
            match (&snapshot.client, &snapshot.active_contract) {
                (Some(_), Some(contract)) => Ok(vec![planned(
                    SyncAction::CancelContract,
                    &CancelContractPayload {
                        contract_provider_id: contract.provider_id,
                    },
                )]),
                // No active contract to cancel: replaying the event is a no-op.
                _ => Ok(vec![]),
            }
        }
    }
}

/// Full inbound path: read the mirror, resolve the plan, decide, enqueue.
/// Returns the created queue items (empty for a no-op decision).
pub async fn handle_event(
    queue: &dyn SyncQueueStore,
    mirror: &dyn MirrorStore,
    plans: &dyn PlanResolver,
    integration: &Integration,
    event: &WebhookEvent,
) -> Result<Vec<QueueItem>, OrchestrationError> {
    let snapshot = read_snapshot(mirror, integration.id, &event.client.document).await?;

    let plan_id = match &event.contract {
        Some(contract) => {
            plans
                .resolve(integration.id, &contract.product_code)
                .await?
        }
        None => None,
    };

    let items = decide(event, plan_id, &snapshot)?;

    let mut created = Vec::with_capacity(items.len());
    for item in items {
        created.push(queue.enqueue(integration.id, item.action, item.payload).await?);
    }
    Ok(created)
}

async fn read_snapshot(
    mirror: &dyn MirrorStore,
    integration_id: Uuid,
    document: &str,
) -> Result<MirrorSnapshot, StoreError> {
    let client = mirror
        .find_client_by_document(integration_id, document)
        .await?;
    let active_contract = match &client {
        Some(client) => {
            mirror
                .find_active_contract(integration_id, client.provider_id)
                .await?
        }
        None => None,
    };
    Ok(MirrorSnapshot {
        client,
        active_contract,
    })
}

fn require_plan(event: &WebhookEvent, plan_id: Option<i64>) -> Result<i64, OrchestrationError> {
    let code = event
        .contract
        .as_ref()
        .map(|c| c.product_code.as_str())
        .ok_or_else(|| {
            OrchestrationError::Validation("event carries no contract data".to_string())
        })?;
    plan_id.ok_or_else(|| {
        OrchestrationError::Validation(format!(
            "no provider plan mapped for product code '{code}'"
        ))
    })
}

fn planned<T: Serialize>(action: SyncAction, payload: &T) -> PlannedItem {
    PlannedItem {
        action,
        payload: serde_json::to_value(payload).expect("payload serialization cannot fail"),
    }
}

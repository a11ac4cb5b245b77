pub mod integrations;
pub mod mirror;
pub mod sync_queue;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::queue_item::{QueueItem, QueueStats, SyncAction};
use crate::models::{MirrorClient, MirrorContract, MirrorInvoice};

#[derive(Debug)]
pub enum StoreError {
    NotFound(String),
    Conflict(String),
    Database(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(msg) => write!(f, "not found: {msg}"),
            StoreError::Conflict(msg) => write!(f, "conflict: {msg}"),
            StoreError::Database(msg) => write!(f, "database error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Durable FIFO-with-retry store of pending provider work.
///
/// Every state transition is an atomic conditional write; callers never
/// read-modify-write a row. The Postgres implementation lives in
/// `sync_queue`; tests provide an in-memory one.
#[async_trait]
pub trait SyncQueueStore: Send + Sync {
    async fn enqueue(
        &self,
        integration_id: Uuid,
        action: SyncAction,
        payload: serde_json::Value,
    ) -> Result<QueueItem, StoreError>;

    /// Atomically claim up to `limit` due pending items for one
    /// integration, oldest first, transitioning them to processing.
    async fn claim_batch(
        &self,
        integration_id: Uuid,
        limit: i64,
    ) -> Result<Vec<QueueItem>, StoreError>;

    async fn mark_success(&self, id: Uuid) -> Result<(), StoreError>;

    /// Record a transient failure on a claimed item: bump the attempt
    /// counter and either reschedule with backoff or finalize as failed.
    async fn mark_failure(&self, item: &QueueItem, error: &str) -> Result<(), StoreError>;

    /// Finalize as failed immediately, bypassing the remaining retry
    /// budget. Used for permanent/business errors.
    async fn mark_failed_permanent(&self, id: Uuid, error: &str) -> Result<(), StoreError>;

    /// Operator-triggered: reset a failed item to pending with a fresh
    /// attempt budget.
    async fn retry(&self, id: Uuid) -> Result<QueueItem, StoreError>;

    /// Remove a pending item. In-flight and completed work stays for the
    /// audit trail.
    async fn delete_pending(&self, id: Uuid) -> Result<(), StoreError>;

    async fn stats(&self) -> Result<QueueStats, StoreError>;

    async fn list(&self, status: Option<&str>, limit: i64) -> Result<Vec<QueueItem>, StoreError>;
}

/// Local mirror of the provider ledger. Written wholesale by the bulk
/// importer, advisory reads by the orchestrator, optimistic upserts by
/// the queue processor after confirmed provider successes.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    async fn find_client_by_document(
        &self,
        integration_id: Uuid,
        document: &str,
    ) -> Result<Option<MirrorClient>, StoreError>;

    async fn find_active_contract(
        &self,
        integration_id: Uuid,
        client_provider_id: i64,
    ) -> Result<Option<MirrorContract>, StoreError>;

    async fn upsert_client(&self, client: &MirrorClient) -> Result<(), StoreError>;

    async fn upsert_contract(&self, contract: &MirrorContract) -> Result<(), StoreError>;

    async fn upsert_invoice(&self, invoice: &MirrorInvoice) -> Result<(), StoreError>;

    async fn set_client_status(
        &self,
        integration_id: Uuid,
        provider_id: i64,
        status: &str,
    ) -> Result<(), StoreError>;

    async fn set_contract_status(
        &self,
        integration_id: Uuid,
        provider_id: i64,
        status: &str,
    ) -> Result<(), StoreError>;
}

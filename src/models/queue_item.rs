use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Item statuses as stored in `sync_queue.status`.
pub mod status {
    pub const PENDING: &str = "pending";
    pub const PROCESSING: &str = "processing";
    pub const SUCCESS: &str = "success";
    pub const FAILED: &str = "failed";

    pub fn is_valid(s: &str) -> bool {
        matches!(s, PENDING | PROCESSING | SUCCESS | FAILED)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    CreateClient,
    UpdateClient,
    CreateContract,
    CancelContract,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::CreateClient => "create_client",
            SyncAction::UpdateClient => "update_client",
            SyncAction::CreateContract => "create_contract",
            SyncAction::CancelContract => "cancel_contract",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create_client" => Some(SyncAction::CreateClient),
            "update_client" => Some(SyncAction::UpdateClient),
            "create_contract" => Some(SyncAction::CreateContract),
            "cancel_contract" => Some(SyncAction::CancelContract),
            _ => None,
        }
    }

    /// Retry budget, fixed per action type.
    pub fn max_attempts(&self) -> i32 {
        5
    }
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: Uuid,
    pub integration_id: Uuid,
    pub action: String,
    /// Immutable snapshot captured at enqueue time; later mutations to
    /// source data do not change in-flight work.
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,
    pub scheduled_for: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn action(&self) -> Option<SyncAction> {
        SyncAction::parse(&self.action)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub pending: i64,
    pub processing: i64,
    pub success: i64,
    pub failed: i64,
    pub recent_activity: RecentActivity,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivity {
    pub last_processed: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failed: Option<DateTime<Utc>>,
}

// Payload snapshots, one per action. Serialized into `sync_queue.payload`.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClientPayload {
    pub name: String,
    pub document: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub plan_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateClientPayload {
    pub client_provider_id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Set when an inactive client regains a contract; the provider-side
    /// update flips the client back to active.
    pub reactivate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateContractPayload {
    /// Contract creation resolves the provider client id by document at
    /// execution time; FIFO order guarantees the preceding create_client
    /// has already run.
    pub document: String,
    pub plan_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelContractPayload {
    pub contract_provider_id: i64,
}

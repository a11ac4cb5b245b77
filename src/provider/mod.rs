pub mod client;
pub mod types;

use async_trait::async_trait;

use crate::models::queue_item::{CreateClientPayload, CreateContractPayload, UpdateClientPayload};
use crate::models::Integration;
use types::{Pagina, ProviderCliente};

/// Outcome classification for provider calls, driving the retry policy:
/// transient failures go back through the queue with backoff, permanent
/// ones burn no further attempts, auth failures abort bulk imports.
#[derive(Debug, Clone)]
pub enum ProviderError {
    /// Network trouble, timeouts, 5xx, exhausted rate-limit retries.
    Transient(String),
    /// Provider-reported business errors ("documento já cadastrado") and
    /// other responses a retry cannot change.
    Permanent(String),
    /// Rejected credentials. Nothing succeeds until an operator fixes
    /// the integration.
    Auth(String),
}

impl ProviderError {
    pub fn message(&self) -> &str {
        match self {
            ProviderError::Transient(msg)
            | ProviderError::Permanent(msg)
            | ProviderError::Auth(msg) => msg,
        }
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::Transient(msg) => write!(f, "transient provider error: {msg}"),
            ProviderError::Permanent(msg) => write!(f, "permanent provider error: {msg}"),
            ProviderError::Auth(msg) => write!(f, "provider authentication error: {msg}"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Every outbound call to the provider's REST API. Implementations own
/// credential decryption, per-integration call spacing, and response
/// normalization; callers only see the classified result.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// Create a client account, returning the provider-assigned id.
    async fn create_client(
        &self,
        integration: &Integration,
        payload: &CreateClientPayload,
    ) -> Result<i64, ProviderError>;

    async fn update_client(
        &self,
        integration: &Integration,
        payload: &UpdateClientPayload,
    ) -> Result<(), ProviderError>;

    async fn find_client_by_document(
        &self,
        integration: &Integration,
        document: &str,
    ) -> Result<Option<ProviderCliente>, ProviderError>;

    /// Create a contract for an existing provider client, returning the
    /// provider-assigned contract id.
    async fn create_contract(
        &self,
        integration: &Integration,
        client_id: i64,
        payload: &CreateContractPayload,
    ) -> Result<i64, ProviderError>;

    async fn cancel_contract(
        &self,
        integration: &Integration,
        contract_id: i64,
    ) -> Result<(), ProviderError>;

    // Paginated listings for the bulk importer. Records come back as raw
    // JSON so one malformed record cannot poison a whole page.

    async fn list_clients(
        &self,
        integration: &Integration,
        page: i64,
        per_page: i64,
    ) -> Result<Pagina, ProviderError>;

    async fn list_contracts(
        &self,
        integration: &Integration,
        page: i64,
        per_page: i64,
    ) -> Result<Pagina, ProviderError>;

    async fn list_invoices(
        &self,
        integration: &Integration,
        page: i64,
        per_page: i64,
    ) -> Result<Pagina, ProviderError>;
}

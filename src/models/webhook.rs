use serde::{Deserialize, Serialize};

/// Inbound ERP event. The HTTP layer has already authenticated the
/// integration and rejected malformed JSON by the time this reaches the
/// orchestrator.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub event_type: WebhookEventType,
    pub client: WebhookClient,
    pub contract: Option<WebhookContract>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookEventType {
    #[serde(rename = "client.created")]
    ClientCreated,
    #[serde(rename = "contract.updated")]
    ContractUpdated,
    #[serde(rename = "contract.cancelled")]
    ContractCancelled,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookClient {
    pub name: String,
    /// CPF/CNPJ, the provider-side natural key.
    pub document: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookContract {
    /// ERP-side plan code, resolved through the product mapper.
    pub product_code: String,
}

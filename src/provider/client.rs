use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::crypto;
use crate::models::queue_item::{CreateClientPayload, CreateContractPayload, UpdateClientPayload};
use crate::models::Integration;
use crate::rate_limit::ProviderGate;

use super::types::{Pagina, ProviderCliente, ProviderEnvelope};
use super::{ProviderApi, ProviderError};

const CALL_TIMEOUT: Duration = Duration::from_secs(30);
const RATE_LIMIT_RETRIES: u32 = 2;
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// HTTP client for the provider's panel API. All calls are POSTs with a
/// JSON body carrying `{keyapi, login, pass}`; credentials are decrypted
/// per call and never cached.
pub struct ProviderClient {
    http: reqwest::Client,
    gate: Arc<ProviderGate>,
    encryption_key: String,
}

impl ProviderClient {
    pub fn new(gate: Arc<ProviderGate>, encryption_key: String) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(CALL_TIMEOUT)
                .build()
                .expect("Failed to build reqwest client"),
            gate,
            encryption_key,
        }
    }

    fn credentials(&self, integration: &Integration) -> Result<(String, String), ProviderError> {
        let keyapi = crypto::decrypt(&integration.keyapi, &self.encryption_key)
            .map_err(|e| ProviderError::Auth(format!("cannot decrypt keyapi: {e}")))?;
        let pass = crypto::decrypt(&integration.password, &self.encryption_key)
            .map_err(|e| ProviderError::Auth(format!("cannot decrypt password: {e}")))?;
        Ok((keyapi, pass))
    }

    /// Execute one provider call: gate, send, honor Retry-After on 429 a
    /// bounded number of times, then normalize the envelope.
    async fn call(
        &self,
        integration: &Integration,
        path: &str,
        mut body: Value,
    ) -> Result<Value, ProviderError> {
        let (keyapi, pass) = self.credentials(integration)?;
        if let Some(obj) = body.as_object_mut() {
            obj.insert("keyapi".into(), Value::String(keyapi));
            obj.insert("login".into(), Value::String(integration.login.clone()));
            obj.insert("pass".into(), Value::String(pass));
        }

        let url = format!("{}/{}", integration.base_url.trim_end_matches('/'), path);

        let mut attempt = 0u32;
        loop {
            self.gate.acquire(integration.id).await;

            let resp = match self.http.post(&url).json(&body).send().await {
                Ok(resp) => resp,
                Err(e) if e.is_timeout() => {
                    return Err(ProviderError::Transient(format!(
                        "provider call to {path} timed out: {e}"
                    )));
                }
                Err(e) => {
                    return Err(ProviderError::Transient(format!(
                        "provider call to {path} failed: {e}"
                    )));
                }
            };

            let status = resp.status();

            if status.as_u16() == 429 {
                if attempt >= RATE_LIMIT_RETRIES {
                    return Err(ProviderError::Transient(
                        "provider rate limit persisted after retries".to_string(),
                    ));
                }
                let wait = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_RETRY_AFTER);
                tracing::debug!(path, wait_secs = wait.as_secs(), "Provider rate limited, backing off");
                tokio::time::sleep(wait).await;
                attempt += 1;
                continue;
            }

            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(ProviderError::Auth(format!(
                    "provider rejected credentials ({status})"
                )));
            }
            if status.is_server_error() {
                return Err(ProviderError::Transient(format!(
                    "provider returned {status} for {path}"
                )));
            }
            if !status.is_success() {
                return Err(ProviderError::Permanent(format!(
                    "provider returned {status} for {path}"
                )));
            }

            let envelope: ProviderEnvelope = resp.json().await.map_err(|e| {
                ProviderError::Transient(format!("unreadable provider response for {path}: {e}"))
            })?;

            if !envelope.success {
                let msg = envelope
                    .msg
                    .unwrap_or_else(|| "provider rejected the request".to_string());
                return Err(if is_auth_message(&msg) {
                    ProviderError::Auth(msg)
                } else {
                    ProviderError::Permanent(msg)
                });
            }

            return Ok(envelope.data.unwrap_or(Value::Null));
        }
    }

    fn parse_page(&self, data: Value, path: &str) -> Result<Pagina, ProviderError> {
        serde_json::from_value(data).map_err(|e| {
            ProviderError::Transient(format!("malformed listing page from {path}: {e}"))
        })
    }
}

/// Some panels report bad credentials inside a 200 envelope instead of a
/// 401. Match the usual wordings so those still classify as auth errors.
fn is_auth_message(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    ["login", "senha", "keyapi", "autentic", "credencia"]
        .iter()
        .any(|needle| lower.contains(needle))
}

#[async_trait]
impl ProviderApi for ProviderClient {
    async fn create_client(
        &self,
        integration: &Integration,
        payload: &CreateClientPayload,
    ) -> Result<i64, ProviderError> {
        let data = self
            .call(
                integration,
                "api/cliente/criar",
                json!({
                    "nome": payload.name,
                    "cpf_cnpj": payload.document,
                    "email": payload.email,
                    "telefone": payload.phone,
                    "plano_id": payload.plan_id,
                }),
            )
            .await?;

        data.get("cliente_id").and_then(Value::as_i64).ok_or_else(|| {
            ProviderError::Permanent("provider response missing cliente_id".to_string())
        })
    }

    async fn update_client(
        &self,
        integration: &Integration,
        payload: &UpdateClientPayload,
    ) -> Result<(), ProviderError> {
        let mut body = json!({
            "cliente_id": payload.client_provider_id,
            "nome": payload.name,
            "email": payload.email,
            "telefone": payload.phone,
        });
        if payload.reactivate {
            body["status"] = Value::String("ativo".to_string());
        }
        self.call(integration, "api/cliente/atualizar", body).await?;
        Ok(())
    }

    async fn find_client_by_document(
        &self,
        integration: &Integration,
        document: &str,
    ) -> Result<Option<ProviderCliente>, ProviderError> {
        let data = self
            .call(
                integration,
                "api/cliente/buscar",
                json!({ "cpf_cnpj": document }),
            )
            .await?;

        if data.is_null() {
            return Ok(None);
        }
        serde_json::from_value(data)
            .map(Some)
            .map_err(|e| ProviderError::Permanent(format!("malformed cliente record: {e}")))
    }

    async fn create_contract(
        &self,
        integration: &Integration,
        client_id: i64,
        payload: &CreateContractPayload,
    ) -> Result<i64, ProviderError> {
        let data = self
            .call(
                integration,
                "api/contrato/criar",
                json!({
                    "cliente_id": client_id,
                    "plano_id": payload.plan_id,
                }),
            )
            .await?;

        data.get("contrato_id").and_then(Value::as_i64).ok_or_else(|| {
            ProviderError::Permanent("provider response missing contrato_id".to_string())
        })
    }

    async fn cancel_contract(
        &self,
        integration: &Integration,
        contract_id: i64,
    ) -> Result<(), ProviderError> {
        self.call(
            integration,
            "api/contrato/cancelar",
            json!({ "contrato_id": contract_id }),
        )
        .await?;
        Ok(())
    }

    async fn list_clients(
        &self,
        integration: &Integration,
        page: i64,
        per_page: i64,
    ) -> Result<Pagina, ProviderError> {
        let data = self
            .call(
                integration,
                "api/cliente/listar",
                json!({ "pagina": page, "por_pagina": per_page }),
            )
            .await?;
        self.parse_page(data, "api/cliente/listar")
    }

    async fn list_contracts(
        &self,
        integration: &Integration,
        page: i64,
        per_page: i64,
    ) -> Result<Pagina, ProviderError> {
        let data = self
            .call(
                integration,
                "api/contrato/listar",
                json!({ "pagina": page, "por_pagina": per_page }),
            )
            .await?;
        self.parse_page(data, "api/contrato/listar")
    }

    async fn list_invoices(
        &self,
        integration: &Integration,
        page: i64,
        per_page: i64,
    ) -> Result<Pagina, ProviderError> {
        let data = self
            .call(
                integration,
                "api/boleto/listar",
                json!({ "pagina": page, "por_pagina": per_page }),
            )
            .await?;
        self.parse_page(data, "api/boleto/listar")
    }
}

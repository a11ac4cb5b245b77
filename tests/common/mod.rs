#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use uuid::Uuid;

use iptvsync::db::sync_queue::BackoffPolicy;
use iptvsync::db::{MirrorStore, StoreError, SyncQueueStore};
use iptvsync::mapper::PlanResolver;
use iptvsync::models::queue_item::{status, QueueItem, QueueStats, RecentActivity, SyncAction};
use iptvsync::models::{Integration, MirrorClient, MirrorContract, MirrorInvoice};
use iptvsync::provider::types::{Pagina, ProviderCliente};
use iptvsync::provider::{ProviderApi, ProviderError};

pub fn integration() -> Integration {
    let now = Utc::now();
    Integration {
        id: Uuid::now_v7(),
        name: "Provedor Teste".to_string(),
        is_active: true,
        base_url: "https://painel.example.com".to_string(),
        login: "revenda".to_string(),
        keyapi: vec![],
        password: vec![],
        webhook_token: "tok-webhook".to_string(),
        last_sync_at: None,
        created_at: now,
        updated_at: now,
    }
}

// ── In-memory queue store ───────────────────────────────────────

/// Mirrors the Postgres store's transition semantics for tests that
/// need no database: conditional status updates, FIFO claims, backoff.
pub struct MemorySyncQueueStore {
    inner: Mutex<QueueInner>,
    backoff: BackoffPolicy,
    epoch: DateTime<Utc>,
}

struct QueueInner {
    items: Vec<QueueItem>,
    seq: i64,
}

impl MemorySyncQueueStore {
    pub fn new() -> Self {
        Self::with_backoff(BackoffPolicy {
            base: std::time::Duration::from_secs(60),
            max: std::time::Duration::from_secs(3600),
        })
    }

    pub fn with_backoff(backoff: BackoffPolicy) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                items: Vec::new(),
                seq: 0,
            }),
            backoff,
            // Backdated so freshly enqueued items are immediately due.
            epoch: Utc::now() - ChronoDuration::hours(1),
        }
    }

    pub fn get(&self, id: Uuid) -> Option<QueueItem> {
        self.inner
            .lock()
            .unwrap()
            .items
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    pub fn all(&self) -> Vec<QueueItem> {
        self.inner.lock().unwrap().items.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }

    /// Pull a rescheduled item's `scheduled_for` back into the past, as
    /// if its backoff had elapsed.
    pub fn make_due(&self, id: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(item) = inner.items.iter_mut().find(|item| item.id == id) {
            item.scheduled_for = Utc::now() - ChronoDuration::seconds(1);
        }
    }
}

#[async_trait]
impl SyncQueueStore for MemorySyncQueueStore {
    async fn enqueue(
        &self,
        integration_id: Uuid,
        action: SyncAction,
        payload: serde_json::Value,
    ) -> Result<QueueItem, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.seq += 1;
        let created_at = self.epoch + ChronoDuration::milliseconds(inner.seq);
        let item = QueueItem {
            id: Uuid::now_v7(),
            integration_id,
            action: action.as_str().to_string(),
            payload,
            status: status::PENDING.to_string(),
            attempts: 0,
            max_attempts: action.max_attempts(),
            last_error: None,
            scheduled_for: created_at,
            created_at,
            updated_at: created_at,
        };
        inner.items.push(item.clone());
        Ok(item)
    }

    async fn claim_batch(
        &self,
        integration_id: Uuid,
        limit: i64,
    ) -> Result<Vec<QueueItem>, StoreError> {
        let now = Utc::now();
        let mut inner = self.inner.lock().unwrap();

        let mut due: Vec<usize> = inner
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| {
                item.integration_id == integration_id
                    && item.status == status::PENDING
                    && item.scheduled_for <= now
            })
            .map(|(idx, _)| idx)
            .collect();
        due.sort_by_key(|&idx| (inner.items[idx].created_at, inner.items[idx].id));
        due.truncate(limit.max(0) as usize);

        let mut claimed = Vec::with_capacity(due.len());
        for idx in due {
            let item = &mut inner.items[idx];
            item.status = status::PROCESSING.to_string();
            item.updated_at = now;
            claimed.push(item.clone());
        }
        Ok(claimed)
    }

    async fn mark_success(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(item) = inner
            .items
            .iter_mut()
            .find(|item| item.id == id && item.status == status::PROCESSING)
        {
            item.status = status::SUCCESS.to_string();
            item.last_error = None;
            item.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_failure(&self, claimed: &QueueItem, error: &str) -> Result<(), StoreError> {
        let attempts = claimed.attempts + 1;
        let backoff = self.backoff.delay(attempts);
        let mut inner = self.inner.lock().unwrap();
        if let Some(item) = inner
            .items
            .iter_mut()
            .find(|item| item.id == claimed.id && item.status == status::PROCESSING)
        {
            item.attempts = attempts;
            item.last_error = Some(error.to_string());
            item.updated_at = Utc::now();
            if attempts >= item.max_attempts {
                item.status = status::FAILED.to_string();
            } else {
                item.status = status::PENDING.to_string();
                item.scheduled_for = Utc::now()
                    + ChronoDuration::from_std(backoff).unwrap_or(ChronoDuration::hours(1));
            }
        }
        Ok(())
    }

    async fn mark_failed_permanent(&self, id: Uuid, error: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(item) = inner
            .items
            .iter_mut()
            .find(|item| item.id == id && item.status == status::PROCESSING)
        {
            item.status = status::FAILED.to_string();
            item.attempts = item.max_attempts;
            item.last_error = Some(error.to_string());
            item.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn retry(&self, id: Uuid) -> Result<QueueItem, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let item = inner
            .items
            .iter_mut()
            .find(|item| item.id == id && item.status == status::FAILED)
            .ok_or_else(|| StoreError::NotFound(format!("failed queue item {id} not found")))?;
        item.status = status::PENDING.to_string();
        item.attempts = 0;
        item.scheduled_for = Utc::now() - ChronoDuration::seconds(1);
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn delete_pending(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.items.len();
        inner
            .items
            .retain(|item| !(item.id == id && item.status == status::PENDING));
        if inner.items.len() == before {
            return Err(StoreError::Conflict(format!(
                "queue item {id} is not pending (only pending items can be deleted)"
            )));
        }
        Ok(())
    }

    async fn stats(&self) -> Result<QueueStats, StoreError> {
        let inner = self.inner.lock().unwrap();
        let count = |s: &str| inner.items.iter().filter(|item| item.status == s).count() as i64;
        let latest = |pred: &dyn Fn(&QueueItem) -> bool| {
            inner
                .items
                .iter()
                .filter(|item| pred(item))
                .map(|item| item.updated_at)
                .max()
        };
        Ok(QueueStats {
            pending: count(status::PENDING),
            processing: count(status::PROCESSING),
            success: count(status::SUCCESS),
            failed: count(status::FAILED),
            recent_activity: RecentActivity {
                last_processed: latest(&|item| {
                    item.status == status::SUCCESS || item.status == status::FAILED
                }),
                last_success: latest(&|item| item.status == status::SUCCESS),
                last_failed: latest(&|item| item.status == status::FAILED),
            },
        })
    }

    async fn list(&self, by_status: Option<&str>, limit: i64) -> Result<Vec<QueueItem>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut items: Vec<QueueItem> = inner
            .items
            .iter()
            .filter(|item| by_status.is_none_or(|s| item.status == s))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items.truncate(limit.max(0) as usize);
        Ok(items)
    }
}

// ── In-memory mirror store ──────────────────────────────────────

#[derive(Default)]
pub struct MemoryMirrorStore {
    inner: Mutex<MirrorInner>,
}

#[derive(Default)]
struct MirrorInner {
    clients: Vec<MirrorClient>,
    contracts: Vec<MirrorContract>,
    invoices: Vec<MirrorInvoice>,
}

impl MemoryMirrorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clients(&self) -> Vec<MirrorClient> {
        self.inner.lock().unwrap().clients.clone()
    }

    pub fn contracts(&self) -> Vec<MirrorContract> {
        self.inner.lock().unwrap().contracts.clone()
    }

    pub fn invoices(&self) -> Vec<MirrorInvoice> {
        self.inner.lock().unwrap().invoices.clone()
    }

    pub fn seed_client(&self, client: MirrorClient) {
        self.inner.lock().unwrap().clients.push(client);
    }

    pub fn seed_contract(&self, contract: MirrorContract) {
        self.inner.lock().unwrap().contracts.push(contract);
    }
}

#[async_trait]
impl MirrorStore for MemoryMirrorStore {
    async fn find_client_by_document(
        &self,
        integration_id: Uuid,
        document: &str,
    ) -> Result<Option<MirrorClient>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .clients
            .iter()
            .find(|c| c.integration_id == integration_id && c.document == document)
            .cloned())
    }

    async fn find_active_contract(
        &self,
        integration_id: Uuid,
        client_provider_id: i64,
    ) -> Result<Option<MirrorContract>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .contracts
            .iter()
            .filter(|c| {
                c.integration_id == integration_id
                    && c.client_provider_id == client_provider_id
                    && c.status == "ativo"
            })
            .max_by_key(|c| c.provider_id)
            .cloned())
    }

    async fn upsert_client(&self, client: &MirrorClient) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.clients.iter_mut().find(|c| {
            c.integration_id == client.integration_id && c.provider_id == client.provider_id
        }) {
            Some(existing) => *existing = client.clone(),
            None => inner.clients.push(client.clone()),
        }
        Ok(())
    }

    async fn upsert_contract(&self, contract: &MirrorContract) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.contracts.iter_mut().find(|c| {
            c.integration_id == contract.integration_id && c.provider_id == contract.provider_id
        }) {
            Some(existing) => *existing = contract.clone(),
            None => inner.contracts.push(contract.clone()),
        }
        Ok(())
    }

    async fn upsert_invoice(&self, invoice: &MirrorInvoice) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.invoices.iter_mut().find(|i| {
            i.integration_id == invoice.integration_id && i.provider_id == invoice.provider_id
        }) {
            Some(existing) => *existing = invoice.clone(),
            None => inner.invoices.push(invoice.clone()),
        }
        Ok(())
    }

    async fn set_client_status(
        &self,
        integration_id: Uuid,
        provider_id: i64,
        new_status: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(client) = inner
            .clients
            .iter_mut()
            .find(|c| c.integration_id == integration_id && c.provider_id == provider_id)
        {
            client.status = new_status.to_string();
        }
        Ok(())
    }

    async fn set_contract_status(
        &self,
        integration_id: Uuid,
        provider_id: i64,
        new_status: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(contract) = inner
            .contracts
            .iter_mut()
            .find(|c| c.integration_id == integration_id && c.provider_id == provider_id)
        {
            contract.status = new_status.to_string();
        }
        Ok(())
    }
}

// ── Scriptable provider ─────────────────────────────────────────

/// Provider double: each call pops the next scripted result for its
/// method and records itself in `calls`. Listing methods fall back to an
/// empty page so pagination terminates; everything else panics when
/// unscripted.
#[derive(Default)]
pub struct MockProvider {
    pub calls: Mutex<Vec<String>>,
    create_client: Mutex<VecDeque<Result<i64, ProviderError>>>,
    update_client: Mutex<VecDeque<Result<(), ProviderError>>>,
    find_client: Mutex<VecDeque<Result<Option<ProviderCliente>, ProviderError>>>,
    create_contract: Mutex<VecDeque<Result<i64, ProviderError>>>,
    cancel_contract: Mutex<VecDeque<Result<(), ProviderError>>>,
    client_pages: Mutex<VecDeque<Result<Pagina, ProviderError>>>,
    contract_pages: Mutex<VecDeque<Result<Pagina, ProviderError>>>,
    invoice_pages: Mutex<VecDeque<Result<Pagina, ProviderError>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn script_create_client(&self, result: Result<i64, ProviderError>) {
        self.create_client.lock().unwrap().push_back(result);
    }

    pub fn script_update_client(&self, result: Result<(), ProviderError>) {
        self.update_client.lock().unwrap().push_back(result);
    }

    pub fn script_find_client(&self, result: Result<Option<ProviderCliente>, ProviderError>) {
        self.find_client.lock().unwrap().push_back(result);
    }

    pub fn script_create_contract(&self, result: Result<i64, ProviderError>) {
        self.create_contract.lock().unwrap().push_back(result);
    }

    pub fn script_cancel_contract(&self, result: Result<(), ProviderError>) {
        self.cancel_contract.lock().unwrap().push_back(result);
    }

    pub fn script_client_page(&self, result: Result<Pagina, ProviderError>) {
        self.client_pages.lock().unwrap().push_back(result);
    }

    pub fn script_contract_page(&self, result: Result<Pagina, ProviderError>) {
        self.contract_pages.lock().unwrap().push_back(result);
    }

    pub fn script_invoice_page(&self, result: Result<Pagina, ProviderError>) {
        self.invoice_pages.lock().unwrap().push_back(result);
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn next<T>(queue: &Mutex<VecDeque<T>>, method: &str) -> T {
        queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted result for {method}"))
    }

    fn next_page(queue: &Mutex<VecDeque<Result<Pagina, ProviderError>>>) -> Result<Pagina, ProviderError> {
        queue.lock().unwrap().pop_front().unwrap_or_else(|| Ok(empty_page()))
    }
}

pub fn pagina(itens: Vec<serde_json::Value>, page: i64, total: i64) -> Pagina {
    Pagina {
        itens,
        pagina: page,
        total_paginas: total,
    }
}

pub fn empty_page() -> Pagina {
    pagina(vec![], 1, 1)
}

pub fn cliente_record(id: i64, document: &str) -> ProviderCliente {
    ProviderCliente {
        id,
        nome: format!("Cliente {id}"),
        cpf_cnpj: document.to_string(),
        email: None,
        telefone: None,
        status: Some("ativo".to_string()),
    }
}

#[async_trait]
impl ProviderApi for MockProvider {
    async fn create_client(
        &self,
        _integration: &Integration,
        payload: &iptvsync::models::queue_item::CreateClientPayload,
    ) -> Result<i64, ProviderError> {
        self.log(format!("create_client:{}", payload.document));
        Self::next(&self.create_client, "create_client")
    }

    async fn update_client(
        &self,
        _integration: &Integration,
        payload: &iptvsync::models::queue_item::UpdateClientPayload,
    ) -> Result<(), ProviderError> {
        self.log(format!("update_client:{}", payload.client_provider_id));
        Self::next(&self.update_client, "update_client")
    }

    async fn find_client_by_document(
        &self,
        _integration: &Integration,
        document: &str,
    ) -> Result<Option<ProviderCliente>, ProviderError> {
        self.log(format!("find_client:{document}"));
        Self::next(&self.find_client, "find_client_by_document")
    }

    async fn create_contract(
        &self,
        _integration: &Integration,
        client_id: i64,
        payload: &iptvsync::models::queue_item::CreateContractPayload,
    ) -> Result<i64, ProviderError> {
        self.log(format!("create_contract:{client_id}:{}", payload.plan_id));
        Self::next(&self.create_contract, "create_contract")
    }

    async fn cancel_contract(
        &self,
        _integration: &Integration,
        contract_id: i64,
    ) -> Result<(), ProviderError> {
        self.log(format!("cancel_contract:{contract_id}"));
        Self::next(&self.cancel_contract, "cancel_contract")
    }

    async fn list_clients(
        &self,
        _integration: &Integration,
        page: i64,
        _per_page: i64,
    ) -> Result<Pagina, ProviderError> {
        self.log(format!("list_clients:{page}"));
        Self::next_page(&self.client_pages)
    }

    async fn list_contracts(
        &self,
        _integration: &Integration,
        page: i64,
        _per_page: i64,
    ) -> Result<Pagina, ProviderError> {
        self.log(format!("list_contracts:{page}"));
        Self::next_page(&self.contract_pages)
    }

    async fn list_invoices(
        &self,
        _integration: &Integration,
        page: i64,
        _per_page: i64,
    ) -> Result<Pagina, ProviderError> {
        self.log(format!("list_invoices:{page}"));
        Self::next_page(&self.invoice_pages)
    }
}

// ── Plan resolution double ──────────────────────────────────────

pub struct StaticPlans(pub HashMap<String, i64>);

impl StaticPlans {
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    pub fn single(code: &str, plan_id: i64) -> Self {
        let mut map = HashMap::new();
        map.insert(code.to_string(), plan_id);
        Self(map)
    }
}

#[async_trait]
impl PlanResolver for StaticPlans {
    async fn resolve(&self, _integration_id: Uuid, code: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.0.get(code).copied())
    }
}

// ── Mirror row builders ─────────────────────────────────────────

pub fn mirror_client(integration_id: Uuid, provider_id: i64, document: &str, status: &str) -> MirrorClient {
    MirrorClient {
        integration_id,
        provider_id,
        name: format!("Cliente {provider_id}"),
        document: document.to_string(),
        email: None,
        phone: None,
        status: status.to_string(),
        synced_at: Utc::now(),
    }
}

pub fn mirror_contract(
    integration_id: Uuid,
    provider_id: i64,
    client_provider_id: i64,
    status: &str,
) -> MirrorContract {
    MirrorContract {
        integration_id,
        provider_id,
        client_provider_id,
        plan_id: 9,
        amount: None,
        status: status.to_string(),
        synced_at: Utc::now(),
    }
}

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::db::{self, MirrorStore};
use crate::models::{Integration, MirrorClient, MirrorContract, MirrorInvoice};
use crate::provider::types::{
    normalize_status, ProviderBoleto, ProviderCliente, ProviderContrato,
};
use crate::provider::{ProviderApi, ProviderError};
use crate::state::SharedState;

/// Phases of one full-sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Clientes,
    Contratos,
    Boletos,
    Done,
    Error,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Clientes => "clientes",
            SyncPhase::Contratos => "contratos",
            SyncPhase::Boletos => "boletos",
            SyncPhase::Done => "done",
            SyncPhase::Error => "error",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityReport {
    pub synced: usize,
    pub failed: usize,
}

#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResults {
    pub clientes: EntityReport,
    pub contratos: EntityReport,
    pub boletos: EntityReport,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub success: bool,
    pub total_synced: usize,
    pub total_failed: usize,
    /// Milliseconds.
    pub duration: u64,
    pub results: SyncResults,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Credential failure aborts the run; everything after it would fail the
/// same way. Partial progress is kept.
struct AuthAbort {
    partial: EntityReport,
    message: String,
}

/// Mirror the provider's full ledger into local storage. Record-level
/// failures are logged and skipped; a dead listing ends that entity's
/// pagination but the run continues; only an auth failure aborts.
pub async fn run_full_sync(
    mirror: &dyn MirrorStore,
    provider: &dyn ProviderApi,
    integration: &Integration,
    page_size: i64,
) -> SyncReport {
    let started = tokio::time::Instant::now();
    let mut results = SyncResults::default();

    tracing::info!(integration = %integration.id, "Full sync started");

    tracing::debug!(integration = %integration.id, phase = SyncPhase::Clientes.as_str(), "Sync phase started");
    match sync_clientes(mirror, provider, integration, page_size).await {
        Ok(report) => results.clientes = report,
        Err(abort) => {
            results.clientes = abort.partial;
            return finalize(integration, results, SyncPhase::Error, Some(abort.message), started);
        }
    }

    tracing::debug!(integration = %integration.id, phase = SyncPhase::Contratos.as_str(), "Sync phase started");
    match sync_contratos(mirror, provider, integration, page_size).await {
        Ok(report) => results.contratos = report,
        Err(abort) => {
            results.contratos = abort.partial;
            return finalize(integration, results, SyncPhase::Error, Some(abort.message), started);
        }
    }

    tracing::debug!(integration = %integration.id, phase = SyncPhase::Boletos.as_str(), "Sync phase started");
    match sync_boletos(mirror, provider, integration, page_size).await {
        Ok(report) => results.boletos = report,
        Err(abort) => {
            results.boletos = abort.partial;
            return finalize(integration, results, SyncPhase::Error, Some(abort.message), started);
        }
    }

    finalize(integration, results, SyncPhase::Done, None, started)
}

fn finalize(
    integration: &Integration,
    results: SyncResults,
    phase: SyncPhase,
    error: Option<String>,
    started: tokio::time::Instant,
) -> SyncReport {
    let total_synced =
        results.clientes.synced + results.contratos.synced + results.boletos.synced;
    let total_failed =
        results.clientes.failed + results.contratos.failed + results.boletos.failed;
    let duration = started.elapsed().as_millis() as u64;

    match &error {
        None => tracing::info!(
            integration = %integration.id,
            synced = total_synced,
            failed = total_failed,
            duration_ms = duration,
            "Full sync finished"
        ),
        Some(msg) => tracing::error!(
            integration = %integration.id,
            synced = total_synced,
            failed = total_failed,
            "Full sync aborted: {msg}"
        ),
    }

    SyncReport {
        success: phase == SyncPhase::Done,
        total_synced,
        total_failed,
        duration,
        results,
        error,
    }
}

async fn sync_clientes(
    mirror: &dyn MirrorStore,
    provider: &dyn ProviderApi,
    integration: &Integration,
    page_size: i64,
) -> Result<EntityReport, AuthAbort> {
    let mut report = EntityReport::default();
    let mut page = 1;
    loop {
        let pagina = match provider.list_clients(integration, page, page_size).await {
            Ok(pagina) => pagina,
            Err(e) => return listing_failure(report, "clientes", page, e),
        };
        if pagina.itens.is_empty() {
            break;
        }
        for raw in &pagina.itens {
            match cliente_row(integration.id, raw) {
                Ok(row) => match mirror.upsert_client(&row).await {
                    Ok(()) => report.synced += 1,
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!(integration = %integration.id, "Failed to store cliente: {e}");
                    }
                },
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(integration = %integration.id, "Skipping cliente record: {e}");
                }
            }
        }
        if page >= pagina.total_paginas {
            break;
        }
        page += 1;
    }
    Ok(report)
}

async fn sync_contratos(
    mirror: &dyn MirrorStore,
    provider: &dyn ProviderApi,
    integration: &Integration,
    page_size: i64,
) -> Result<EntityReport, AuthAbort> {
    let mut report = EntityReport::default();
    let mut page = 1;
    loop {
        let pagina = match provider.list_contracts(integration, page, page_size).await {
            Ok(pagina) => pagina,
            Err(e) => return listing_failure(report, "contratos", page, e),
        };
        if pagina.itens.is_empty() {
            break;
        }
        for raw in &pagina.itens {
            match contrato_row(integration.id, raw) {
                Ok(row) => match mirror.upsert_contract(&row).await {
                    Ok(()) => report.synced += 1,
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!(integration = %integration.id, "Failed to store contrato: {e}");
                    }
                },
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(integration = %integration.id, "Skipping contrato record: {e}");
                }
            }
        }
        if page >= pagina.total_paginas {
            break;
        }
        page += 1;
    }
    Ok(report)
}

async fn sync_boletos(
    mirror: &dyn MirrorStore,
    provider: &dyn ProviderApi,
    integration: &Integration,
    page_size: i64,
) -> Result<EntityReport, AuthAbort> {
    let mut report = EntityReport::default();
    let mut page = 1;
    loop {
        let pagina = match provider.list_invoices(integration, page, page_size).await {
            Ok(pagina) => pagina,
            Err(e) => return listing_failure(report, "boletos", page, e),
        };
        if pagina.itens.is_empty() {
            break;
        }
        for raw in &pagina.itens {
            match boleto_row(integration.id, raw) {
                Ok(row) => match mirror.upsert_invoice(&row).await {
                    Ok(()) => report.synced += 1,
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!(integration = %integration.id, "Failed to store boleto: {e}");
                    }
                },
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(integration = %integration.id, "Skipping boleto record: {e}");
                }
            }
        }
        if page >= pagina.total_paginas {
            break;
        }
        page += 1;
    }
    Ok(report)
}

fn listing_failure(
    partial: EntityReport,
    entity: &str,
    page: i64,
    err: ProviderError,
) -> Result<EntityReport, AuthAbort> {
    match err {
        ProviderError::Auth(msg) => Err(AuthAbort {
            partial,
            message: msg,
        }),
        other => {
            tracing::warn!(entity, page, "Listing failed, ending pagination: {other}");
            Ok(partial)
        }
    }
}

fn cliente_row(integration_id: Uuid, raw: &serde_json::Value) -> Result<MirrorClient, String> {
    let record: ProviderCliente = serde_json::from_value(raw.clone())
        .map_err(|e| format!("malformed cliente record: {e}"))?;
    Ok(MirrorClient {
        integration_id,
        provider_id: record.id,
        name: record.nome,
        document: record.cpf_cnpj,
        email: record.email,
        phone: record.telefone,
        status: normalize_status(record.status.as_deref()).to_string(),
        synced_at: chrono::Utc::now(),
    })
}

fn contrato_row(integration_id: Uuid, raw: &serde_json::Value) -> Result<MirrorContract, String> {
    let record: ProviderContrato = serde_json::from_value(raw.clone())
        .map_err(|e| format!("malformed contrato record: {e}"))?;
    Ok(MirrorContract {
        integration_id,
        provider_id: record.id,
        client_provider_id: record.cliente_id,
        plan_id: record.plano_id,
        amount: record.valor,
        status: normalize_status(record.status.as_deref()).to_string(),
        synced_at: chrono::Utc::now(),
    })
}

fn boleto_row(integration_id: Uuid, raw: &serde_json::Value) -> Result<MirrorInvoice, String> {
    let record: ProviderBoleto = serde_json::from_value(raw.clone())
        .map_err(|e| format!("malformed boleto record: {e}"))?;
    Ok(MirrorInvoice {
        integration_id,
        provider_id: record.id,
        contract_provider_id: record.contrato_id,
        amount: record.valor,
        due_date: record.vencimento,
        paid_at: record.pago_em,
        status: normalize_status(record.status.as_deref()).to_string(),
        synced_at: chrono::Utc::now(),
    })
}

/// Periodic full-sync driver, active only when
/// `IPTVSYNC_FULL_SYNC_INTERVAL_SECS` is configured. The operator
/// endpoint triggers runs on demand either way.
pub fn spawn_scheduler(
    state: SharedState,
    shutdown: watch::Receiver<bool>,
) -> Option<tokio::task::JoinHandle<()>> {
    let interval = state.config.full_sync_interval?;
    Some(tokio::spawn(run_scheduler(state, shutdown, interval)))
}

async fn run_scheduler(
    state: SharedState,
    mut shutdown: watch::Receiver<bool>,
    interval: std::time::Duration,
) {
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it so startup stays quiet.
    tick.tick().await;

    tracing::info!(interval_secs = interval.as_secs(), "Full-sync scheduler started");

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let integrations = match db::integrations::list_active(&state.pool).await {
                    Ok(list) => list,
                    Err(e) => {
                        tracing::error!("Failed to list integrations for scheduled sync: {e}");
                        continue;
                    }
                };
                for integration in &integrations {
                    let report = run_full_sync(
                        state.mirror.as_ref(),
                        state.provider.as_ref(),
                        integration,
                        state.config.batch_size,
                    )
                    .await;
                    if report.success {
                        if let Err(e) =
                            db::integrations::touch_last_sync(&state.pool, integration.id).await
                        {
                            tracing::error!(integration = %integration.id, "Failed to record last sync: {e}");
                        }
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tracing::info!("Full-sync scheduler stopped");
}

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{MirrorStore, StoreError};
use crate::models::mirror::mirror_status;
use crate::models::{MirrorClient, MirrorContract, MirrorInvoice};

pub struct PgMirrorStore {
    pool: PgPool,
}

impl PgMirrorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MirrorStore for PgMirrorStore {
    async fn find_client_by_document(
        &self,
        integration_id: Uuid,
        document: &str,
    ) -> Result<Option<MirrorClient>, StoreError> {
        let client = sqlx::query_as::<_, MirrorClient>(
            "SELECT * FROM mirror_clients WHERE integration_id = $1 AND document = $2",
        )
        .bind(integration_id)
        .bind(document)
        .fetch_optional(&self.pool)
        .await?;
        Ok(client)
    }

    async fn find_active_contract(
        &self,
        integration_id: Uuid,
        client_provider_id: i64,
    ) -> Result<Option<MirrorContract>, StoreError> {
        let contract = sqlx::query_as::<_, MirrorContract>(
            "SELECT * FROM mirror_contracts
             WHERE integration_id = $1 AND client_provider_id = $2 AND status = $3
             ORDER BY provider_id DESC
             LIMIT 1",
        )
        .bind(integration_id)
        .bind(client_provider_id)
        .bind(mirror_status::ATIVO)
        .fetch_optional(&self.pool)
        .await?;
        Ok(contract)
    }

    async fn upsert_client(&self, client: &MirrorClient) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO mirror_clients
                 (integration_id, provider_id, name, document, email, phone, status, synced_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, now())
             ON CONFLICT (integration_id, provider_id) DO UPDATE
             SET name = EXCLUDED.name, document = EXCLUDED.document,
                 email = EXCLUDED.email, phone = EXCLUDED.phone,
                 status = EXCLUDED.status, synced_at = now()",
        )
        .bind(client.integration_id)
        .bind(client.provider_id)
        .bind(&client.name)
        .bind(&client.document)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_contract(&self, contract: &MirrorContract) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO mirror_contracts
                 (integration_id, provider_id, client_provider_id, plan_id, amount, status, synced_at)
             VALUES ($1, $2, $3, $4, $5, $6, now())
             ON CONFLICT (integration_id, provider_id) DO UPDATE
             SET client_provider_id = EXCLUDED.client_provider_id,
                 plan_id = EXCLUDED.plan_id, amount = EXCLUDED.amount,
                 status = EXCLUDED.status, synced_at = now()",
        )
        .bind(contract.integration_id)
        .bind(contract.provider_id)
        .bind(contract.client_provider_id)
        .bind(contract.plan_id)
        .bind(contract.amount)
        .bind(&contract.status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_invoice(&self, invoice: &MirrorInvoice) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO mirror_invoices
                 (integration_id, provider_id, contract_provider_id, amount, due_date, paid_at, status, synced_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, now())
             ON CONFLICT (integration_id, provider_id) DO UPDATE
             SET contract_provider_id = EXCLUDED.contract_provider_id,
                 amount = EXCLUDED.amount, due_date = EXCLUDED.due_date,
                 paid_at = EXCLUDED.paid_at, status = EXCLUDED.status, synced_at = now()",
        )
        .bind(invoice.integration_id)
        .bind(invoice.provider_id)
        .bind(invoice.contract_provider_id)
        .bind(invoice.amount)
        .bind(invoice.due_date)
        .bind(invoice.paid_at)
        .bind(&invoice.status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_client_status(
        &self,
        integration_id: Uuid,
        provider_id: i64,
        status: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE mirror_clients SET status = $3, synced_at = now()
             WHERE integration_id = $1 AND provider_id = $2",
        )
        .bind(integration_id)
        .bind(provider_id)
        .bind(status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_contract_status(
        &self,
        integration_id: Uuid,
        provider_id: i64,
        status: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE mirror_contracts SET status = $3, synced_at = now()
             WHERE integration_id = $1 AND provider_id = $2",
        )
        .bind(integration_id)
        .bind(provider_id)
        .bind(status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

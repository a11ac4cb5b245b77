use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Derived status values shared by all mirrored entities, following the
/// provider's own vocabulary.
pub mod mirror_status {
    pub const ATIVO: &str = "ativo";
    pub const INATIVO: &str = "inativo";
    pub const CANCELADO: &str = "cancelado";
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MirrorClient {
    pub integration_id: Uuid,
    pub provider_id: i64,
    pub name: String,
    pub document: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: String,
    pub synced_at: DateTime<Utc>,
}

impl MirrorClient {
    pub fn is_active(&self) -> bool {
        self.status == mirror_status::ATIVO
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MirrorContract {
    pub integration_id: Uuid,
    pub provider_id: i64,
    pub client_provider_id: i64,
    pub plan_id: i64,
    pub amount: Option<Decimal>,
    pub status: String,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MirrorInvoice {
    pub integration_id: Uuid,
    pub provider_id: i64,
    pub contract_provider_id: i64,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub paid_at: Option<DateTime<Utc>>,
    pub status: String,
    pub synced_at: DateTime<Utc>,
}

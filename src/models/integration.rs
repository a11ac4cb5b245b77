use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A configured ERP -> provider connection. Rows are created by the
/// setup flow; the sync core only reads them. `keyapi` and `password`
/// hold AES-256-GCM ciphertext (see `crypto`).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Integration {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub base_url: String,
    pub login: String,
    pub keyapi: Vec<u8>,
    pub password: Vec<u8>,
    pub webhook_token: String,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

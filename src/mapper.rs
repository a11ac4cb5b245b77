use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::StoreError;

/// Resolves ERP-side product codes to provider plan ids.
///
/// The orchestrator consults this before enqueueing work; an unmappable
/// code is a validation error, never a queue item.
#[async_trait]
pub trait PlanResolver: Send + Sync {
    async fn resolve(&self, integration_id: Uuid, code: &str) -> Result<Option<i64>, StoreError>;
}

/// Lookup over the operator-maintained `product_mappings` table with an
/// in-memory cache. A miss triggers one cache refresh for the
/// integration before the code is reported unmappable.
pub struct ProductMapper {
    pool: PgPool,
    cache: DashMap<(Uuid, String), i64>,
}

impl ProductMapper {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            cache: DashMap::new(),
        }
    }

    /// Reload all mappings for one integration, replacing its cached
    /// entries. Returns how many mappings were loaded.
    pub async fn refresh(&self, integration_id: Uuid) -> Result<usize, sqlx::Error> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT erp_code, provider_plan_id FROM product_mappings WHERE integration_id = $1",
        )
        .bind(integration_id)
        .fetch_all(&self.pool)
        .await?;

        self.cache.retain(|(id, _), _| *id != integration_id);
        let count = rows.len();
        for (code, plan_id) in rows {
            self.cache.insert((integration_id, code), plan_id);
        }
        Ok(count)
    }
}

#[async_trait]
impl PlanResolver for ProductMapper {
    async fn resolve(&self, integration_id: Uuid, code: &str) -> Result<Option<i64>, StoreError> {
        let key = (integration_id, code.to_string());
        if let Some(plan) = self.cache.get(&key) {
            return Ok(Some(*plan));
        }

        self.refresh(integration_id)
            .await
            .map_err(StoreError::from)?;
        Ok(self.cache.get(&key).map(|plan| *plan))
    }
}

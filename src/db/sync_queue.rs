use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{StoreError, SyncQueueStore};
use crate::models::queue_item::{status, QueueItem, QueueStats, RecentActivity, SyncAction};

/// Exponential backoff with a ceiling: `min(base * 2^(n-1), max)` for
/// attempt `n` (1-based). Absorbs transient provider outages without
/// hammering the API.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl BackoffPolicy {
    pub fn delay(&self, attempt: i32) -> Duration {
        let n = attempt.max(1) as u32;
        let factor = 2u32.saturating_pow(n - 1);
        self.base.saturating_mul(factor).min(self.max)
    }
}

pub struct PgSyncQueueStore {
    pool: PgPool,
    backoff: BackoffPolicy,
}

impl PgSyncQueueStore {
    pub fn new(pool: PgPool, backoff: BackoffPolicy) -> Self {
        Self { pool, backoff }
    }
}

#[async_trait]
impl SyncQueueStore for PgSyncQueueStore {
    async fn enqueue(
        &self,
        integration_id: Uuid,
        action: SyncAction,
        payload: serde_json::Value,
    ) -> Result<QueueItem, StoreError> {
        let item = sqlx::query_as::<_, QueueItem>(
            "INSERT INTO sync_queue (id, integration_id, action, payload, max_attempts)
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(integration_id)
        .bind(action.as_str())
        .bind(&payload)
        .bind(action.max_attempts())
        .fetch_one(&self.pool)
        .await?;
        Ok(item)
    }

    async fn claim_batch(
        &self,
        integration_id: Uuid,
        limit: i64,
    ) -> Result<Vec<QueueItem>, StoreError> {
        let mut items = sqlx::query_as::<_, QueueItem>(
            "UPDATE sync_queue SET status = 'processing', updated_at = now()
             WHERE id IN (
                 SELECT id FROM sync_queue
                 WHERE integration_id = $1
                   AND status = 'pending'
                   AND scheduled_for <= now()
                 ORDER BY created_at ASC
                 LIMIT $2
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING *",
        )
        .bind(integration_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        // RETURNING carries no ordering guarantee; claim order must be FIFO.
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(items)
    }

    async fn mark_success(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE sync_queue SET status = 'success', last_error = NULL, updated_at = now()
             WHERE id = $1 AND status = 'processing'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_failure(&self, item: &QueueItem, error: &str) -> Result<(), StoreError> {
        let attempts = item.attempts + 1;
        if attempts >= item.max_attempts {
            sqlx::query(
                "UPDATE sync_queue
                 SET status = 'failed', attempts = $2, last_error = $3, updated_at = now()
                 WHERE id = $1 AND status = 'processing'",
            )
            .bind(item.id)
            .bind(attempts)
            .bind(error)
            .execute(&self.pool)
            .await?;
        } else {
            let next_run = Utc::now()
                + chrono::Duration::from_std(self.backoff.delay(attempts))
                    .unwrap_or_else(|_| chrono::Duration::hours(1));
            sqlx::query(
                "UPDATE sync_queue
                 SET status = 'pending', attempts = $2, last_error = $3,
                     scheduled_for = $4, updated_at = now()
                 WHERE id = $1 AND status = 'processing'",
            )
            .bind(item.id)
            .bind(attempts)
            .bind(error)
            .bind(next_run)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn mark_failed_permanent(&self, id: Uuid, error: &str) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE sync_queue
             SET status = 'failed', attempts = max_attempts, last_error = $2, updated_at = now()
             WHERE id = $1 AND status = 'processing'",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn retry(&self, id: Uuid) -> Result<QueueItem, StoreError> {
        sqlx::query_as::<_, QueueItem>(
            "UPDATE sync_queue
             SET status = 'pending', attempts = 0, scheduled_for = now(), updated_at = now()
             WHERE id = $1 AND status = 'failed'
             RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("failed queue item {id} not found")))
    }

    async fn delete_pending(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM sync_queue WHERE id = $1 AND status = 'pending'")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "queue item {id} is not pending (only pending items can be deleted)"
            )));
        }
        Ok(())
    }

    async fn stats(&self) -> Result<QueueStats, StoreError> {
        let row = sqlx::query_as::<_, StatsRow>(
            "SELECT
                 count(*) FILTER (WHERE status = 'pending') AS pending,
                 count(*) FILTER (WHERE status = 'processing') AS processing,
                 count(*) FILTER (WHERE status = 'success') AS success,
                 count(*) FILTER (WHERE status = 'failed') AS failed,
                 max(updated_at) FILTER (WHERE status IN ('success', 'failed')) AS last_processed,
                 max(updated_at) FILTER (WHERE status = 'success') AS last_success,
                 max(updated_at) FILTER (WHERE status = 'failed') AS last_failed
             FROM sync_queue",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(QueueStats {
            pending: row.pending,
            processing: row.processing,
            success: row.success,
            failed: row.failed,
            recent_activity: RecentActivity {
                last_processed: row.last_processed,
                last_success: row.last_success,
                last_failed: row.last_failed,
            },
        })
    }

    async fn list(&self, status: Option<&str>, limit: i64) -> Result<Vec<QueueItem>, StoreError> {
        if let Some(s) = status {
            if !status::is_valid(s) {
                return Err(StoreError::Conflict(format!("unknown status '{s}'")));
            }
        }

        let items = match status {
            Some(s) => {
                sqlx::query_as::<_, QueueItem>(
                    "SELECT * FROM sync_queue WHERE status = $1
                     ORDER BY created_at DESC LIMIT $2",
                )
                .bind(s)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, QueueItem>(
                    "SELECT * FROM sync_queue ORDER BY created_at DESC LIMIT $1",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(items)
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    pending: i64,
    processing: i64,
    success: i64,
    failed: i64,
    last_processed: Option<chrono::DateTime<Utc>>,
    last_success: Option<chrono::DateTime<Utc>>,
    last_failed: Option<chrono::DateTime<Utc>>,
}

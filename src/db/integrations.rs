use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Integration;

pub async fn list_active(pool: &PgPool) -> Result<Vec<Integration>, sqlx::Error> {
    sqlx::query_as::<_, Integration>(
        "SELECT * FROM integrations WHERE is_active = TRUE ORDER BY created_at ASC",
    )
    .fetch_all(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Integration>, sqlx::Error> {
    sqlx::query_as::<_, Integration>("SELECT * FROM integrations WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn touch_last_sync(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE integrations SET last_sync_at = now(), updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

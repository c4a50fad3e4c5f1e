//! PostgreSQL implementation of UploadSlotRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use tracing::instrument;

use stanza_core::{RepoResult, UploadSlot, UploadSlotRepository};

use crate::mappers::UploadSlotInsert;
use crate::models::UploadSlotModel;

use super::error::map_db_error;

/// PostgreSQL implementation of UploadSlotRepository
#[derive(Clone)]
pub struct PgUploadSlotRepository {
    pool: PgPool,
}

impl PgUploadSlotRepository {
    /// Create a new PgUploadSlotRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Insert a slot; the database assigns the id and creation time
pub(crate) async fn insert_slot<'e, E>(executor: E, slot: &mut UploadSlot) -> RepoResult<()>
where
    E: Executor<'e, Database = Postgres>,
{
    let insert = UploadSlotInsert::try_from(&*slot)?;

    let (id, created_at) = sqlx::query_as::<_, (String, DateTime<Utc>)>(
        r"
        INSERT INTO slot_file_upload (filename, size, content_type)
        VALUES ($1, $2, $3)
        RETURNING id, created_at
        ",
    )
    .bind(insert.filename)
    .bind(insert.size)
    .bind(insert.content_type)
    .fetch_one(executor)
    .await
    .map_err(map_db_error)?;

    slot.id = id;
    slot.created_at = created_at;
    Ok(())
}

pub(crate) async fn fetch_slot<'e, E>(executor: E, id: &str) -> RepoResult<Option<UploadSlot>>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query_as::<_, UploadSlotModel>(
        r"
        SELECT id, filename, size, content_type, created_at
        FROM slot_file_upload
        WHERE id = $1
        ",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
    .map_err(map_db_error)?;

    Ok(result.map(UploadSlot::from))
}

#[async_trait]
impl UploadSlotRepository for PgUploadSlotRepository {
    #[instrument(skip(self, slot), fields(filename = %slot.filename, size = slot.size))]
    async fn insert_slot(&self, slot: &mut UploadSlot) -> RepoResult<()> {
        insert_slot(&self.pool, slot).await
    }

    #[instrument(skip(self))]
    async fn fetch_slot(&self, id: &str) -> RepoResult<Option<UploadSlot>> {
        fetch_slot(&self.pool, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PgUploadSlotRepository>();
    }
}

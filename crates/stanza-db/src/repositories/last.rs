//! PostgreSQL implementation of LastRepository

use async_trait::async_trait;
use sqlx::{Executor, PgPool, Postgres};
use tracing::instrument;

use stanza_core::{LastActivity, LastRepository, RepoResult};

use crate::models::LastModel;

use super::error::map_db_error;

/// PostgreSQL implementation of LastRepository
#[derive(Clone)]
pub struct PgLastRepository {
    pool: PgPool,
}

impl PgLastRepository {
    /// Create a new PgLastRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) async fn upsert_last<'e, E>(executor: E, last: &LastActivity) -> RepoResult<()>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r"
        INSERT INTO last (username, seconds, status)
        VALUES ($1, $2, $3)
        ON CONFLICT (username) DO UPDATE
        SET seconds = EXCLUDED.seconds, status = EXCLUDED.status, updated_at = NOW()
        ",
    )
    .bind(&last.username)
    .bind(last.seconds)
    .bind(&last.status)
    .execute(executor)
    .await
    .map_err(map_db_error)?;

    Ok(())
}

pub(crate) async fn fetch_last<'e, E>(executor: E, username: &str) -> RepoResult<Option<LastActivity>>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query_as::<_, LastModel>(
        r"
        SELECT username, seconds, status
        FROM last
        WHERE username = $1
        ",
    )
    .bind(username)
    .fetch_optional(executor)
    .await
    .map_err(map_db_error)?;

    Ok(result.map(LastActivity::from))
}

#[async_trait]
impl LastRepository for PgLastRepository {
    #[instrument(skip(self))]
    async fn upsert_last(&self, last: &LastActivity) -> RepoResult<()> {
        upsert_last(&self.pool, last).await
    }

    #[instrument(skip(self))]
    async fn fetch_last(&self, username: &str) -> RepoResult<Option<LastActivity>> {
        fetch_last(&self.pool, username).await
    }
}

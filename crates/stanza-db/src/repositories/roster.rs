//! PostgreSQL implementation of RosterRepository

use async_trait::async_trait;
use sqlx::{Executor, PgPool, Postgres};
use tracing::instrument;

use stanza_core::{RepoResult, RosterItem, RosterRepository};

use crate::mappers::RosterItemInsert;
use crate::models::RosterItemModel;

use super::error::map_db_error;

/// PostgreSQL implementation of RosterRepository
#[derive(Clone)]
pub struct PgRosterRepository {
    pool: PgPool,
}

impl PgRosterRepository {
    /// Create a new PgRosterRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) async fn upsert_roster_item<'e, E>(executor: E, item: &RosterItem) -> RepoResult<()>
where
    E: Executor<'e, Database = Postgres>,
{
    let insert = RosterItemInsert::from(item);

    sqlx::query(
        r"
        INSERT INTO roster_items (username, jid, subscription)
        VALUES ($1, $2, $3)
        ON CONFLICT (username, jid) DO UPDATE
        SET subscription = EXCLUDED.subscription, updated_at = NOW()
        ",
    )
    .bind(insert.username)
    .bind(insert.jid)
    .bind(insert.subscription)
    .execute(executor)
    .await
    .map_err(map_db_error)?;

    Ok(())
}

pub(crate) async fn fetch_roster_item<'e, E>(
    executor: E,
    username: &str,
    jid: &str,
) -> RepoResult<Option<RosterItem>>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query_as::<_, RosterItemModel>(
        r"
        SELECT username, jid, subscription
        FROM roster_items
        WHERE username = $1 AND jid = $2
        ",
    )
    .bind(username)
    .bind(jid)
    .fetch_optional(executor)
    .await
    .map_err(map_db_error)?;

    result.map(RosterItem::try_from).transpose()
}

pub(crate) async fn fetch_roster_items<'e, E>(executor: E, username: &str) -> RepoResult<Vec<RosterItem>>
where
    E: Executor<'e, Database = Postgres>,
{
    let results = sqlx::query_as::<_, RosterItemModel>(
        r"
        SELECT username, jid, subscription
        FROM roster_items
        WHERE username = $1
        ORDER BY jid
        ",
    )
    .bind(username)
    .fetch_all(executor)
    .await
    .map_err(map_db_error)?;

    results.into_iter().map(RosterItem::try_from).collect()
}

#[async_trait]
impl RosterRepository for PgRosterRepository {
    #[instrument(skip(self))]
    async fn upsert_roster_item(&self, item: &RosterItem) -> RepoResult<()> {
        upsert_roster_item(&self.pool, item).await
    }

    #[instrument(skip(self))]
    async fn fetch_roster_item(&self, username: &str, jid: &str) -> RepoResult<Option<RosterItem>> {
        fetch_roster_item(&self.pool, username, jid).await
    }

    #[instrument(skip(self))]
    async fn fetch_roster_items(&self, username: &str) -> RepoResult<Vec<RosterItem>> {
        fetch_roster_items(&self.pool, username).await
    }
}

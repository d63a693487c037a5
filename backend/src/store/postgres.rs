use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info};

use super::{Mutation, PlayerRecord, PlayerStore, StoreError, Transform, Updated};

const PLAYER_COLUMNS: &str = "name, score, spins_remaining, last_spin_at, created_at";

/// The durable store: one `players` row per name, row locks for atomic updates.
#[derive(Clone)]
pub struct PgPlayerStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgPlayerStore {
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let options = database_url.parse::<PgConnectOptions>()?;
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(timeout)
            .connect_with(options)
            .await?;
        info!("Connected to Postgres (max {} connections)", max_connections);
        Ok(Self::from_pool(pool, timeout))
    }

    pub fn from_pool(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migration failed: {}", e)))?;
        info!("Database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl PlayerStore for PgPlayerStore {
    async fn create(
        &self,
        name: &str,
        daily_quota: i32,
        now: OffsetDateTime,
    ) -> Result<PlayerRecord, StoreError> {
        let sql = format!(
            "INSERT INTO players (name, score, spins_remaining, last_spin_at, created_at) \
             VALUES ($1, 0, $2, NULL, $3) \
             ON CONFLICT (name) DO NOTHING \
             RETURNING {}",
            PLAYER_COLUMNS
        );
        let inserted = sqlx::query_as::<_, PlayerRecord>(&sql)
            .bind(name)
            .bind(daily_quota)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        inserted.ok_or(StoreError::AlreadyExists)
    }

    async fn get(&self, name: &str) -> Result<PlayerRecord, StoreError> {
        let sql = format!("SELECT {} FROM players WHERE name = $1", PLAYER_COLUMNS);
        sqlx::query_as::<_, PlayerRecord>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, name: &str, transform: Transform) -> Result<Updated, StoreError> {
        let mut tx = self.pool.begin().await?;

        // SET LOCAL takes no bind parameters; the value is our own integer.
        let set_timeout = format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis()
        );
        sqlx::query(&set_timeout).execute(&mut *tx).await?;

        let select = format!(
            "SELECT {} FROM players WHERE name = $1 FOR UPDATE",
            PLAYER_COLUMNS
        );
        let current = sqlx::query_as::<_, PlayerRecord>(&select)
            .bind(name)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound)?;

        let mut draft = current.clone();
        match transform(&mut draft) {
            Mutation::Commit => {
                sqlx::query(
                    "UPDATE players \
                     SET score = $2, spins_remaining = $3, last_spin_at = $4 \
                     WHERE name = $1",
                )
                .bind(name)
                .bind(draft.score)
                .bind(draft.spins_remaining)
                .bind(draft.last_spin_at)
                .execute(&mut *tx)
                .await?;
                tx.commit().await?;
                debug!("Committed update for {}", name);
                Ok(Updated::Committed(draft))
            }
            Mutation::Abort => {
                tx.rollback().await?;
                Ok(Updated::Aborted(current))
            }
        }
    }

    async fn list_top(&self, limit: u32) -> Result<Vec<PlayerRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM players \
             ORDER BY score DESC, created_at ASC, name ASC \
             LIMIT $1",
            PLAYER_COLUMNS
        );
        let rows = sqlx::query_as::<_, PlayerRecord>(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Postgres pool closed");
    }
}

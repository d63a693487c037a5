//! Durable player records and the atomic update primitive the ledger is built on.
//!
//! Every store guarantees that `create` and `update` calls for the same name are mutually
//! exclusive, while calls for different names never wait on each other.

use async_trait::async_trait;
use time::OffsetDateTime;

pub mod memory;
pub mod postgres;

pub use memory::MemoryPlayerStore;
pub use postgres::PgPlayerStore;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PlayerRecord {
    pub name: String,
    pub score: i64,
    pub spins_remaining: i32,
    pub last_spin_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl PlayerRecord {
    pub fn new(name: &str, daily_quota: i32, now: OffsetDateTime) -> Self {
        Self {
            name: name.to_string(),
            score: 0,
            spins_remaining: daily_quota,
            last_spin_at: None,
            created_at: now,
        }
    }
}

/// Leaderboard order: score descending, earliest registration first, then name.
pub fn leaderboard_order(a: &PlayerRecord, b: &PlayerRecord) -> std::cmp::Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.name.cmp(&b.name))
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("player not found")]
    NotFound,
    #[error("player already exists")]
    AlreadyExists,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

/// What a transform decided to do with the record it was handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Commit,
    Abort,
}

/// A pure transformation run while the record is locked.
pub type Transform = Box<dyn FnOnce(&mut PlayerRecord) -> Mutation + Send>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Updated {
    /// The transformed record was persisted.
    Committed(PlayerRecord),
    /// The transform declined; this is the untouched stored record.
    Aborted(PlayerRecord),
}

#[async_trait]
pub trait PlayerStore: Send + Sync {
    /// Inserts a fresh record. Exactly one of several racing creates for a name succeeds.
    async fn create(
        &self,
        name: &str,
        daily_quota: i32,
        now: OffsetDateTime,
    ) -> Result<PlayerRecord, StoreError>;

    async fn get(&self, name: &str) -> Result<PlayerRecord, StoreError>;

    /// Applies `transform` to a copy of the current record and persists it atomically when the
    /// transform commits. This is the only way records change after creation.
    async fn update(&self, name: &str, transform: Transform) -> Result<Updated, StoreError>;

    async fn list_top(&self, limit: u32) -> Result<Vec<PlayerRecord>, StoreError>;

    async fn close(&self);
}

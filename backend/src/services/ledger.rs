use shared::constants::DEFAULT_LEADERBOARD_LIMIT;
use shared::validation::validate_prize;
use std::sync::Arc;
use time::{Date, OffsetDateTime};
use tracing::{debug, info, warn};

use crate::clock::{utc_date, Clock};
use crate::config::LedgerPolicy;
use crate::error::LedgerError;
use crate::retry::RetryPolicy;
use crate::store::{Mutation, PlayerRecord, PlayerStore, StoreError, Updated};

/// What callers get to see of a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerView {
    pub name: String,
    pub score: i64,
    pub spins_remaining: i32,
    pub last_spin_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

/// Restores the daily quota when the last settled spin happened on another UTC day.
/// Returns whether the quota was restored.
pub fn apply_daily_reset(record: &mut PlayerRecord, today: Date, daily_quota: i32) -> bool {
    let spun_today = record
        .last_spin_at
        .map(|at| utc_date(at) == today)
        .unwrap_or(false);
    if spun_today {
        // A lowered quota takes effect immediately.
        record.spins_remaining = record.spins_remaining.min(daily_quota);
        false
    } else {
        record.spins_remaining = daily_quota;
        true
    }
}

/// Spins the player would have available right now, without touching the stored record.
pub fn spins_available(record: &PlayerRecord, today: Date, daily_quota: i32) -> i32 {
    let mut projected = record.clone();
    apply_daily_reset(&mut projected, today, daily_quota);
    projected.spins_remaining
}

/// Settles one spin against `record`: reset, quota check, then score and quota together.
pub fn settle(record: &mut PlayerRecord, prize: i64, now: OffsetDateTime, daily_quota: i32) -> Mutation {
    apply_daily_reset(record, utc_date(now), daily_quota);
    if record.spins_remaining <= 0 {
        return Mutation::Abort;
    }
    let Some(score) = record.score.checked_add(prize) else {
        return Mutation::Abort;
    };
    record.score = score;
    record.spins_remaining -= 1;
    record.last_spin_at = Some(now);
    Mutation::Commit
}

/// Quota and scoring policy over a shared [`PlayerStore`]. Holds no player state of its own,
/// so clones can serve requests concurrently.
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn PlayerStore>,
    clock: Arc<dyn Clock>,
    policy: LedgerPolicy,
    read_retry: RetryPolicy,
}

impl LedgerService {
    pub fn new(store: Arc<dyn PlayerStore>, clock: Arc<dyn Clock>, policy: LedgerPolicy) -> Self {
        let read_retry = RetryPolicy::storage_reads(policy.read_retry_attempts);
        Self {
            store,
            clock,
            policy,
            read_retry,
        }
    }

    fn view(&self, record: PlayerRecord, today: Date) -> PlayerView {
        let spins_remaining = spins_available(&record, today, self.policy.daily_quota);
        PlayerView {
            name: record.name,
            score: record.score,
            spins_remaining,
            last_spin_at: record.last_spin_at,
            created_at: record.created_at,
        }
    }

    /// Names used for lookups only need to be non-blank and printable; length rules apply at
    /// registration.
    fn lookup_name(raw: &str) -> Result<&str, LedgerError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(LedgerError::Validation(
                shared::constants::EMPTY_NAME_ERROR.to_string(),
            ));
        }
        if name.chars().any(char::is_control) {
            return Err(LedgerError::Validation(
                shared::constants::INVALID_NAME_ERROR.to_string(),
            ));
        }
        Ok(name)
    }

    /// Get-or-create. An existing player comes back untouched.
    pub async fn register(&self, raw_name: &str) -> Result<PlayerView, LedgerError> {
        let name = self.policy.names.validate(raw_name)?;
        let now = self.clock.now();

        let record = match self
            .store
            .create(&name, self.policy.daily_quota, now)
            .await
        {
            Ok(record) => {
                info!(event = "player_registered", player = %name, "🎡 New player registered: {}", name);
                record
            }
            Err(StoreError::AlreadyExists) => {
                debug!("Player {} already registered, returning current state", name);
                self.store
                    .get(&name)
                    .await
                    .map_err(|e| LedgerError::from_store(e, &name))?
            }
            Err(e) => return Err(LedgerError::from_store(e, &name)),
        };

        Ok(self.view(record, utc_date(now)))
    }

    /// Settles a spin worth `prize` points. Never retried here: a lost acknowledgement could
    /// otherwise settle the same spin twice.
    pub async fn spin(&self, raw_name: &str, prize: i64) -> Result<PlayerView, LedgerError> {
        validate_prize(prize, self.policy.max_prize)?;
        let name = Self::lookup_name(raw_name)?;
        let now = self.clock.now();
        let today = utc_date(now);
        let quota = self.policy.daily_quota;

        let outcome = self
            .store
            .update(
                name,
                Box::new(move |record: &mut PlayerRecord| settle(record, prize, now, quota)),
            )
            .await
            .map_err(|e| LedgerError::from_store(e, name))?;

        match outcome {
            Updated::Committed(record) => {
                info!(
                    event = "spin_settled",
                    player = %name,
                    prize,
                    score = record.score,
                    spins_remaining = record.spins_remaining,
                    "🎡 WHEEL SPIN: {} won {} points (score {}, {} spins left)",
                    name,
                    prize,
                    record.score,
                    record.spins_remaining
                );
                Ok(self.view(record, today))
            }
            Updated::Aborted(record) => {
                if spins_available(&record, today, quota) == 0 {
                    info!(event = "spin_rejected", player = %name, "🚫 {} has no spins left today", name);
                    Err(LedgerError::QuotaExceeded(name.to_string()))
                } else {
                    warn!(event = "spin_rejected", player = %name, prize, "Score overflow for {}", name);
                    Err(LedgerError::Validation(format!(
                        "Prize {} would overflow the score",
                        prize
                    )))
                }
            }
        }
    }

    pub async fn get_player(&self, raw_name: &str) -> Result<PlayerView, LedgerError> {
        let name = Self::lookup_name(raw_name)?;
        let record = self
            .read_retry
            .retry_if(|_| self.store.get(name), is_transient)
            .await
            .map_err(|e| LedgerError::from_store(e, name))?;
        Ok(self.view(record, self.clock.today()))
    }

    /// Top players by score. Read-only: quotas are projected, never reset, here.
    pub async fn leaderboard(&self, limit: Option<u32>) -> Result<Vec<PlayerView>, LedgerError> {
        let limit = limit
            .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
            .min(self.policy.max_leaderboard_limit);
        if limit == 0 {
            return Ok(Vec::new());
        }
        let records = self
            .read_retry
            .retry_if(|_| self.store.list_top(limit), is_transient)
            .await
            .map_err(|e| LedgerError::from_store(e, "leaderboard"))?;

        let today = self.clock.today();
        Ok(records
            .into_iter()
            .map(|record| self.view(record, today))
            .collect())
    }
}

fn is_transient(err: &StoreError) -> bool {
    matches!(err, StoreError::Unavailable(_))
}

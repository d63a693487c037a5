use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use super::{leaderboard_order, Mutation, PlayerRecord, PlayerStore, StoreError, Transform, Updated};

/// One player's state. `writer` serializes updates; `committed` is the last persisted record,
/// which readers copy without ever waiting on a writer.
struct Slot {
    writer: Arc<Mutex<()>>,
    committed: RwLock<PlayerRecord>,
}

impl Slot {
    fn new(record: PlayerRecord) -> Self {
        Self {
            writer: Arc::new(Mutex::new(())),
            committed: RwLock::new(record),
        }
    }

    fn snapshot(&self) -> PlayerRecord {
        self.committed
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn commit(&self, record: PlayerRecord) {
        *self.committed.write().unwrap_or_else(|e| e.into_inner()) = record;
    }
}

/// Process-local store with one writer lock per player.
///
/// Used by the test suite and by `LEDGER_STORE=memory` demo runs; records do not survive a
/// restart.
pub struct MemoryPlayerStore {
    players: DashMap<String, Arc<Slot>>,
    lock_timeout: Duration,
    #[cfg(test)]
    injected_failures: AtomicUsize,
}

impl MemoryPlayerStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            players: DashMap::new(),
            lock_timeout,
            #[cfg(test)]
            injected_failures: AtomicUsize::new(0),
        }
    }

    /// Makes the next `count` operations fail with `StoreError::Unavailable`.
    #[cfg(test)]
    pub(crate) fn inject_failures(&self, count: usize) {
        self.injected_failures.store(count, Ordering::SeqCst);
    }

    #[cfg(test)]
    fn check_injected_failure(&self) -> Result<(), StoreError> {
        let consumed = self
            .injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        match consumed {
            Ok(_) => Err(StoreError::Unavailable("injected failure".to_string())),
            Err(_) => Ok(()),
        }
    }

    #[cfg(not(test))]
    #[inline(always)]
    fn check_injected_failure(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Takes `name`'s writer lock and keeps it until the guard drops.
    #[cfg(test)]
    pub(crate) async fn hold_writer(&self, name: &str) -> OwnedMutexGuard<()> {
        let slot = self.slot(name).expect("player exists");
        Arc::clone(&slot.writer).lock_owned().await
    }

    fn slot(&self, name: &str) -> Result<Arc<Slot>, StoreError> {
        // Clone the Arc out so the map shard is released before we wait on the writer lock.
        self.players
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(StoreError::NotFound)
    }

    async fn lock_writer(&self, slot: &Slot) -> Result<OwnedMutexGuard<()>, StoreError> {
        tokio::time::timeout(self.lock_timeout, Arc::clone(&slot.writer).lock_owned())
            .await
            .map_err(|_| {
                warn!("Timed out after {:?} waiting for a player lock", self.lock_timeout);
                StoreError::Unavailable("timed out waiting for player lock".to_string())
            })
    }
}

impl Default for MemoryPlayerStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl PlayerStore for MemoryPlayerStore {
    async fn create(
        &self,
        name: &str,
        daily_quota: i32,
        now: OffsetDateTime,
    ) -> Result<PlayerRecord, StoreError> {
        self.check_injected_failure()?;
        match self.players.entry(name.to_string()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists),
            Entry::Vacant(slot) => {
                let record = PlayerRecord::new(name, daily_quota, now);
                slot.insert(Arc::new(Slot::new(record.clone())));
                debug!("Created in-memory record for {}", name);
                Ok(record)
            }
        }
    }

    async fn get(&self, name: &str) -> Result<PlayerRecord, StoreError> {
        self.check_injected_failure()?;
        Ok(self.slot(name)?.snapshot())
    }

    async fn update(&self, name: &str, transform: Transform) -> Result<Updated, StoreError> {
        self.check_injected_failure()?;
        let slot = self.slot(name)?;
        let _writer = self.lock_writer(&slot).await?;

        let current = slot.snapshot();
        let mut draft = current.clone();
        match transform(&mut draft) {
            Mutation::Commit => {
                slot.commit(draft.clone());
                Ok(Updated::Committed(draft))
            }
            Mutation::Abort => Ok(Updated::Aborted(current)),
        }
    }

    async fn list_top(&self, limit: u32) -> Result<Vec<PlayerRecord>, StoreError> {
        self.check_injected_failure()?;
        let mut records: Vec<PlayerRecord> = self
            .players
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        records.sort_by(leaderboard_order);
        records.truncate(limit as usize);
        Ok(records)
    }

    async fn close(&self) {
        debug!("Dropping {} in-memory player records", self.players.len());
        self.players.clear();
    }
}

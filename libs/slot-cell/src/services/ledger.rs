// libs/slot-cell/src/services/ledger.rs
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Slot, SlotError};
use crate::store::{PostgrestSlotStore, SlotStore};

/// How long a booking attempt may hold a slot before the lock becomes
/// stealable.
pub const LOCK_LEASE_SECONDS: i64 = 300;

fn lock_lease() -> Duration {
    Duration::seconds(LOCK_LEASE_SECONDS)
}

/// The slot ledger: lock acquisition, commit, and the compensating
/// releases. Every mutation is a single atomic operation in the store,
/// so concurrent booking attempts on the last seat resolve to exactly
/// one winner.
pub struct SlotLedgerService {
    store: Arc<dyn SlotStore>,
}

impl SlotLedgerService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            store: Arc::new(PostgrestSlotStore::new(supabase)),
        }
    }

    pub fn with_store(store: Arc<dyn SlotStore>) -> Self {
        Self { store }
    }

    pub async fn get_slot(&self, slot_id: Uuid) -> Result<Slot, SlotError> {
        self.store.fetch(slot_id).await?.ok_or(SlotError::NotFound)
    }

    /// Acquire the soft lock for `holder_id`. Returns `Unavailable` when
    /// another live lock exists, the slot is blocked, or capacity is gone.
    pub async fn acquire_lock(&self, slot_id: Uuid, holder_id: Uuid) -> Result<Slot, SlotError> {
        debug!("Acquiring lock on slot {} for {}", slot_id, holder_id);

        match self.store.try_acquire(slot_id, holder_id, lock_lease()).await? {
            Some(slot) => {
                info!("Lock acquired on slot {} by {}", slot_id, holder_id);
                Ok(slot)
            }
            None => {
                debug!("Slot {} not acquirable for {}", slot_id, holder_id);
                Err(SlotError::Unavailable)
            }
        }
    }

    /// Turn the holder's lock into a booking: clears the lock and bumps
    /// `booked_count` atomically.
    pub async fn commit_booking(&self, slot_id: Uuid, holder_id: Uuid) -> Result<Slot, SlotError> {
        let slot = self.store.commit(slot_id, holder_id).await?;
        info!(
            "Slot {} committed by {} ({}/{})",
            slot_id, holder_id, slot.booked_count, slot.max_capacity
        );
        Ok(slot)
    }

    /// Compensation path: drop the lock without booking. Never fails the
    /// caller over a lock that is already gone.
    pub async fn release_lock(&self, slot_id: Uuid, holder_id: Uuid) {
        if let Err(e) = self.store.release_lock(slot_id, holder_id).await {
            warn!("Failed to release lock on slot {}: {}", slot_id, e);
        }
    }

    /// Return one seat after a cancellation.
    pub async fn release_capacity(&self, slot_id: Uuid) -> Result<Slot, SlotError> {
        let slot = self.store.release_capacity(slot_id).await?;
        info!(
            "Capacity released on slot {} ({}/{})",
            slot_id, slot.booked_count, slot.max_capacity
        );
        Ok(slot)
    }

    /// Sweep expired locks. Expiry is also honoured lazily at acquisition
    /// time, so this only keeps listings tidy.
    pub async fn expire_stale_locks(&self) -> Result<usize, SlotError> {
        let cleared = self.store.expire_stale_locks(Utc::now()).await?;
        if cleared > 0 {
            info!("Cleared {} expired slot locks", cleared);
        }
        Ok(cleared)
    }
}

// libs/slot-cell/src/store.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{Slot, SlotError, SlotLock};

/// Storage seam for the slot ledger. The lock and capacity mutations are
/// part of the seam so each implementation can guarantee them as single
/// atomic compare-and-set operations.
#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn fetch(&self, slot_id: Uuid) -> Result<Option<Slot>, SlotError>;

    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Slot>, SlotError>;

    async fn insert(&self, slot: Slot) -> Result<Slot, SlotError>;

    async fn delete(&self, slot_id: Uuid) -> Result<(), SlotError>;

    async fn set_blocked(
        &self,
        slot_id: Uuid,
        blocked: bool,
        reason: Option<String>,
    ) -> Result<Slot, SlotError>;

    /// Compare-and-set lock acquisition. Succeeds only when the slot is
    /// unblocked, has capacity, and carries no live lock held by another
    /// holder. Returns the locked slot on success, `None` when the slot
    /// exists but was not acquirable.
    async fn try_acquire(
        &self,
        slot_id: Uuid,
        holder_id: Uuid,
        lease: Duration,
    ) -> Result<Option<Slot>, SlotError>;

    /// Consume the holder's lock and increment `booked_count` in one step.
    /// Fails with `Unavailable` when the lock is missing, expired, or held
    /// by someone else.
    async fn commit(&self, slot_id: Uuid, holder_id: Uuid) -> Result<Slot, SlotError>;

    /// Drop the holder's lock without booking. A no-op when the lock is
    /// already gone or held by someone else.
    async fn release_lock(&self, slot_id: Uuid, holder_id: Uuid) -> Result<(), SlotError>;

    /// Decrement `booked_count` after a cancellation, clamped at zero.
    async fn release_capacity(&self, slot_id: Uuid) -> Result<Slot, SlotError>;

    /// Clear every lock past its expiry. Returns the number cleared.
    async fn expire_stale_locks(&self, now: DateTime<Utc>) -> Result<usize, SlotError>;
}

// ==============================================================================
// POSTGREST-BACKED STORE
// ==============================================================================

pub struct PostgrestSlotStore {
    supabase: Arc<SupabaseClient>,
}

impl PostgrestSlotStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn representation_headers() -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));
        headers
    }

    fn parse_slot(row: Value) -> Result<Slot, SlotError> {
        serde_json::from_value(row)
            .map_err(|e| SlotError::DatabaseError(format!("Failed to parse slot: {}", e)))
    }
}

#[async_trait]
impl SlotStore for PostgrestSlotStore {
    async fn fetch(&self, slot_id: Uuid) -> Result<Option<Slot>, SlotError> {
        let path = format!("/rest/v1/slots?id=eq.{}", slot_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| SlotError::DatabaseError(e.to_string()))?;

        result.into_iter().next().map(Self::parse_slot).transpose()
    }

    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Slot>, SlotError> {
        let path = format!(
            "/rest/v1/slots?doctor_id=eq.{}&date=gte.{}&date=lte.{}&order=date.asc,start_time.asc",
            doctor_id, from, to
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| SlotError::DatabaseError(e.to_string()))?;

        result.into_iter().map(Self::parse_slot).collect()
    }

    async fn insert(&self, slot: Slot) -> Result<Slot, SlotError> {
        let body = serde_json::to_value(&slot)
            .map_err(|e| SlotError::DatabaseError(e.to_string()))?;

        // A unique index on (doctor_id, date, start_time) turns duplicates
        // into a 409.
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/slots",
            None,
            Some(body),
            Some(Self::representation_headers()),
        ).await.map_err(|e| {
            let message = e.to_string();
            if message.contains("Conflict") || message.contains("duplicate") {
                SlotError::DuplicateSlot
            } else {
                SlotError::DatabaseError(message)
            }
        })?;

        let row = result.into_iter().next()
            .ok_or_else(|| SlotError::DatabaseError("Insert returned no row".to_string()))?;
        Self::parse_slot(row)
    }

    async fn delete(&self, slot_id: Uuid) -> Result<(), SlotError> {
        // Guarded delete: the filter refuses slots with live bookings so a
        // booking that lands between our read and the delete is safe.
        let path = format!("/rest/v1/slots?id=eq.{}&booked_count=eq.0", slot_id);
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            None,
            None,
            Some(Self::representation_headers()),
        ).await.map_err(|e| SlotError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            // Distinguish missing from booked.
            return match self.fetch(slot_id).await? {
                Some(_) => Err(SlotError::SlotBooked),
                None => Err(SlotError::NotFound),
            };
        }
        Ok(())
    }

    async fn set_blocked(
        &self,
        slot_id: Uuid,
        blocked: bool,
        reason: Option<String>,
    ) -> Result<Slot, SlotError> {
        let path = format!("/rest/v1/slots?id=eq.{}", slot_id);
        let body = json!({
            "blocked": blocked,
            "blocked_reason": reason,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(body),
            Some(Self::representation_headers()),
        ).await.map_err(|e| SlotError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(SlotError::NotFound)?;
        Self::parse_slot(row)
    }

    async fn try_acquire(
        &self,
        slot_id: Uuid,
        holder_id: Uuid,
        lease: Duration,
    ) -> Result<Option<Slot>, SlotError> {
        // One guarded UPDATE server-side; concurrent acquirers serialize on
        // the row and at most one sees it in an acquirable state.
        let body = json!({
            "p_slot_id": slot_id,
            "p_holder_id": holder_id,
            "p_lease_seconds": lease.num_seconds(),
        });

        let result: Vec<Value> = self.supabase.request(
            Method::POST,
            "/rest/v1/rpc/acquire_slot_lock",
            None,
            Some(body),
        ).await.map_err(|e| SlotError::DatabaseError(e.to_string()))?;

        result.into_iter().next().map(Self::parse_slot).transpose()
    }

    async fn commit(&self, slot_id: Uuid, holder_id: Uuid) -> Result<Slot, SlotError> {
        let body = json!({
            "p_slot_id": slot_id,
            "p_holder_id": holder_id,
        });

        let result: Vec<Value> = self.supabase.request(
            Method::POST,
            "/rest/v1/rpc/commit_slot",
            None,
            Some(body),
        ).await.map_err(|e| SlotError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(SlotError::Unavailable)?;
        Self::parse_slot(row)
    }

    async fn release_lock(&self, slot_id: Uuid, holder_id: Uuid) -> Result<(), SlotError> {
        // Guarded PATCH: only clears the lock when this holder still owns it.
        let path = format!(
            "/rest/v1/slots?id=eq.{}&lock->>holder_id=eq.{}",
            slot_id, holder_id
        );
        let body = json!({
            "lock": null,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let _: Vec<Value> = self.supabase.request(
            Method::PATCH,
            &path,
            None,
            Some(body),
        ).await.map_err(|e| SlotError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn release_capacity(&self, slot_id: Uuid) -> Result<Slot, SlotError> {
        let body = json!({ "p_slot_id": slot_id });

        let result: Vec<Value> = self.supabase.request(
            Method::POST,
            "/rest/v1/rpc/release_slot_capacity",
            None,
            Some(body),
        ).await.map_err(|e| SlotError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(SlotError::NotFound)?;
        Self::parse_slot(row)
    }

    async fn expire_stale_locks(&self, now: DateTime<Utc>) -> Result<usize, SlotError> {
        let path = format!(
            "/rest/v1/slots?lock->>expires_at=lte.{}",
            now.to_rfc3339()
        );
        let body = json!({
            "lock": null,
            "updated_at": now.to_rfc3339(),
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(body),
            Some(Self::representation_headers()),
        ).await.map_err(|e| SlotError::DatabaseError(e.to_string()))?;

        Ok(result.len())
    }
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

/// Mutex-serialized map with the same atomicity contract as the PostgREST
/// store. Used by tests and local runs without a database.
#[derive(Default)]
pub struct InMemorySlotStore {
    slots: Mutex<HashMap<Uuid, Slot>>,
}

impl InMemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn refresh_availability(slot: &mut Slot) {
        slot.is_available = slot.booked_count < slot.max_capacity;
    }
}

#[async_trait]
impl SlotStore for InMemorySlotStore {
    async fn fetch(&self, slot_id: Uuid) -> Result<Option<Slot>, SlotError> {
        Ok(self.slots.lock().await.get(&slot_id).cloned())
    }

    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Slot>, SlotError> {
        let slots = self.slots.lock().await;
        let mut matching: Vec<Slot> = slots.values()
            .filter(|s| s.doctor_id == doctor_id && s.date >= from && s.date <= to)
            .cloned()
            .collect();
        matching.sort_by_key(|s| (s.date, s.start_time));
        Ok(matching)
    }

    async fn insert(&self, slot: Slot) -> Result<Slot, SlotError> {
        let mut slots = self.slots.lock().await;
        let duplicate = slots.values().any(|s| {
            s.doctor_id == slot.doctor_id && s.date == slot.date && s.start_time == slot.start_time
        });
        if duplicate {
            return Err(SlotError::DuplicateSlot);
        }
        slots.insert(slot.id, slot.clone());
        Ok(slot)
    }

    async fn delete(&self, slot_id: Uuid) -> Result<(), SlotError> {
        let mut slots = self.slots.lock().await;
        match slots.get(&slot_id) {
            None => Err(SlotError::NotFound),
            Some(slot) if slot.booked_count > 0 => Err(SlotError::SlotBooked),
            Some(_) => {
                slots.remove(&slot_id);
                Ok(())
            }
        }
    }

    async fn set_blocked(
        &self,
        slot_id: Uuid,
        blocked: bool,
        reason: Option<String>,
    ) -> Result<Slot, SlotError> {
        let mut slots = self.slots.lock().await;
        let slot = slots.get_mut(&slot_id).ok_or(SlotError::NotFound)?;
        slot.blocked = blocked;
        slot.blocked_reason = if blocked { reason } else { None };
        slot.updated_at = Utc::now();
        Ok(slot.clone())
    }

    async fn try_acquire(
        &self,
        slot_id: Uuid,
        holder_id: Uuid,
        lease: Duration,
    ) -> Result<Option<Slot>, SlotError> {
        let mut slots = self.slots.lock().await;
        let slot = slots.get_mut(&slot_id).ok_or(SlotError::NotFound)?;

        let now = Utc::now();
        if !slot.is_bookable_by(holder_id, now) {
            return Ok(None);
        }

        slot.lock = Some(SlotLock {
            holder_id,
            locked_at: now,
            expires_at: now + lease,
        });
        slot.updated_at = now;
        Ok(Some(slot.clone()))
    }

    async fn commit(&self, slot_id: Uuid, holder_id: Uuid) -> Result<Slot, SlotError> {
        let mut slots = self.slots.lock().await;
        let slot = slots.get_mut(&slot_id).ok_or(SlotError::NotFound)?;

        let now = Utc::now();
        let held = slot.lock.as_ref()
            .map(|l| l.holder_id == holder_id && !l.is_expired(now))
            .unwrap_or(false);
        if !held || !slot.has_capacity() {
            return Err(SlotError::Unavailable);
        }

        slot.lock = None;
        slot.booked_count += 1;
        Self::refresh_availability(slot);
        slot.updated_at = now;
        Ok(slot.clone())
    }

    async fn release_lock(&self, slot_id: Uuid, holder_id: Uuid) -> Result<(), SlotError> {
        let mut slots = self.slots.lock().await;
        if let Some(slot) = slots.get_mut(&slot_id) {
            if slot.lock.as_ref().map(|l| l.holder_id == holder_id).unwrap_or(false) {
                slot.lock = None;
                slot.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn release_capacity(&self, slot_id: Uuid) -> Result<Slot, SlotError> {
        let mut slots = self.slots.lock().await;
        let slot = slots.get_mut(&slot_id).ok_or(SlotError::NotFound)?;
        slot.booked_count = (slot.booked_count - 1).max(0);
        Self::refresh_availability(slot);
        slot.updated_at = Utc::now();
        Ok(slot.clone())
    }

    async fn expire_stale_locks(&self, now: DateTime<Utc>) -> Result<usize, SlotError> {
        let mut slots = self.slots.lock().await;
        let mut cleared = 0;
        for slot in slots.values_mut() {
            if slot.lock.as_ref().map(|l| l.is_expired(now)).unwrap_or(false) {
                slot.lock = None;
                slot.updated_at = now;
                cleared += 1;
            }
        }
        Ok(cleared)
    }
}

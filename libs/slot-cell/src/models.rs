// libs/slot-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A soft lock on a slot. Held by one booking attempt at a time; past
/// `expires_at` the lock is dead weight and any acquirer may steal it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotLock {
    pub holder_id: Uuid,
    pub locked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SlotLock {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_capacity: i32,
    pub booked_count: i32,
    /// Maintained flag kept in lockstep with `booked_count < max_capacity`.
    /// PostgREST filters cannot compare two columns, so listings filter on
    /// this instead.
    pub is_available: bool,
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock: Option<SlotLock>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Slot {
    pub fn has_capacity(&self) -> bool {
        self.booked_count < self.max_capacity
    }

    /// The single bookability predicate. A slot is bookable by `requester`
    /// when it is unblocked, has free capacity, and carries no live lock
    /// held by someone else.
    pub fn is_bookable_by(&self, requester: Uuid, now: DateTime<Utc>) -> bool {
        if self.blocked || !self.has_capacity() {
            return false;
        }
        match &self.lock {
            None => true,
            Some(lock) => lock.holder_id == requester || lock.is_expired(now),
        }
    }

    /// Bookable by anyone right now, ignoring lock ownership. Used for
    /// public listings where there is no requester yet.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        if self.blocked || !self.has_capacity() {
            return false;
        }
        match &self.lock {
            None => true,
            Some(lock) => lock.is_expired(now),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSlotRequest {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default = "default_capacity")]
    pub max_capacity: i32,
}

fn default_capacity() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkGenerateRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_capacity")]
    pub max_capacity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockSlotRequest {
    pub blocked: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkGenerateSummary {
    pub created: usize,
    pub skipped: usize,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SlotError {
    #[error("Slot not found")]
    NotFound,

    #[error("Slot is not available")]
    Unavailable,

    #[error("A slot already exists for this doctor at this time")]
    DuplicateSlot,

    #[error("Slot has active bookings")]
    SlotBooked,

    #[error("Invalid slot definition: {0}")]
    InvalidSlot(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

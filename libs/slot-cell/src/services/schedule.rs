// libs/slot-cell/src/services/schedule.rs
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use doctor_cell::models::WeeklyAvailability;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    BulkGenerateSummary, CreateSlotRequest, Slot, SlotError,
};
use crate::store::{PostgrestSlotStore, SlotStore};

/// Slot schedule management: creating, generating, blocking, and deleting
/// slots. Booking-time mutations live in the ledger service.
pub struct SlotScheduleService {
    store: Arc<dyn SlotStore>,
}

impl SlotScheduleService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            store: Arc::new(PostgrestSlotStore::new(supabase)),
        }
    }

    pub fn with_store(store: Arc<dyn SlotStore>) -> Self {
        Self { store }
    }

    pub async fn create_slot(
        &self,
        doctor_id: Uuid,
        request: CreateSlotRequest,
    ) -> Result<Slot, SlotError> {
        if request.start_time >= request.end_time {
            return Err(SlotError::InvalidSlot(
                "start_time must be before end_time".to_string(),
            ));
        }
        if request.max_capacity < 1 {
            return Err(SlotError::InvalidSlot(
                "max_capacity must be at least 1".to_string(),
            ));
        }

        let now = Utc::now();
        let slot = Slot {
            id: Uuid::new_v4(),
            doctor_id,
            date: request.date,
            start_time: request.start_time,
            end_time: request.end_time,
            max_capacity: request.max_capacity,
            booked_count: 0,
            is_available: true,
            blocked: false,
            blocked_reason: None,
            lock: None,
            created_at: now,
            updated_at: now,
        };

        debug!("Creating slot for doctor {} on {} at {}", doctor_id, slot.date, slot.start_time);
        self.store.insert(slot).await
    }

    /// Generate slots over a date range from the doctor's weekly
    /// availability template. Off-days are skipped; slots that already
    /// exist are skipped silently so the operation is idempotent.
    pub async fn bulk_generate(
        &self,
        doctor_id: Uuid,
        availability: &WeeklyAvailability,
        slot_duration_minutes: i32,
        start_date: NaiveDate,
        end_date: NaiveDate,
        max_capacity: i32,
    ) -> Result<BulkGenerateSummary, SlotError> {
        if start_date > end_date {
            return Err(SlotError::InvalidSlot(
                "start_date must not be after end_date".to_string(),
            ));
        }
        if max_capacity < 1 {
            return Err(SlotError::InvalidSlot(
                "max_capacity must be at least 1".to_string(),
            ));
        }

        let step = Duration::minutes(slot_duration_minutes as i64);
        let mut created = 0;
        let mut skipped = 0;

        let mut date = start_date;
        while date <= end_date {
            let day = availability.day(date.weekday());
            if let (true, Some(day_start), Some(day_end)) = (day.is_available, day.start, day.end) {
                let mut start = day_start;
                loop {
                    // overflowing_add_signed flags wrap past midnight.
                    let (end, wrap) = start.overflowing_add_signed(step);
                    if wrap != 0 || end > day_end {
                        break;
                    }
                    let request = CreateSlotRequest {
                        date,
                        start_time: start,
                        end_time: end,
                        max_capacity,
                    };
                    match self.create_slot(doctor_id, request).await {
                        Ok(_) => created += 1,
                        Err(SlotError::DuplicateSlot) => skipped += 1,
                        Err(e) => return Err(e),
                    }
                    start = end;
                }
            }
            date += Duration::days(1);
        }

        info!(
            "Bulk generation for doctor {}: {} created, {} skipped",
            doctor_id, created, skipped
        );
        Ok(BulkGenerateSummary { created, skipped })
    }

    pub async fn set_blocked(
        &self,
        slot_id: Uuid,
        blocked: bool,
        reason: Option<String>,
    ) -> Result<Slot, SlotError> {
        info!("Setting blocked={} on slot {}", blocked, slot_id);
        self.store.set_blocked(slot_id, blocked, reason).await
    }

    /// Delete a slot. Refused while any booking holds a seat in it.
    pub async fn delete_slot(&self, slot_id: Uuid) -> Result<(), SlotError> {
        self.store.delete(slot_id).await
    }

    pub async fn get_slot(&self, slot_id: Uuid) -> Result<Slot, SlotError> {
        self.store.fetch(slot_id).await?.ok_or(SlotError::NotFound)
    }

    /// Public listing: only slots a new patient could book right now.
    pub async fn list_open_slots(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Slot>, SlotError> {
        let now = Utc::now();
        let slots = self.store.list_for_doctor(doctor_id, from, to).await?;
        Ok(slots.into_iter().filter(|s| s.is_open(now)).collect())
    }

    /// Owner listing: everything, including blocked and full slots.
    pub async fn list_all_slots(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Slot>, SlotError> {
        self.store.list_for_doctor(doctor_id, from, to).await
    }
}

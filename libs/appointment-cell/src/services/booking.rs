// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use doctor_cell::store::{DoctorStore, PostgrestDoctorStore};
use notification_cell::dispatch::NotificationDispatcher;
use notification_cell::models::NotificationEvent;
use payment_cell::gateway::PaymentGateway;
use payment_cell::models::to_cents;
use payment_cell::stripe::StripeClient;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use slot_cell::services::SlotLedgerService;
use slot_cell::store::{PostgrestSlotStore, SlotStore};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, PaymentInfo,
    PaymentStatus, VideoSession,
};
use crate::services::is_owning_patient;
use crate::store::{AppointmentStore, PostgrestAppointmentStore};

const BOOKING_CURRENCY: &str = "usd";

/// The booking saga. Reserves the slot, authorizes the payment hold,
/// persists the appointment, and commits the slot; any failure after the
/// reservation runs the completed steps' compensations in reverse order.
/// The invariant is two-sided: no persisted appointment without a
/// committed slot, no committed slot without an appointment.
pub struct BookingCoordinator {
    doctors: Arc<dyn DoctorStore>,
    slots: Arc<dyn SlotStore>,
    appointments: Arc<dyn AppointmentStore>,
    payments: Arc<dyn PaymentGateway>,
    notifications: NotificationDispatcher,
}

impl BookingCoordinator {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            doctors: Arc::new(PostgrestDoctorStore::new(supabase.clone())),
            slots: Arc::new(PostgrestSlotStore::new(supabase.clone())),
            appointments: Arc::new(PostgrestAppointmentStore::new(supabase)),
            payments: Arc::new(StripeClient::new(config)),
            notifications: NotificationDispatcher::new(config),
        }
    }

    pub fn with_parts(
        doctors: Arc<dyn DoctorStore>,
        slots: Arc<dyn SlotStore>,
        appointments: Arc<dyn AppointmentStore>,
        payments: Arc<dyn PaymentGateway>,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self { doctors, slots, appointments, payments, notifications }
    }

    pub async fn book(
        &self,
        patient_id: Uuid,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        // Step 1: the doctor must be verified and taking bookings.
        let doctor = self.doctors.fetch(request.doctor_id).await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?
            .ok_or(AppointmentError::DoctorUnavailable)?;
        if !doctor.can_be_booked() {
            return Err(AppointmentError::DoctorUnavailable);
        }

        // Step 2: reserve the slot. No retry; a contended slot surfaces
        // immediately so the patient can pick another.
        let ledger = SlotLedgerService::with_store(self.slots.clone());
        let slot = ledger.acquire_lock(request.slot_id, patient_id).await
            .map_err(|e| match e {
                slot_cell::models::SlotError::DatabaseError(msg) => AppointmentError::DatabaseError(msg),
                _ => AppointmentError::SlotUnavailable,
            })?;
        if slot.doctor_id != request.doctor_id {
            ledger.release_lock(request.slot_id, patient_id).await;
            return Err(AppointmentError::SlotUnavailable);
        }

        // Step 3: fee schedule. Video appointments use the video fee when
        // the doctor has one, falling back to the standard fee.
        let is_video = request.appointment_type == crate::models::AppointmentType::Video;
        let fee = doctor.fee_for_video(is_video);

        let appointment_id = Uuid::new_v4();

        // Step 4: authorize the hold. Funds are reserved, not captured.
        let hold = match self.payments.authorize_hold(
            to_cents(fee),
            BOOKING_CURRENCY,
            &appointment_id.to_string(),
        ).await {
            Ok(hold) => hold,
            Err(e) => {
                warn!("Payment authorization failed for slot {}: {}", request.slot_id, e);
                ledger.release_lock(request.slot_id, patient_id).await;
                return Err(AppointmentError::PaymentAuthorizationFailed(e.to_string()));
            }
        };

        // Step 5: persist the appointment, pending on both axes.
        let now = Utc::now();
        let appointment = Appointment {
            id: appointment_id,
            patient_id,
            doctor_id: request.doctor_id,
            slot_id: request.slot_id,
            date: slot.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            appointment_type: request.appointment_type,
            status: AppointmentStatus::Pending,
            reason: request.reason,
            symptoms: request.symptoms,
            payment: PaymentInfo {
                status: PaymentStatus::Pending,
                amount: fee,
                currency: BOOKING_CURRENCY.to_string(),
                external_reference: Some(hold.id.clone()),
                paid_at: None,
                refunded_at: None,
            },
            video_session: VideoSession::default(),
            prescription_id: None,
            rating: None,
            cancelled_by: None,
            cancellation_reason: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };

        let appointment = match self.appointments.insert(appointment).await {
            Ok(appointment) => appointment,
            Err(e) => {
                error!("Failed to persist appointment for slot {}: {}", request.slot_id, e);
                self.cancel_hold_best_effort(&hold.id).await;
                ledger.release_lock(request.slot_id, patient_id).await;
                return Err(e);
            }
        };

        // Step 6: commit the slot. This is the point of no return; on
        // failure every earlier step is compensated in reverse.
        if let Err(e) = ledger.commit_booking(request.slot_id, patient_id).await {
            error!("Slot commit failed for appointment {}: {}", appointment.id, e);
            if let Err(rollback) = self.appointments.delete(appointment.id).await {
                error!("Rollback of appointment {} failed: {}", appointment.id, rollback);
            }
            self.cancel_hold_best_effort(&hold.id).await;
            ledger.release_lock(request.slot_id, patient_id).await;
            return Err(AppointmentError::SlotUnavailable);
        }

        info!(
            "Appointment {} booked: patient {}, doctor {}, slot {}",
            appointment.id, patient_id, request.doctor_id, request.slot_id
        );
        self.notifications.dispatch(NotificationEvent::AppointmentBooked {
            appointment_id: appointment.id,
            patient_id,
            doctor_id: request.doctor_id,
            scheduled_at: appointment.scheduled_start(),
        });

        Ok(appointment)
    }

    /// Flip the appointment to confirmed once the payment hold is in
    /// place. Safe to drive from the client flow and a webhook at once:
    /// the guarded update lets exactly one caller through.
    pub async fn confirm_payment(
        &self,
        appointment_id: Uuid,
        caller: &User,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.appointments.fetch(appointment_id).await?
            .ok_or(AppointmentError::NotFound)?;

        if !is_owning_patient(caller, &appointment) && !caller.is_admin() {
            return Err(AppointmentError::NotAuthorized);
        }

        match self.appointments.confirm_payment(appointment_id).await? {
            Some(confirmed) => {
                info!("Appointment {} confirmed", appointment_id);
                self.notifications.dispatch(NotificationEvent::AppointmentConfirmed {
                    appointment_id,
                    patient_id: confirmed.patient_id,
                    doctor_id: confirmed.doctor_id,
                });
                Ok(confirmed)
            }
            None => Err(AppointmentError::AlreadyProcessed),
        }
    }

    async fn cancel_hold_best_effort(&self, hold_id: &str) {
        if let Err(e) = self.payments.cancel_hold(hold_id).await {
            error!("Failed to cancel payment hold {}: {}", hold_id, e);
        }
    }
}

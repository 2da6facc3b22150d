// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use doctor_cell::services::RatingService;
use doctor_cell::store::{DoctorStore, PostgrestDoctorStore};
use notification_cell::dispatch::NotificationDispatcher;
use notification_cell::models::NotificationEvent;
use payment_cell::gateway::PaymentGateway;
use payment_cell::stripe::StripeClient;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use slot_cell::store::{PostgrestSlotStore, SlotStore};
use video_cell::daily::DailyClient;
use video_cell::provider::VideoRoomProvider;

use crate::models::{
    Appointment, AppointmentError, AppointmentRating, AppointmentStatus, CancelledBy,
    PaymentStatus, RateAppointmentRequest,
};
use crate::services::{is_owning_doctor, is_owning_patient};
use crate::store::{AppointmentStore, PostgrestAppointmentStore, TransitionChanges};

/// The appointment state machine. Every transition is a guarded storage
/// update, so racing callers resolve to one winner; payment and slot
/// side effects run only on the winner's path, which makes them
/// exactly-once.
pub struct AppointmentLifecycleService {
    doctors: Arc<dyn DoctorStore>,
    slots: Arc<dyn SlotStore>,
    appointments: Arc<dyn AppointmentStore>,
    payments: Arc<dyn PaymentGateway>,
    video: Arc<dyn VideoRoomProvider>,
    notifications: NotificationDispatcher,
}

impl AppointmentLifecycleService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            doctors: Arc::new(PostgrestDoctorStore::new(supabase.clone())),
            slots: Arc::new(PostgrestSlotStore::new(supabase.clone())),
            appointments: Arc::new(PostgrestAppointmentStore::new(supabase)),
            payments: Arc::new(StripeClient::new(config)),
            video: Arc::new(DailyClient::new(config)),
            notifications: NotificationDispatcher::new(config),
        }
    }

    pub fn with_parts(
        doctors: Arc<dyn DoctorStore>,
        slots: Arc<dyn SlotStore>,
        appointments: Arc<dyn AppointmentStore>,
        payments: Arc<dyn PaymentGateway>,
        video: Arc<dyn VideoRoomProvider>,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self { doctors, slots, appointments, payments, video, notifications }
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        caller: &User,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.appointments.fetch(appointment_id).await?
            .ok_or(AppointmentError::NotFound)?;
        self.require_participant(caller, &appointment).await?;
        Ok(appointment)
    }

    pub async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        self.appointments.list_for_patient(patient_id).await
    }

    pub async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        self.appointments.list_for_doctor(doctor_id).await
    }

    /// Doctor completes the visit: capture the payment hold and, for video
    /// appointments, tear the room down.
    pub async fn complete(
        &self,
        appointment_id: Uuid,
        caller: &User,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.appointments.fetch(appointment_id).await?
            .ok_or(AppointmentError::NotFound)?;

        if !is_owning_doctor(&self.doctors, caller, &appointment).await? && !caller.is_admin() {
            return Err(AppointmentError::NotAuthorized);
        }

        let completed = self.appointments.transition(
            appointment_id,
            &[AppointmentStatus::Confirmed, AppointmentStatus::InProgress],
            AppointmentStatus::Completed,
            TransitionChanges::default(),
        ).await?;

        let mut completed = match completed {
            Some(appointment) => appointment,
            None => return Err(self.invalid_transition(appointment_id).await),
        };

        if completed.payment.status == PaymentStatus::Held {
            completed = self.capture_payment(completed).await;
        }

        if completed.is_video() {
            completed = self.close_video_session(completed).await;
        }

        info!("Appointment {} completed", appointment_id);
        self.notifications.dispatch(NotificationEvent::AppointmentCompleted {
            appointment_id,
            patient_id: completed.patient_id,
            doctor_id: completed.doctor_id,
        });

        Ok(completed)
    }

    /// Cancel from pending, confirmed, or in_progress. The status guard
    /// makes the capacity release and the refund exactly-once; a pending
    /// payment hold is left pending for the provider to expire.
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        caller: &User,
        reason: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.appointments.fetch(appointment_id).await?
            .ok_or(AppointmentError::NotFound)?;

        let cancelled_by = self.cancellation_role(caller, &appointment).await?;

        let cancelled = self.appointments.transition(
            appointment_id,
            &[AppointmentStatus::Pending, AppointmentStatus::Confirmed, AppointmentStatus::InProgress],
            AppointmentStatus::Cancelled,
            TransitionChanges {
                cancelled_by: Some(cancelled_by),
                cancellation_reason: reason,
                cancelled_at: Some(Utc::now()),
            },
        ).await?;

        let mut cancelled = match cancelled {
            Some(appointment) => appointment,
            None => return Err(self.invalid_transition(appointment_id).await),
        };

        // Winner-only: the seat goes back exactly once.
        if let Err(e) = self.slots.release_capacity(cancelled.slot_id).await {
            warn!("Failed to release capacity for slot {}: {}", cancelled.slot_id, e);
        }

        let refunded = matches!(cancelled.payment.status, PaymentStatus::Held | PaymentStatus::Captured);
        if refunded {
            cancelled = self.refund_payment(cancelled).await;
        }

        if cancelled.is_video() && cancelled.video_session.room_name.is_some() {
            cancelled = self.close_video_session(cancelled).await;
        }

        info!("Appointment {} cancelled by {:?}", appointment_id, cancelled_by);
        self.notifications.dispatch(NotificationEvent::AppointmentCancelled {
            appointment_id,
            patient_id: cancelled.patient_id,
            doctor_id: cancelled.doctor_id,
            cancelled_by: Uuid::parse_str(&caller.id).unwrap_or(Uuid::nil()),
            refunded,
        });

        Ok(cancelled)
    }

    /// Doctor marks a confirmed appointment as missed.
    pub async fn mark_no_show(
        &self,
        appointment_id: Uuid,
        caller: &User,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.appointments.fetch(appointment_id).await?
            .ok_or(AppointmentError::NotFound)?;

        if !is_owning_doctor(&self.doctors, caller, &appointment).await? && !caller.is_admin() {
            return Err(AppointmentError::NotAuthorized);
        }

        let updated = self.appointments.transition(
            appointment_id,
            &[AppointmentStatus::Confirmed],
            AppointmentStatus::NoShow,
            TransitionChanges::default(),
        ).await?;

        match updated {
            Some(appointment) => {
                info!("Appointment {} marked no-show", appointment_id);
                Ok(appointment)
            }
            None => Err(self.invalid_transition(appointment_id).await),
        }
    }

    /// Patient rates a completed visit, once. The doctor's aggregate is
    /// only updated on the winning write.
    pub async fn rate(
        &self,
        appointment_id: Uuid,
        caller: &User,
        request: RateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.appointments.fetch(appointment_id).await?
            .ok_or(AppointmentError::NotFound)?;

        if !is_owning_patient(caller, &appointment) {
            return Err(AppointmentError::NotAuthorized);
        }
        if !(1..=5).contains(&request.score) {
            return Err(AppointmentError::InvalidRating);
        }

        let rating = AppointmentRating {
            score: request.score,
            review: request.review,
            rated_at: Utc::now(),
        };

        let rated = match self.appointments.set_rating(appointment_id, rating).await? {
            Some(appointment) => appointment,
            None => {
                // Guard failed: not completed yet, or already rated.
                let current = self.appointments.fetch(appointment_id).await?
                    .ok_or(AppointmentError::NotFound)?;
                if current.status != AppointmentStatus::Completed {
                    return Err(AppointmentError::InvalidTransition(current.status));
                }
                return Err(AppointmentError::AlreadyRated);
            }
        };

        let rating_service = RatingService::with_store(self.doctors.clone());
        if let Err(e) = rating_service.record_rating(rated.doctor_id, request.score).await {
            warn!("Failed to update doctor {} rating aggregate: {}", rated.doctor_id, e);
        }

        info!("Appointment {} rated {}", appointment_id, request.score);
        Ok(rated)
    }

    async fn require_participant(
        &self,
        caller: &User,
        appointment: &Appointment,
    ) -> Result<(), AppointmentError> {
        if caller.is_admin() || is_owning_patient(caller, appointment) {
            return Ok(());
        }
        if is_owning_doctor(&self.doctors, caller, appointment).await? {
            return Ok(());
        }
        Err(AppointmentError::NotAuthorized)
    }

    async fn cancellation_role(
        &self,
        caller: &User,
        appointment: &Appointment,
    ) -> Result<CancelledBy, AppointmentError> {
        if is_owning_patient(caller, appointment) {
            return Ok(CancelledBy::Patient);
        }
        if is_owning_doctor(&self.doctors, caller, appointment).await? {
            return Ok(CancelledBy::Doctor);
        }
        if caller.is_admin() {
            return Ok(CancelledBy::Admin);
        }
        Err(AppointmentError::NotAuthorized)
    }

    async fn invalid_transition(&self, appointment_id: Uuid) -> AppointmentError {
        match self.appointments.fetch(appointment_id).await {
            Ok(Some(appointment)) => AppointmentError::InvalidTransition(appointment.status),
            Ok(None) => AppointmentError::NotFound,
            Err(e) => e,
        }
    }

    async fn capture_payment(&self, mut appointment: Appointment) -> Appointment {
        let Some(reference) = appointment.payment.external_reference.clone() else {
            return appointment;
        };

        match self.payments.capture(&reference).await {
            Ok(_) => {
                appointment.payment.status = PaymentStatus::Captured;
                appointment.payment.paid_at = Some(Utc::now());
            }
            Err(e) => {
                warn!("Capture failed for appointment {}: {}", appointment.id, e);
                appointment.payment.status = PaymentStatus::Failed;
            }
        }

        match self.appointments.update_payment(appointment.id, appointment.payment.clone()).await {
            Ok(updated) => updated,
            Err(e) => {
                warn!("Failed to persist payment update for {}: {}", appointment.id, e);
                appointment
            }
        }
    }

    async fn refund_payment(&self, mut appointment: Appointment) -> Appointment {
        let Some(reference) = appointment.payment.external_reference.clone() else {
            return appointment;
        };

        // An uncaptured hold is voided; captured funds are refunded. Either
        // way the patient ends up unbilled.
        let result = match appointment.payment.status {
            PaymentStatus::Held => self.payments.cancel_hold(&reference).await,
            PaymentStatus::Captured => self.payments.refund(&reference).await,
            _ => return appointment,
        };

        match result {
            Ok(_) => {
                appointment.payment.status = PaymentStatus::Refunded;
                appointment.payment.refunded_at = Some(Utc::now());
            }
            Err(e) => {
                warn!("Refund failed for appointment {}: {}", appointment.id, e);
            }
        }

        match self.appointments.update_payment(appointment.id, appointment.payment.clone()).await {
            Ok(updated) => updated,
            Err(e) => {
                warn!("Failed to persist payment update for {}: {}", appointment.id, e);
                appointment
            }
        }
    }

    async fn close_video_session(&self, mut appointment: Appointment) -> Appointment {
        let Some(room_name) = appointment.video_session.room_name.clone() else {
            return appointment;
        };

        if let Err(e) = self.video.end_room(&room_name).await {
            warn!("Failed to end video room {}: {}", room_name, e);
        }

        if appointment.video_session.ended_at.is_none() {
            let now = Utc::now();
            if let Some(started) = appointment.video_session.started_at {
                appointment.video_session.duration_seconds = Some((now - started).num_seconds());
            }
            appointment.video_session.ended_at = Some(now);

            match self.appointments.update_video_session(appointment.id, appointment.video_session.clone()).await {
                Ok(updated) => return updated,
                Err(e) => {
                    warn!("Failed to persist video session for {}: {}", appointment.id, e);
                }
            }
        }
        appointment
    }
}

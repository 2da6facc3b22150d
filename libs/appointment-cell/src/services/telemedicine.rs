// libs/appointment-cell/src/services/telemedicine.rs
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use doctor_cell::store::{DoctorStore, PostgrestDoctorStore};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use video_cell::models::RoomToken;
use video_cell::daily::DailyClient;
use video_cell::provider::VideoRoomProvider;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, VideoSession};
use crate::services::{is_owning_doctor, is_owning_patient};
use crate::store::{AppointmentStore, PostgrestAppointmentStore, TransitionChanges};

/// Joining opens this long before the scheduled start.
const JOIN_EARLY_MINUTES: i64 = 10;
/// And stays open this long after it.
const JOIN_LATE_MINUTES: i64 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct JoinDetails {
    pub room_url: String,
    pub token: String,
    pub is_host: bool,
}

/// Video consultations. The room is created lazily by whoever joins
/// first inside the join window; the provider treats a name collision as
/// "use the existing room", so racing joiners converge.
pub struct TelemedicineService {
    doctors: Arc<dyn DoctorStore>,
    appointments: Arc<dyn AppointmentStore>,
    video: Arc<dyn VideoRoomProvider>,
}

impl TelemedicineService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            doctors: Arc::new(PostgrestDoctorStore::new(supabase.clone())),
            appointments: Arc::new(PostgrestAppointmentStore::new(supabase)),
            video: Arc::new(DailyClient::new(config)),
        }
    }

    pub fn with_parts(
        doctors: Arc<dyn DoctorStore>,
        appointments: Arc<dyn AppointmentStore>,
        video: Arc<dyn VideoRoomProvider>,
    ) -> Self {
        Self { doctors, appointments, video }
    }

    /// Join the consultation: creates the room on first access and issues
    /// a per-caller token. The doctor joins as host.
    pub async fn join(
        &self,
        appointment_id: Uuid,
        caller: &User,
    ) -> Result<JoinDetails, AppointmentError> {
        let appointment = self.appointments.fetch(appointment_id).await?
            .ok_or(AppointmentError::NotFound)?;

        let is_doctor = is_owning_doctor(&self.doctors, caller, &appointment).await?;
        if !is_doctor && !is_owning_patient(caller, &appointment) && !caller.is_admin() {
            return Err(AppointmentError::NotAuthorized);
        }

        if !appointment.is_video() {
            return Err(AppointmentError::VideoUnavailable(
                "Not a video appointment".to_string(),
            ));
        }
        if !matches!(appointment.status, AppointmentStatus::Confirmed | AppointmentStatus::InProgress) {
            return Err(AppointmentError::InvalidTransition(appointment.status));
        }

        let start = appointment.scheduled_start();
        let window_open = start - Duration::minutes(JOIN_EARLY_MINUTES);
        let window_close = start + Duration::minutes(JOIN_LATE_MINUTES);
        let now = Utc::now();
        if now < window_open || now > window_close {
            return Err(AppointmentError::VideoUnavailable(format!(
                "Join window is {} to {}", window_open, window_close
            )));
        }

        let room_name = format!("appt-{}", appointment.id.simple());
        let room = self.video.create_room(&room_name, window_close + Duration::minutes(30)).await
            .map_err(|e| AppointmentError::ExternalServiceError(e.to_string()))?;

        if appointment.video_session.room_name.is_none() {
            let session = VideoSession {
                room_name: Some(room.name.clone()),
                room_url: Some(room.url.clone()),
                ..appointment.video_session.clone()
            };
            self.appointments.update_video_session(appointment.id, session).await?;
        }

        let participant = Uuid::parse_str(&caller.id).unwrap_or(Uuid::nil());
        let token: RoomToken = self.video.issue_token(&room.name, participant, is_doctor).await
            .map_err(|e| AppointmentError::ExternalServiceError(e.to_string()))?;

        info!("Participant {} joined room for appointment {}", caller.id, appointment_id);
        Ok(JoinDetails {
            room_url: room.url,
            token: token.token,
            is_host: is_doctor,
        })
    }

    /// Doctor starts the session: confirmed -> in_progress, started_at
    /// recorded.
    pub async fn start_session(
        &self,
        appointment_id: Uuid,
        caller: &User,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.require_video_doctor(appointment_id, caller).await?;

        let started = self.appointments.transition(
            appointment.id,
            &[AppointmentStatus::Confirmed],
            AppointmentStatus::InProgress,
            TransitionChanges::default(),
        ).await?;

        let started = match started {
            Some(appointment) => appointment,
            None => {
                let current = self.appointments.fetch(appointment_id).await?
                    .ok_or(AppointmentError::NotFound)?;
                return Err(AppointmentError::InvalidTransition(current.status));
            }
        };

        let session = VideoSession {
            started_at: Some(Utc::now()),
            ..started.video_session.clone()
        };
        let started = self.appointments.update_video_session(started.id, session).await?;

        info!("Video session started for appointment {}", appointment_id);
        Ok(started)
    }

    /// Doctor ends the session: room torn down best-effort, duration
    /// recorded. Completion (and payment capture) is a separate call.
    pub async fn end_session(
        &self,
        appointment_id: Uuid,
        caller: &User,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.require_video_doctor(appointment_id, caller).await?;

        let Some(room_name) = appointment.video_session.room_name.clone() else {
            return Err(AppointmentError::VideoUnavailable(
                "No video session to end".to_string(),
            ));
        };

        if let Err(e) = self.video.end_room(&room_name).await {
            tracing::warn!("Failed to end video room {}: {}", room_name, e);
        }

        let now = Utc::now();
        let duration = appointment.video_session.started_at
            .map(|started| (now - started).num_seconds());
        let session = VideoSession {
            ended_at: Some(now),
            duration_seconds: duration,
            ..appointment.video_session.clone()
        };
        let updated = self.appointments.update_video_session(appointment.id, session).await?;

        info!("Video session ended for appointment {}", appointment_id);
        Ok(updated)
    }

    async fn require_video_doctor(
        &self,
        appointment_id: Uuid,
        caller: &User,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.appointments.fetch(appointment_id).await?
            .ok_or(AppointmentError::NotFound)?;

        if !appointment.is_video() {
            return Err(AppointmentError::VideoUnavailable(
                "Not a video appointment".to_string(),
            ));
        }
        if !is_owning_doctor(&self.doctors, caller, &appointment).await? && !caller.is_admin() {
            return Err(AppointmentError::NotAuthorized);
        }
        Ok(appointment)
    }
}

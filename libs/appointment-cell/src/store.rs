// libs/appointment-cell/src/store.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentError, AppointmentRating, AppointmentStatus, CancelledBy,
    PaymentInfo, VideoSession,
};

/// Cancellation metadata written together with a status transition.
#[derive(Debug, Clone, Default)]
pub struct TransitionChanges {
    pub cancelled_by: Option<CancelledBy>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Storage seam for appointments. The status transition and the payment
/// confirmation are guarded compare-and-set operations so exactly one of
/// any set of racing callers wins; follow-up writes (payment fields,
/// video session, ratings on the winner path) are plain updates.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, AppointmentError>;

    async fn fetch(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError>;

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError>;

    /// Physical delete. Only the booking saga may call this, to roll back
    /// a just-created record whose slot commit failed. Every later removal
    /// is a cancellation status, never a delete.
    async fn delete(&self, id: Uuid) -> Result<(), AppointmentError>;

    /// Compound CAS: `status pending -> confirmed` and `payment.status
    /// pending -> held` in one statement. `None` when either guard fails.
    async fn confirm_payment(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    /// Guarded status transition. `None` when the current status is not in
    /// `allowed_from`; the caller maps that to `InvalidTransition`.
    async fn transition(
        &self,
        id: Uuid,
        allowed_from: &[AppointmentStatus],
        to: AppointmentStatus,
        changes: TransitionChanges,
    ) -> Result<Option<Appointment>, AppointmentError>;

    async fn update_payment(&self, id: Uuid, payment: PaymentInfo) -> Result<Appointment, AppointmentError>;

    async fn update_video_session(&self, id: Uuid, session: VideoSession) -> Result<Appointment, AppointmentError>;

    /// Guarded: writes the rating only while the appointment is completed
    /// and unrated. `None` when the guard fails.
    async fn set_rating(&self, id: Uuid, rating: AppointmentRating) -> Result<Option<Appointment>, AppointmentError>;
}

// ==============================================================================
// POSTGREST-BACKED STORE
// ==============================================================================

pub struct PostgrestAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl PostgrestAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn representation_headers() -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));
        headers
    }

    fn parse(row: Value) -> Result<Appointment, AppointmentError> {
        serde_json::from_value(row)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    async fn patch(&self, path: &str, body: Value) -> Result<Vec<Value>, AppointmentError> {
        self.supabase.request_with_headers(
            Method::PATCH,
            path,
            None,
            Some(body),
            Some(Self::representation_headers()),
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }
}

#[async_trait]
impl AppointmentStore for PostgrestAppointmentStore {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let body = serde_json::to_value(&appointment)
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            None,
            Some(body),
            Some(Self::representation_headers()),
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next()
            .ok_or_else(|| AppointmentError::DatabaseError("Insert returned no row".to_string()))?;
        Self::parse(row)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result.into_iter().next().map(Self::parse).transpose()
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&order=date.desc,start_time.desc",
            patient_id
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result.into_iter().map(Self::parse).collect()
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&order=date.desc,start_time.desc",
            doctor_id
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result.into_iter().map(Self::parse).collect()
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let _: Vec<Value> = self.supabase.request(
            Method::DELETE,
            &path,
            None,
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    async fn confirm_payment(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        // RPC: one UPDATE guarded on both the appointment status and the
        // nested payment status, RETURNING the row.
        let body = json!({ "p_appointment_id": id });

        let result: Vec<Value> = self.supabase.request(
            Method::POST,
            "/rest/v1/rpc/confirm_appointment_payment",
            None,
            Some(body),
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result.into_iter().next().map(Self::parse).transpose()
    }

    async fn transition(
        &self,
        id: Uuid,
        allowed_from: &[AppointmentStatus],
        to: AppointmentStatus,
        changes: TransitionChanges,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let from_list = allowed_from.iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let path = format!("/rest/v1/appointments?id=eq.{}&status=in.({})", id, from_list);

        let mut body = json!({
            "status": to,
            "updated_at": Utc::now().to_rfc3339(),
        });
        if let Some(by) = changes.cancelled_by {
            body["cancelled_by"] = json!(by);
        }
        if let Some(reason) = changes.cancellation_reason {
            body["cancellation_reason"] = json!(reason);
        }
        if let Some(at) = changes.cancelled_at {
            body["cancelled_at"] = json!(at);
        }

        let result = self.patch(&path, body).await?;
        result.into_iter().next().map(Self::parse).transpose()
    }

    async fn update_payment(&self, id: Uuid, payment: PaymentInfo) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let body = json!({
            "payment": payment,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let result = self.patch(&path, body).await?;
        let row = result.into_iter().next().ok_or(AppointmentError::NotFound)?;
        Self::parse(row)
    }

    async fn update_video_session(&self, id: Uuid, session: VideoSession) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let body = json!({
            "video_session": session,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let result = self.patch(&path, body).await?;
        let row = result.into_iter().next().ok_or(AppointmentError::NotFound)?;
        Self::parse(row)
    }

    async fn set_rating(&self, id: Uuid, rating: AppointmentRating) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=eq.completed&rating=is.null",
            id
        );
        let body = json!({
            "rating": rating,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let result = self.patch(&path, body).await?;
        result.into_iter().next().map(Self::parse).transpose()
    }
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

/// Mutex-serialized map with the same atomicity contract as the PostgREST
/// store. Used by tests and local runs without a database.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: Mutex<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.appointments.lock().await.len()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        self.appointments.lock().await.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.appointments.lock().await.get(&id).cloned())
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments = self.appointments.lock().await;
        let mut matching: Vec<Appointment> = appointments.values()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect();
        matching.sort_by_key(|a| std::cmp::Reverse((a.date, a.start_time)));
        Ok(matching)
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments = self.appointments.lock().await;
        let mut matching: Vec<Appointment> = appointments.values()
            .filter(|a| a.doctor_id == doctor_id)
            .cloned()
            .collect();
        matching.sort_by_key(|a| std::cmp::Reverse((a.date, a.start_time)));
        Ok(matching)
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppointmentError> {
        self.appointments.lock().await.remove(&id);
        Ok(())
    }

    async fn confirm_payment(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let mut appointments = self.appointments.lock().await;
        let appointment = appointments.get_mut(&id).ok_or(AppointmentError::NotFound)?;

        if appointment.status != AppointmentStatus::Pending
            || appointment.payment.status != crate::models::PaymentStatus::Pending
        {
            return Ok(None);
        }

        appointment.status = AppointmentStatus::Confirmed;
        appointment.payment.status = crate::models::PaymentStatus::Held;
        appointment.updated_at = Utc::now();
        Ok(Some(appointment.clone()))
    }

    async fn transition(
        &self,
        id: Uuid,
        allowed_from: &[AppointmentStatus],
        to: AppointmentStatus,
        changes: TransitionChanges,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let mut appointments = self.appointments.lock().await;
        let appointment = appointments.get_mut(&id).ok_or(AppointmentError::NotFound)?;

        if !allowed_from.contains(&appointment.status) {
            return Ok(None);
        }

        appointment.status = to;
        if changes.cancelled_by.is_some() {
            appointment.cancelled_by = changes.cancelled_by;
        }
        if changes.cancellation_reason.is_some() {
            appointment.cancellation_reason = changes.cancellation_reason;
        }
        if changes.cancelled_at.is_some() {
            appointment.cancelled_at = changes.cancelled_at;
        }
        appointment.updated_at = Utc::now();
        Ok(Some(appointment.clone()))
    }

    async fn update_payment(&self, id: Uuid, payment: PaymentInfo) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.lock().await;
        let appointment = appointments.get_mut(&id).ok_or(AppointmentError::NotFound)?;
        appointment.payment = payment;
        appointment.updated_at = Utc::now();
        Ok(appointment.clone())
    }

    async fn update_video_session(&self, id: Uuid, session: VideoSession) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.lock().await;
        let appointment = appointments.get_mut(&id).ok_or(AppointmentError::NotFound)?;
        appointment.video_session = session;
        appointment.updated_at = Utc::now();
        Ok(appointment.clone())
    }

    async fn set_rating(&self, id: Uuid, rating: AppointmentRating) -> Result<Option<Appointment>, AppointmentError> {
        let mut appointments = self.appointments.lock().await;
        let appointment = appointments.get_mut(&id).ok_or(AppointmentError::NotFound)?;

        if appointment.status != AppointmentStatus::Completed || appointment.rating.is_some() {
            return Ok(None);
        }

        appointment.rating = Some(rating);
        appointment.updated_at = Utc::now();
        Ok(Some(appointment.clone()))
    }
}

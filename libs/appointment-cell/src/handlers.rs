// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, State, Extension},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use doctor_cell::services::DoctorService;
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AppointmentError, BookAppointmentRequest, CancelAppointmentRequest, RateAppointmentRequest,
};
use crate::services::{AppointmentLifecycleService, BookingCoordinator, TelemedicineService};

fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::DoctorUnavailable => AppError::Conflict("Doctor is not available for booking".to_string()),
        AppointmentError::SlotUnavailable => AppError::Conflict("Slot is not available".to_string()),
        AppointmentError::AlreadyProcessed => AppError::Conflict("Operation already processed".to_string()),
        AppointmentError::AlreadyRated => AppError::Conflict("Appointment has already been rated".to_string()),
        AppointmentError::InvalidTransition(status) => {
            AppError::Conflict(format!("Invalid transition from status {}", status))
        }
        AppointmentError::PaymentAuthorizationFailed(msg) => {
            AppError::BadRequest(format!("Payment authorization failed: {}", msg))
        }
        AppointmentError::InvalidRating => AppError::BadRequest("Rating score must be 1 to 5".to_string()),
        AppointmentError::VideoUnavailable(msg) => AppError::BadRequest(msg),
        AppointmentError::NotAuthorized => AppError::Forbidden("Not authorized for this appointment".to_string()),
        AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        AppointmentError::ExternalServiceError(msg) => AppError::ExternalService(msg),
    }
}

fn caller_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("Invalid user id in token".to_string()))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = caller_uuid(&user)?;

    let coordinator = BookingCoordinator::new(&state);
    let appointment = coordinator.book(patient_id, request).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointment": appointment,
        "message": "Appointment booked"
    })))
}

#[axum::debug_handler]
pub async fn confirm_payment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let coordinator = BookingCoordinator::new(&state);
    let appointment = coordinator.confirm_payment(appointment_id, &user).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointment": appointment,
        "message": "Payment confirmed"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentLifecycleService::new(&state);
    let appointment = service.get_appointment(appointment_id, &user).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({ "appointment": appointment })))
}

/// The caller's own appointments as a patient.
#[axum::debug_handler]
pub async fn list_my_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let patient_id = caller_uuid(&user)?;

    let service = AppointmentLifecycleService::new(&state);
    let appointments = service.list_for_patient(patient_id).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "count": appointments.len(),
        "appointments": appointments,
    })))
}

#[axum::debug_handler]
pub async fn list_doctor_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        let doctor = DoctorService::new(&state).get_doctor(doctor_id).await
            .map_err(|_| AppError::NotFound("Doctor not found".to_string()))?;
        if doctor.user_id.to_string() != user.id {
            return Err(AppError::Forbidden("Not authorized to view this doctor's appointments".to_string()));
        }
    }

    let service = AppointmentLifecycleService::new(&state);
    let appointments = service.list_for_doctor(doctor_id).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "count": appointments.len(),
        "appointments": appointments,
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentLifecycleService::new(&state);
    let appointment = service.cancel(appointment_id, &user, request.reason).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointment": appointment,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentLifecycleService::new(&state);
    let appointment = service.complete(appointment_id, &user).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointment": appointment,
        "message": "Appointment completed"
    })))
}

#[axum::debug_handler]
pub async fn mark_no_show(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentLifecycleService::new(&state);
    let appointment = service.mark_no_show(appointment_id, &user).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointment": appointment,
        "message": "Appointment marked as no-show"
    })))
}

#[axum::debug_handler]
pub async fn rate_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<RateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentLifecycleService::new(&state);
    let appointment = service.rate(appointment_id, &user, request).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointment": appointment,
        "message": "Rating recorded"
    })))
}

#[axum::debug_handler]
pub async fn join_video_session(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = TelemedicineService::new(&state);
    let details = service.join(appointment_id, &user).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({ "session": details })))
}

#[axum::debug_handler]
pub async fn start_video_session(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = TelemedicineService::new(&state);
    let appointment = service.start_session(appointment_id, &user).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointment": appointment,
        "message": "Video session started"
    })))
}

#[axum::debug_handler]
pub async fn end_video_session(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = TelemedicineService::new(&state);
    let appointment = service.end_session(appointment_id, &user).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointment": appointment,
        "message": "Video session ended"
    })))
}

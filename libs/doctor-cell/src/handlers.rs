// libs/doctor-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, State, Extension},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{DoctorError, UpdateAcceptingRequest};
use crate::services::DoctorService;

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);

    let doctor = service.get_doctor(doctor_id).await
        .map_err(|e| match e {
            DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
            _ => AppError::Internal(e.to_string()),
        })?;

    Ok(Json(json!({ "doctor": doctor })))
}

/// Toggle whether the doctor accepts new bookings. Doctor-only; admins may
/// flip the flag on any doctor.
#[axum::debug_handler]
pub async fn update_accepting(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAcceptingRequest>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);

    let doctor = service.get_doctor(doctor_id).await
        .map_err(|e| match e {
            DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
            _ => AppError::Internal(e.to_string()),
        })?;

    let is_owner = doctor.user_id.to_string() == user.id;
    if !is_owner && !user.is_admin() {
        return Err(AppError::Forbidden("Not authorized to update this doctor".to_string()));
    }

    let updated = service.set_accepting(doctor_id, request.is_accepting_appointments).await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "doctor": updated,
        "message": "Doctor availability updated"
    })))
}

// libs/slot-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, Extension},
    Json,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use doctor_cell::services::DoctorService;
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{BlockSlotRequest, BulkGenerateRequest, CreateSlotRequest, SlotError};
use crate::services::SlotScheduleService;

#[derive(Debug, Deserialize)]
pub struct SlotListQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

fn map_slot_error(e: SlotError) -> AppError {
    match e {
        SlotError::NotFound => AppError::NotFound("Slot not found".to_string()),
        SlotError::DuplicateSlot => AppError::Conflict("Slot already exists at this time".to_string()),
        SlotError::SlotBooked => AppError::Conflict("Slot has active bookings".to_string()),
        SlotError::Unavailable => AppError::Conflict("Slot is not available".to_string()),
        SlotError::InvalidSlot(msg) => AppError::BadRequest(msg),
        SlotError::DatabaseError(msg) => AppError::Database(msg),
    }
}

async fn require_doctor_owner(
    state: &AppConfig,
    doctor_id: Uuid,
    user: &User,
) -> Result<(), AppError> {
    if user.is_admin() {
        return Ok(());
    }
    let doctor = DoctorService::new(state).get_doctor(doctor_id).await
        .map_err(|_| AppError::NotFound("Doctor not found".to_string()))?;
    if doctor.user_id.to_string() != user.id {
        return Err(AppError::Forbidden("Not authorized to manage this doctor's slots".to_string()));
    }
    Ok(())
}

/// Public listing of slots a patient could book right now.
#[axum::debug_handler]
pub async fn list_open_slots(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotListQuery>,
) -> Result<Json<Value>, AppError> {
    let today = Utc::now().date_naive();
    let from = query.from.unwrap_or(today);
    let to = query.to.unwrap_or(from + Duration::days(14));

    let service = SlotScheduleService::new(&state);
    let slots = service.list_open_slots(doctor_id, from, to).await
        .map_err(map_slot_error)?;

    Ok(Json(json!({
        "count": slots.len(),
        "slots": slots,
    })))
}

#[axum::debug_handler]
pub async fn create_slot(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateSlotRequest>,
) -> Result<Json<Value>, AppError> {
    require_doctor_owner(&state, doctor_id, &user).await?;

    let service = SlotScheduleService::new(&state);
    let slot = service.create_slot(doctor_id, request).await
        .map_err(map_slot_error)?;

    Ok(Json(json!({ "slot": slot, "message": "Slot created" })))
}

/// Generate slots from the doctor's weekly availability template.
#[axum::debug_handler]
pub async fn bulk_generate_slots(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<BulkGenerateRequest>,
) -> Result<Json<Value>, AppError> {
    require_doctor_owner(&state, doctor_id, &user).await?;

    let doctor = DoctorService::new(&state).get_doctor(doctor_id).await
        .map_err(|_| AppError::NotFound("Doctor not found".to_string()))?;

    let service = SlotScheduleService::new(&state);
    let summary = service.bulk_generate(
        doctor_id,
        &doctor.availability,
        doctor.slot_duration_minutes,
        request.start_date,
        request.end_date,
        request.max_capacity,
    ).await.map_err(map_slot_error)?;

    Ok(Json(json!({
        "created": summary.created,
        "skipped": summary.skipped,
        "message": "Slot generation complete"
    })))
}

#[axum::debug_handler]
pub async fn block_slot(
    State(state): State<Arc<AppConfig>>,
    Path(slot_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<BlockSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let service = SlotScheduleService::new(&state);
    let slot = service.get_slot(slot_id).await.map_err(map_slot_error)?;
    require_doctor_owner(&state, slot.doctor_id, &user).await?;

    let slot = service.set_blocked(slot_id, request.blocked, request.reason).await
        .map_err(map_slot_error)?;

    Ok(Json(json!({ "slot": slot })))
}

#[axum::debug_handler]
pub async fn delete_slot(
    State(state): State<Arc<AppConfig>>,
    Path(slot_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = SlotScheduleService::new(&state);
    let slot = service.get_slot(slot_id).await.map_err(map_slot_error)?;
    require_doctor_owner(&state, slot.doctor_id, &user).await?;

    service.delete_slot(slot_id).await.map_err(map_slot_error)?;

    Ok(Json(json!({ "message": "Slot deleted" })))
}

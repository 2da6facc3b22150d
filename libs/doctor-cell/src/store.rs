// libs/doctor-cell/src/store.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{Doctor, DoctorError, RatingAggregate};

/// Storage seam for doctor records. The rating mutation is part of the seam
/// so both implementations can apply it as one atomic operation rather than
/// a read-modify-write pair.
#[async_trait]
pub trait DoctorStore: Send + Sync {
    async fn fetch(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DoctorError>;

    async fn set_accepting(&self, doctor_id: Uuid, accepting: bool) -> Result<Doctor, DoctorError>;

    /// Atomic increment-and-reweight of the rating aggregate.
    async fn apply_rating(&self, doctor_id: Uuid, score: i32) -> Result<RatingAggregate, DoctorError>;
}

// ==============================================================================
// POSTGREST-BACKED STORE
// ==============================================================================

pub struct PostgrestDoctorStore {
    supabase: Arc<SupabaseClient>,
}

impl PostgrestDoctorStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn representation_headers() -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));
        headers
    }
}

#[async_trait]
impl DoctorStore for PostgrestDoctorStore {
    async fn fetch(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DoctorError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        match result.into_iter().next() {
            Some(row) => {
                let doctor = serde_json::from_value(row)
                    .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse doctor: {}", e)))?;
                Ok(Some(doctor))
            }
            None => Ok(None),
        }
    }

    async fn set_accepting(&self, doctor_id: Uuid, accepting: bool) -> Result<Doctor, DoctorError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let body = json!({
            "is_accepting_appointments": accepting,
            "updated_at": chrono::Utc::now().to_rfc3339(),
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(body),
            Some(Self::representation_headers()),
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(DoctorError::NotFound)?;
        serde_json::from_value(row)
            .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse doctor: {}", e)))
    }

    async fn apply_rating(&self, doctor_id: Uuid, score: i32) -> Result<RatingAggregate, DoctorError> {
        // Single SQL statement server-side: UPDATE ... SET rating = reweight(rating, score)
        // RETURNING rating, so concurrent callers serialize on the row.
        let body = json!({
            "p_doctor_id": doctor_id,
            "p_score": score,
        });

        let aggregate: RatingAggregate = self.supabase.request(
            Method::POST,
            "/rest/v1/rpc/record_doctor_rating",
            None,
            Some(body),
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        Ok(aggregate)
    }
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

/// Mutex-serialized map with the same atomicity contract as the PostgREST
/// store. Used by tests and local runs without a database.
#[derive(Default)]
pub struct InMemoryDoctorStore {
    doctors: Mutex<HashMap<Uuid, Doctor>>,
}

impl InMemoryDoctorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, doctor: Doctor) {
        self.doctors.lock().await.insert(doctor.id, doctor);
    }
}

#[async_trait]
impl DoctorStore for InMemoryDoctorStore {
    async fn fetch(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DoctorError> {
        Ok(self.doctors.lock().await.get(&doctor_id).cloned())
    }

    async fn set_accepting(&self, doctor_id: Uuid, accepting: bool) -> Result<Doctor, DoctorError> {
        let mut doctors = self.doctors.lock().await;
        let doctor = doctors.get_mut(&doctor_id).ok_or(DoctorError::NotFound)?;
        doctor.is_accepting_appointments = accepting;
        doctor.updated_at = chrono::Utc::now();
        Ok(doctor.clone())
    }

    async fn apply_rating(&self, doctor_id: Uuid, score: i32) -> Result<RatingAggregate, DoctorError> {
        let mut doctors = self.doctors.lock().await;
        let doctor = doctors.get_mut(&doctor_id).ok_or(DoctorError::NotFound)?;
        doctor.rating = doctor.rating.with_score(score);
        doctor.updated_at = chrono::Utc::now();
        Ok(doctor.rating)
    }
}

// libs/doctor-cell/src/services/rating.rs
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{DoctorError, RatingAggregate};
use crate::store::{DoctorStore, PostgrestDoctorStore};

/// Recomputes a doctor's running rating average when a completed appointment
/// receives a score. The reweight goes through the store's atomic
/// `apply_rating`, so concurrent ratings compose as if applied sequentially
/// in some order - no update is lost.
pub struct RatingService {
    store: Arc<dyn DoctorStore>,
}

impl RatingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            store: Arc::new(PostgrestDoctorStore::new(supabase)),
        }
    }

    pub fn with_store(store: Arc<dyn DoctorStore>) -> Self {
        Self { store }
    }

    pub async fn record_rating(
        &self,
        doctor_id: Uuid,
        score: i32,
    ) -> Result<RatingAggregate, DoctorError> {
        if !(1..=5).contains(&score) {
            return Err(DoctorError::InvalidRating);
        }

        let aggregate = self.store.apply_rating(doctor_id, score).await?;

        info!("Recorded rating {} for doctor {} (average now {:.1} over {})",
              score, doctor_id, aggregate.average, aggregate.count);
        Ok(aggregate)
    }
}

// libs/doctor-cell/src/services/doctor.rs
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Doctor, DoctorError};
use crate::store::{DoctorStore, PostgrestDoctorStore};

pub struct DoctorService {
    store: Arc<dyn DoctorStore>,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            store: Arc::new(PostgrestDoctorStore::new(supabase)),
        }
    }

    pub fn with_store(store: Arc<dyn DoctorStore>) -> Self {
        Self { store }
    }

    pub async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor: {}", doctor_id);
        self.store.fetch(doctor_id).await?.ok_or(DoctorError::NotFound)
    }

    pub async fn set_accepting(
        &self,
        doctor_id: Uuid,
        accepting: bool,
    ) -> Result<Doctor, DoctorError> {
        debug!("Setting accepting={} for doctor {}", accepting, doctor_id);
        self.store.set_accepting(doctor_id, accepting).await
    }
}

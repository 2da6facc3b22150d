// libs/appointment-cell/src/services/mod.rs
pub mod booking;
pub mod lifecycle;
pub mod telemedicine;

pub use booking::BookingCoordinator;
pub use lifecycle::AppointmentLifecycleService;
pub use telemedicine::{JoinDetails, TelemedicineService};

use std::sync::Arc;

use doctor_cell::store::DoctorStore;
use shared_models::auth::User;

use crate::models::{Appointment, AppointmentError};

pub(crate) fn is_owning_patient(user: &User, appointment: &Appointment) -> bool {
    appointment.patient_id.to_string() == user.id
}

pub(crate) async fn is_owning_doctor(
    doctors: &Arc<dyn DoctorStore>,
    user: &User,
    appointment: &Appointment,
) -> Result<bool, AppointmentError> {
    let doctor = doctors.fetch(appointment.doctor_id).await
        .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;
    Ok(doctor.map(|d| d.user_id.to_string() == user.id).unwrap_or(false))
}

// libs/notification-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum NotificationEvent {
    AppointmentBooked {
        appointment_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        scheduled_at: DateTime<Utc>,
    },
    AppointmentConfirmed {
        appointment_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
    },
    AppointmentCancelled {
        appointment_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        cancelled_by: Uuid,
        refunded: bool,
    },
    AppointmentCompleted {
        appointment_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
    },
}

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Notification delivery failed: {0}")]
    DeliveryFailed(String),
}

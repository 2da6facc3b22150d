pub mod handlers;
pub mod router;
pub mod models;
pub mod store;
pub mod services;

pub use models::*;
pub use services::{AppointmentLifecycleService, BookingCoordinator, TelemedicineService};
pub use store::{AppointmentStore, PostgrestAppointmentStore, InMemoryAppointmentStore};

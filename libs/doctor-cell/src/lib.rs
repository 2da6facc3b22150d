pub mod handlers;
pub mod router;
pub mod models;
pub mod store;
pub mod services;

pub use models::*;
pub use services::{DoctorService, RatingService};
pub use store::{DoctorStore, PostgrestDoctorStore, InMemoryDoctorStore};

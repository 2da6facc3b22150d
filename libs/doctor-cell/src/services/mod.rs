pub mod doctor;
pub mod rating;

pub use doctor::DoctorService;
pub use rating::RatingService;

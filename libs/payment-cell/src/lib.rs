pub mod models;
pub mod gateway;
pub mod stripe;

pub use models::*;
pub use gateway::{PaymentGateway, InMemoryPaymentGateway};
pub use stripe::StripeClient;

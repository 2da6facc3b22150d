// libs/payment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of a payment hold. Funds are authorized at booking time and
/// only captured once the appointment is confirmed; a hold that is never
/// captured is cancelled or refunded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HoldStatus {
    Pending,
    Held,
    Captured,
    Cancelled,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentHold {
    /// Provider-side identifier (a Stripe PaymentIntent id).
    pub id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: HoldStatus,
}

/// Convert a fee in major units to cents, rounding to the nearest cent.
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Payment authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("Payment capture failed: {0}")]
    CaptureFailed(String),

    #[error("Refund failed: {0}")]
    RefundFailed(String),

    #[error("Payment hold not found: {0}")]
    HoldNotFound(String),

    #[error("Payment provider is not configured")]
    NotConfigured,

    #[error("Payment provider error: {0}")]
    ProviderError(String),
}

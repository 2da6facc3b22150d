// libs/payment-cell/src/gateway.rs
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{HoldStatus, PaymentError, PaymentHold};

/// Provider seam for the hold-then-capture payment flow.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Authorize funds without capturing them. `reference` ties the hold
    /// to the appointment on the provider side.
    async fn authorize_hold(
        &self,
        amount_cents: i64,
        currency: &str,
        reference: &str,
    ) -> Result<PaymentHold, PaymentError>;

    /// Capture a previously authorized hold.
    async fn capture(&self, hold_id: &str) -> Result<PaymentHold, PaymentError>;

    /// Cancel a hold that was never captured.
    async fn cancel_hold(&self, hold_id: &str) -> Result<PaymentHold, PaymentError>;

    /// Refund a captured payment.
    async fn refund(&self, hold_id: &str) -> Result<PaymentHold, PaymentError>;
}

/// In-memory gateway for tests and local runs. Failure toggles let tests
/// drive the compensation paths.
#[derive(Default)]
pub struct InMemoryPaymentGateway {
    holds: Mutex<HashMap<String, PaymentHold>>,
    fail_authorize: AtomicBool,
    fail_capture: AtomicBool,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_authorizations(&self, fail: bool) {
        self.fail_authorize.store(fail, Ordering::SeqCst);
    }

    pub fn fail_captures(&self, fail: bool) {
        self.fail_capture.store(fail, Ordering::SeqCst);
    }

    pub async fn hold_status(&self, hold_id: &str) -> Option<HoldStatus> {
        self.holds.lock().await.get(hold_id).map(|h| h.status)
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn authorize_hold(
        &self,
        amount_cents: i64,
        currency: &str,
        _reference: &str,
    ) -> Result<PaymentHold, PaymentError> {
        if self.fail_authorize.load(Ordering::SeqCst) {
            return Err(PaymentError::AuthorizationFailed("card declined".to_string()));
        }

        let hold = PaymentHold {
            id: format!("pi_test_{}", Uuid::new_v4().simple()),
            amount_cents,
            currency: currency.to_string(),
            status: HoldStatus::Held,
        };
        self.holds.lock().await.insert(hold.id.clone(), hold.clone());
        Ok(hold)
    }

    async fn capture(&self, hold_id: &str) -> Result<PaymentHold, PaymentError> {
        if self.fail_capture.load(Ordering::SeqCst) {
            return Err(PaymentError::CaptureFailed("capture rejected".to_string()));
        }

        let mut holds = self.holds.lock().await;
        let hold = holds.get_mut(hold_id)
            .ok_or_else(|| PaymentError::HoldNotFound(hold_id.to_string()))?;
        if hold.status != HoldStatus::Held {
            return Err(PaymentError::CaptureFailed(format!(
                "hold {} is not capturable", hold_id
            )));
        }
        hold.status = HoldStatus::Captured;
        Ok(hold.clone())
    }

    async fn cancel_hold(&self, hold_id: &str) -> Result<PaymentHold, PaymentError> {
        let mut holds = self.holds.lock().await;
        let hold = holds.get_mut(hold_id)
            .ok_or_else(|| PaymentError::HoldNotFound(hold_id.to_string()))?;
        hold.status = HoldStatus::Cancelled;
        Ok(hold.clone())
    }

    async fn refund(&self, hold_id: &str) -> Result<PaymentHold, PaymentError> {
        let mut holds = self.holds.lock().await;
        let hold = holds.get_mut(hold_id)
            .ok_or_else(|| PaymentError::HoldNotFound(hold_id.to_string()))?;
        if hold.status != HoldStatus::Captured {
            return Err(PaymentError::RefundFailed(format!(
                "hold {} was never captured", hold_id
            )));
        }
        hold.status = HoldStatus::Refunded;
        Ok(hold.clone())
    }
}

// libs/payment-cell/src/stripe.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::gateway::PaymentGateway;
use crate::models::{HoldStatus, PaymentError, PaymentHold};

const STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Stripe client using manual-capture PaymentIntents: `authorize_hold`
/// creates an intent with `capture_method=manual`, so funds are reserved
/// but not moved until `capture`.
pub struct StripeClient {
    client: Client,
    base_url: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct StripeIntent {
    id: String,
    amount: i64,
    currency: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: String,
}

impl StripeClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: STRIPE_API_BASE.to_string(),
            secret_key: config.stripe_secret_key.clone(),
        }
    }

    /// Point the client at a mock server.
    pub fn with_base_url(config: &AppConfig, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
            secret_key: config.stripe_secret_key.clone(),
        }
    }

    fn map_status(status: &str) -> HoldStatus {
        match status {
            "requires_capture" => HoldStatus::Held,
            "succeeded" => HoldStatus::Captured,
            "canceled" => HoldStatus::Cancelled,
            _ => HoldStatus::Pending,
        }
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<StripeIntent, PaymentError> {
        if self.secret_key.is_empty() {
            return Err(PaymentError::NotConfigured);
        }

        let url = format!("{}{}", self.base_url, path);
        debug!("Stripe request: POST {}", path);

        let response = self.client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .map_err(|e| PaymentError::ProviderError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.json::<StripeErrorBody>().await
                .map(|b| b.error.message)
                .unwrap_or_else(|_| format!("HTTP {}", status));
            error!("Stripe error on {}: {}", path, message);
            return Err(PaymentError::ProviderError(message));
        }

        response.json::<StripeIntent>().await
            .map_err(|e| PaymentError::ProviderError(format!("Invalid Stripe response: {}", e)))
    }

    fn to_hold(intent: StripeIntent) -> PaymentHold {
        PaymentHold {
            status: Self::map_status(&intent.status),
            id: intent.id,
            amount_cents: intent.amount,
            currency: intent.currency,
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn authorize_hold(
        &self,
        amount_cents: i64,
        currency: &str,
        reference: &str,
    ) -> Result<PaymentHold, PaymentError> {
        let form = [
            ("amount", amount_cents.to_string()),
            ("currency", currency.to_string()),
            ("capture_method", "manual".to_string()),
            ("confirm", "true".to_string()),
            ("metadata[appointment_id]", reference.to_string()),
        ];

        let intent = self.post_form("/v1/payment_intents", &form).await
            .map_err(|e| match e {
                PaymentError::ProviderError(msg) => PaymentError::AuthorizationFailed(msg),
                other => other,
            })?;

        info!("Authorized hold {} for {} {}", intent.id, amount_cents, currency);
        Ok(Self::to_hold(intent))
    }

    async fn capture(&self, hold_id: &str) -> Result<PaymentHold, PaymentError> {
        let path = format!("/v1/payment_intents/{}/capture", hold_id);
        let intent = self.post_form(&path, &[]).await
            .map_err(|e| match e {
                PaymentError::ProviderError(msg) => PaymentError::CaptureFailed(msg),
                other => other,
            })?;

        info!("Captured hold {}", hold_id);
        Ok(Self::to_hold(intent))
    }

    async fn cancel_hold(&self, hold_id: &str) -> Result<PaymentHold, PaymentError> {
        let path = format!("/v1/payment_intents/{}/cancel", hold_id);
        let intent = self.post_form(&path, &[]).await?;

        info!("Cancelled hold {}", hold_id);
        Ok(Self::to_hold(intent))
    }

    async fn refund(&self, hold_id: &str) -> Result<PaymentHold, PaymentError> {
        let form = [("payment_intent", hold_id.to_string())];
        // Refund objects have their own shape; we only need success and then
        // report the hold as refunded.
        self.post_form("/v1/refunds", &form).await
            .map_err(|e| match e {
                PaymentError::ProviderError(msg) => PaymentError::RefundFailed(msg),
                other => other,
            })?;

        info!("Refunded hold {}", hold_id);
        Ok(PaymentHold {
            id: hold_id.to_string(),
            amount_cents: 0,
            currency: String::new(),
            status: HoldStatus::Refunded,
        })
    }
}

// libs/notification-cell/src/dispatch.rs
use std::sync::Arc;

use tracing::warn;

use shared_config::AppConfig;

use crate::models::NotificationEvent;
use crate::notifier::{Notifier, WebhookNotifier};

/// Fire-and-forget dispatch. Notifications ride on the side of the booking
/// flow: a delivery failure is logged and never fails the operation that
/// produced the event.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            notifier: Arc::new(WebhookNotifier::new(config)),
        }
    }

    pub fn with_notifier(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Deliver in the background and return immediately.
    pub fn dispatch(&self, event: NotificationEvent) {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.deliver(&event).await {
                warn!("Notification delivery failed: {}", e);
            }
        });
    }

    /// Deliver inline. Used where the caller wants to await delivery,
    /// mainly tests.
    pub async fn dispatch_and_wait(&self, event: NotificationEvent) {
        if let Err(e) = self.notifier.deliver(&event).await {
            warn!("Notification delivery failed: {}", e);
        }
    }
}

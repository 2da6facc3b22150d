// libs/notification-cell/src/notifier.rs
use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::debug;

use shared_config::AppConfig;

use crate::models::{NotificationError, NotificationEvent};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, event: &NotificationEvent) -> Result<(), NotificationError>;
}

/// Posts events as JSON to a configured webhook. With no URL configured
/// every delivery is a logged no-op.
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
}

impl WebhookNotifier {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            webhook_url: config.notification_webhook_url.clone(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(&self, event: &NotificationEvent) -> Result<(), NotificationError> {
        if self.webhook_url.is_empty() {
            debug!("No notification webhook configured, dropping event");
            return Ok(());
        }

        let response = self.client
            .post(&self.webhook_url)
            .json(event)
            .send()
            .await
            .map_err(|e| NotificationError::DeliveryFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotificationError::DeliveryFailed(format!(
                "HTTP {}", response.status()
            )));
        }
        Ok(())
    }
}

/// Captures delivered events for assertions in tests.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn delivered(&self) -> Vec<NotificationEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, event: &NotificationEvent) -> Result<(), NotificationError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

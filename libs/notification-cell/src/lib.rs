pub mod models;
pub mod notifier;
pub mod dispatch;

pub use models::*;
pub use notifier::{Notifier, WebhookNotifier, RecordingNotifier};
pub use dispatch::NotificationDispatcher;

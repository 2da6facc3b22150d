// libs/video-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRoom {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// A short-lived token admitting one participant into a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomToken {
    pub token: String,
    pub room_name: String,
    pub is_owner: bool,
}

#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Video room not found: {0}")]
    RoomNotFound(String),

    #[error("Video provider is not configured")]
    NotConfigured,

    #[error("Video provider error: {0}")]
    ProviderError(String),
}

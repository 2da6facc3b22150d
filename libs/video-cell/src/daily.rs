// libs/video-cell/src/daily.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{RoomToken, VideoError, VideoRoom};
use crate::provider::VideoRoomProvider;

/// Daily.co REST client.
pub struct DailyClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct DailyRoom {
    name: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct DailyToken {
    token: String,
}

impl DailyClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.daily_base_url.clone(),
            api_key: config.daily_api_key.clone(),
        }
    }

    pub fn with_base_url(config: &AppConfig, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
            api_key: config.daily_api_key.clone(),
        }
    }

    fn ensure_configured(&self) -> Result<(), VideoError> {
        if self.api_key.is_empty() {
            return Err(VideoError::NotConfigured);
        }
        Ok(())
    }

    async fn fetch_room(&self, name: &str) -> Result<VideoRoom, VideoError> {
        let url = format!("{}/rooms/{}", self.base_url, name);
        let response = self.client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| VideoError::ProviderError(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(VideoError::RoomNotFound(name.to_string()));
        }
        if !response.status().is_success() {
            return Err(VideoError::ProviderError(format!("HTTP {}", response.status())));
        }

        let room: DailyRoom = response.json().await
            .map_err(|e| VideoError::ProviderError(e.to_string()))?;
        Ok(VideoRoom { name: room.name, url: room.url, expires_at: None })
    }
}

#[async_trait]
impl VideoRoomProvider for DailyClient {
    async fn create_room(
        &self,
        name: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<VideoRoom, VideoError> {
        self.ensure_configured()?;

        let url = format!("{}/rooms", self.base_url);
        let body = json!({
            "name": name,
            "privacy": "private",
            "properties": {
                "exp": expires_at.timestamp(),
                "eject_at_room_exp": true,
            }
        });

        debug!("Creating Daily room {}", name);
        let response = self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| VideoError::ProviderError(e.to_string()))?;

        // Two joiners can race room creation; the loser gets a conflict and
        // uses the room the winner made.
        if response.status() == StatusCode::CONFLICT || response.status() == StatusCode::BAD_REQUEST {
            debug!("Daily room {} already exists, fetching it", name);
            return self.fetch_room(name).await;
        }
        if !response.status().is_success() {
            let status = response.status();
            error!("Daily room creation failed: HTTP {}", status);
            return Err(VideoError::ProviderError(format!("HTTP {}", status)));
        }

        let room: DailyRoom = response.json().await
            .map_err(|e| VideoError::ProviderError(e.to_string()))?;

        info!("Created Daily room {}", room.name);
        Ok(VideoRoom {
            name: room.name,
            url: room.url,
            expires_at: Some(expires_at),
        })
    }

    async fn issue_token(
        &self,
        room_name: &str,
        participant_id: Uuid,
        is_owner: bool,
    ) -> Result<RoomToken, VideoError> {
        self.ensure_configured()?;

        let url = format!("{}/meeting-tokens", self.base_url);
        let body = json!({
            "properties": {
                "room_name": room_name,
                "user_id": participant_id,
                "is_owner": is_owner,
            }
        });

        let response = self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| VideoError::ProviderError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(VideoError::ProviderError(format!("HTTP {}", response.status())));
        }

        let token: DailyToken = response.json().await
            .map_err(|e| VideoError::ProviderError(e.to_string()))?;

        Ok(RoomToken {
            token: token.token,
            room_name: room_name.to_string(),
            is_owner,
        })
    }

    async fn end_room(&self, room_name: &str) -> Result<(), VideoError> {
        self.ensure_configured()?;

        let url = format!("{}/rooms/{}", self.base_url, room_name);
        let response = self.client
            .delete(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| VideoError::ProviderError(e.to_string()))?;

        // Already gone is fine.
        if response.status() == StatusCode::NOT_FOUND || response.status().is_success() {
            info!("Ended Daily room {}", room_name);
            return Ok(());
        }

        Err(VideoError::ProviderError(format!("HTTP {}", response.status())))
    }
}

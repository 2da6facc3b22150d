// libs/video-cell/src/provider.rs
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{RoomToken, VideoError, VideoRoom};

/// Provider seam for telemedicine rooms.
#[async_trait]
pub trait VideoRoomProvider: Send + Sync {
    /// Create a room, or return the existing one when the name is taken.
    /// Room creation is triggered lazily by whoever joins first, so the
    /// second joiner racing the first must land on the same room.
    async fn create_room(
        &self,
        name: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<VideoRoom, VideoError>;

    /// Issue a join token. Owners can start and end the session.
    async fn issue_token(
        &self,
        room_name: &str,
        participant_id: Uuid,
        is_owner: bool,
    ) -> Result<RoomToken, VideoError>;

    /// Tear the room down. Deleting a room that is already gone succeeds.
    async fn end_room(&self, room_name: &str) -> Result<(), VideoError>;
}

/// In-memory provider for tests and local runs.
#[derive(Default)]
pub struct InMemoryVideoProvider {
    rooms: Mutex<HashMap<String, VideoRoom>>,
}

impl InMemoryVideoProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn room_exists(&self, name: &str) -> bool {
        self.rooms.lock().await.contains_key(name)
    }
}

#[async_trait]
impl VideoRoomProvider for InMemoryVideoProvider {
    async fn create_room(
        &self,
        name: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<VideoRoom, VideoError> {
        let mut rooms = self.rooms.lock().await;
        if let Some(existing) = rooms.get(name) {
            return Ok(existing.clone());
        }

        let room = VideoRoom {
            name: name.to_string(),
            url: format!("https://test.daily.co/{}", name),
            expires_at: Some(expires_at),
        };
        rooms.insert(name.to_string(), room.clone());
        Ok(room)
    }

    async fn issue_token(
        &self,
        room_name: &str,
        participant_id: Uuid,
        is_owner: bool,
    ) -> Result<RoomToken, VideoError> {
        let rooms = self.rooms.lock().await;
        if !rooms.contains_key(room_name) {
            return Err(VideoError::RoomNotFound(room_name.to_string()));
        }

        Ok(RoomToken {
            token: format!("tok_{}_{}", room_name, participant_id.simple()),
            room_name: room_name.to_string(),
            is_owner,
        })
    }

    async fn end_room(&self, room_name: &str) -> Result<(), VideoError> {
        self.rooms.lock().await.remove(room_name);
        Ok(())
    }
}

use crate::config::{http_url, LiveKitConfig};
use crate::error::VoiceError;
use livekit_api::access_token::{AccessToken, VideoGrants};
use livekit_api::services::room::{CreateRoomOptions, RoomClient};
use livekit_protocol::Room;
use std::time::Duration;

/// Server-side LiveKit access: room management and token minting.
#[derive(Debug)]
pub struct VoiceService {
    config: LiveKitConfig,
    room_client: RoomClient,
}

impl VoiceService {
    pub fn new(config: LiveKitConfig) -> Self {
        let room_client = RoomClient::with_api_key(
            &http_url(&config.url),
            &config.api_key,
            &config.api_secret,
        );
        Self {
            config,
            room_client,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.config.url.is_empty()
    }

    /// Signalling URL handed to participants.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// URL used for Room Service calls.
    pub fn http_url(&self) -> String {
        http_url(&self.config.url)
    }

    pub async fn create_room(&self, name: &str) -> Result<Room, VoiceError> {
        let options = CreateRoomOptions::default();

        self.room_client
            .create_room(name, options)
            .await
            .map_err(|e| VoiceError::RoomService(e.to_string()))
    }

    pub fn generate_join_token(
        &self,
        room_name: &str,
        participant_identity: &str,
        participant_name: &str,
    ) -> Result<String, VoiceError> {
        self.mint(
            participant_identity,
            participant_name,
            VideoGrants {
                room_join: true,
                room: room_name.to_string(),
                can_publish: true,
                can_subscribe: true,
                can_publish_data: true,
                ..Default::default()
            },
        )
    }

    /// Token for the agent participant. Same media grants as a user, and the
    /// agent may update its own metadata to publish state.
    pub fn generate_agent_token(
        &self,
        room_name: &str,
        agent_identity: &str,
        agent_name: &str,
    ) -> Result<String, VoiceError> {
        self.mint(
            agent_identity,
            agent_name,
            VideoGrants {
                room_join: true,
                room: room_name.to_string(),
                can_publish: true,
                can_subscribe: true,
                can_publish_data: true,
                can_update_own_metadata: true,
                ..Default::default()
            },
        )
    }

    fn mint(&self, identity: &str, name: &str, grants: VideoGrants) -> Result<String, VoiceError> {
        let token = AccessToken::with_api_key(&self.config.api_key, &self.config.api_secret)
            .with_identity(identity)
            .with_name(name)
            .with_grants(grants)
            .with_ttl(Duration::from_secs(self.config.token_ttl_seconds));

        token.to_jwt().map_err(VoiceError::LiveKit)
    }
}

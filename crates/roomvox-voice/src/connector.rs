use crate::service::VoiceService;
use async_trait::async_trait;
use roomvox_worker::{Room, RoomConnector, WorkerError};
use std::sync::Arc;

/// Whether this build can join rooms and stream audio (the `rtc` feature).
pub const MEDIA_ENABLED: bool = cfg!(feature = "rtc");

/// Joins rooms as the agent participant.
#[derive(Debug)]
pub struct LiveKitConnector {
    service: Arc<VoiceService>,
    agent_name: String,
}

impl LiveKitConnector {
    pub fn new(service: Arc<VoiceService>, agent_name: impl Into<String>) -> Self {
        Self {
            service,
            agent_name: agent_name.into(),
        }
    }

    /// Participant identity for one agent join. Unique per connection so a
    /// reconnect never collides with a stale participant.
    fn agent_identity(&self) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("{}-{}", self.agent_name, &id[..8])
    }
}

#[async_trait]
impl RoomConnector for LiveKitConnector {
    async fn connect(&self, room_name: &str) -> Result<Arc<dyn Room>, WorkerError> {
        if !self.service.is_enabled() {
            return Err(WorkerError::Connect {
                room: room_name.to_string(),
                reason: "livekit url is not configured".into(),
            });
        }
        let identity = self.agent_identity();
        let token = self
            .service
            .generate_agent_token(room_name, &identity, &self.agent_name)
            .map_err(|e| e.into_connect_error(room_name))?;

        tracing::debug!(room = %room_name, identity = %identity, "minted agent token");
        self.join(room_name, &token).await
    }
}

#[cfg(feature = "rtc")]
impl LiveKitConnector {
    async fn join(&self, room_name: &str, token: &str) -> Result<Arc<dyn Room>, WorkerError> {
        if let Err(e) = self.service.create_room(room_name).await {
            // The room usually exists already; joining creates it otherwise.
            tracing::debug!(room = %room_name, error = %e, "create_room failed, joining anyway");
        }
        let room = crate::media::LiveKitRoom::connect(self.service.url(), token)
            .await
            .map_err(|e| e.into_connect_error(room_name))?;
        Ok(Arc::new(room))
    }
}

#[cfg(not(feature = "rtc"))]
impl LiveKitConnector {
    async fn join(&self, room_name: &str, _token: &str) -> Result<Arc<dyn Room>, WorkerError> {
        Err(WorkerError::Connect {
            room: room_name.to_string(),
            reason: "roomvox-voice was built without the `rtc` feature; room media is unavailable"
                .into(),
        })
    }
}

//! LiveKit room media: feeds participant audio into a [`LiveSession`] and
//! plays its replies on an agent track.

use crate::error::VoiceError;
use async_trait::async_trait;
use futures::StreamExt;
use livekit::options::TrackPublishOptions;
use livekit::prelude::*;
use livekit::webrtc::audio_frame::AudioFrame;
use livekit::webrtc::audio_source::native::NativeAudioSource;
use livekit::webrtc::audio_source::{AudioSourceOptions, RtcAudioSource};
use livekit::webrtc::audio_stream::native::NativeAudioStream;
use roomvox_worker::{AudioBuffer, LiveSession, RunningSession, WorkerError};
use std::borrow::Cow;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

const AGENT_TRACK_NAME: &str = "roomvox-agent-voice";
/// Playback frame length.
const FRAME_MS: u32 = 10;
const SOURCE_QUEUE_MS: u32 = 1000;

pub struct LiveKitRoom {
    name: String,
    room: Arc<livekit::Room>,
    events: Mutex<Option<mpsc::UnboundedReceiver<RoomEvent>>>,
}

impl LiveKitRoom {
    pub async fn connect(url: &str, token: &str) -> Result<Self, VoiceError> {
        let (room, events) = livekit::Room::connect(url, token, RoomOptions::default())
            .await
            .map_err(|e| VoiceError::Media(e.to_string()))?;
        let name = room.name();
        tracing::info!(room = %name, "connected to livekit room");
        Ok(Self {
            name,
            room: Arc::new(room),
            events: Mutex::new(Some(events)),
        })
    }
}

#[async_trait]
impl roomvox_worker::Room for LiveKitRoom {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start_session(&self, session: Arc<LiveSession>) -> Result<RunningSession, WorkerError> {
        let Some(mut events) = self.events.lock().await.take() else {
            return Err(WorkerError::Session(format!(
                "a session is already running in room '{}'",
                self.name
            )));
        };

        let sample_rate = session.output_sample_rate();
        let source = NativeAudioSource::new(AudioSourceOptions::default(), sample_rate, 1, SOURCE_QUEUE_MS);
        let track = LocalAudioTrack::create_audio_track(
            AGENT_TRACK_NAME,
            RtcAudioSource::Native(source.clone()),
        );
        let options = TrackPublishOptions {
            source: TrackSource::Microphone,
            ..Default::default()
        };
        self.room
            .local_participant()
            .publish_track(LocalTrack::Audio(track), options)
            .await
            .map_err(|e| WorkerError::Session(format!("failed to publish agent track: {}", e)))?;

        let room = self.room.clone();
        let room_name = self.name.clone();
        Ok(RunningSession::spawn(self.name.clone(), async move {
            let mut listeners = JoinSet::new();
            while let Some(event) = events.recv().await {
                match event {
                    RoomEvent::TrackSubscribed {
                        track: RemoteTrack::Audio(track),
                        participant,
                        ..
                    } => {
                        let speaker = participant.identity().0;
                        tracing::info!(room = %room_name, speaker = %speaker, "listening to participant audio");
                        listeners.spawn(listen(track, speaker, session.clone(), source.clone()));
                    }
                    RoomEvent::Disconnected { reason } => {
                        tracing::info!(room = %room_name, reason = ?reason, "room disconnected");
                        break;
                    }
                    _ => {}
                }
            }
            listeners.shutdown().await;
            if let Err(e) = room.close().await {
                tracing::debug!(room = %room_name, error = %e, "room close failed");
            }
            Ok(())
        }))
    }
}

async fn listen(
    track: RemoteAudioTrack,
    speaker: String,
    session: Arc<LiveSession>,
    source: NativeAudioSource,
) {
    let mut segmenter = session.segmenter();
    let mut stream = NativeAudioStream::new(track.rtc_track(), segmenter.sample_rate() as i32, 1);

    while let Some(frame) = stream.next().await {
        let Some(utterance) = segmenter.push_frame(&frame.data) else {
            continue;
        };
        tracing::debug!(speaker = %speaker, ms = utterance.duration_ms(), "utterance detected");
        match session.respond(&utterance).await {
            Ok(Some(reply)) => play(&source, &reply).await,
            Ok(None) => {}
            Err(e) => tracing::warn!(speaker = %speaker, error = %e, "failed to answer utterance"),
        }
    }
}

async fn play(source: &NativeAudioSource, audio: &AudioBuffer) {
    let channels = u32::from(audio.channels.max(1));
    let chunk = (audio.sample_rate * FRAME_MS / 1000 * channels).max(1) as usize;
    for samples in audio.samples.chunks(chunk) {
        let frame = AudioFrame {
            data: Cow::Borrowed(samples),
            sample_rate: audio.sample_rate,
            num_channels: channels,
            samples_per_channel: samples.len() as u32 / channels,
        };
        if let Err(e) = source.capture_frame(&frame).await {
            tracing::warn!(error = %e, "failed to push agent audio");
            return;
        }
    }
}

//! LiveKit transport for roomvox.
//!
//! [`VoiceService`] mints access tokens and manages rooms through the
//! LiveKit server API. [`LiveKitConnector`] is the worker's
//! [`RoomConnector`](roomvox_worker::RoomConnector); with the `rtc` feature
//! it joins rooms through the LiveKit SDK and streams session audio.

pub mod config;
pub mod connector;
pub mod error;
#[cfg(feature = "rtc")]
pub mod media;
pub mod service;

pub use config::{http_url, LiveKitConfig};
pub use connector::{LiveKitConnector, MEDIA_ENABLED};
pub use error::VoiceError;
#[cfg(feature = "rtc")]
pub use media::LiveKitRoom;
pub use service::VoiceService;

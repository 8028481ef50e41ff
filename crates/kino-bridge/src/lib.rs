//! Kino Bridge - native playback bridge for Kino
//!
//! This crate sits between a host application framework and a native
//! media engine:
//! - Source resolution: protocol selection, byte-stream factories, DRM wiring
//! - Playback sessions: engine callbacks in, normalized events out
//! - Queuing event sink decoupling event production from host listeners
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Kino Bridge                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │   Options    │  │ Byte Stream  │  │     DRM      │           │
//! │  │              │  │  Factories   │  │   Wiring     │           │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘           │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │   Source    │                              │
//! │                    │  Resolver   │                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐            │
//! │  │ Media Player │─►│  Playback   │─►│   Queuing    │─► host     │
//! │  │  (platform)  │  │   Session   │  │  Event Sink  │            │
//! │  └──────────────┘  └─────────────┘  └──────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod options;
pub mod byte_stream;
pub mod drm;
pub mod source;
pub mod events;
pub mod platform;
pub mod sink;
pub mod session;

pub use error::{Error, Result};
pub use types::*;
pub use options::{PlaybackOptions, DEFAULT_USER_AGENT};
pub use byte_stream::{ByteStreamFactory, DefaultByteStreamFactory, HttpByteStreamFactory};
pub use drm::{
    CryptoCapability, DrmConfiguration, DrmSessionManager, DrmWarning, HttpLicenseCallback,
    LicenseCallback, StaticCryptoCapability,
};
pub use source::{MediaPipeline, MediaUri, SourceDescriptor, SourceResolver};
pub use events::SessionEvent;
pub use platform::{
    EngineState, EventChannel, EventSink, MediaPlayer, PlayerEvent, RenderSurface,
    SessionBackend, StreamHandler, SurfaceHandle,
};
pub use sink::{QueuingEventSink, VIDEO_ERROR_CODE};
pub use session::PlaybackSession;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the bridge library
pub fn init() {
    tracing::info!(version = VERSION, "Kino Bridge initialized");
}

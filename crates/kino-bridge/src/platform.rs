//! Boundary traits implemented by the host platform
//!
//! The media engine, the render surface and the host's event channel all
//! live outside this crate. A session only talks to them through these
//! traits.

use crate::events::SessionEvent;
use crate::source::SourceDescriptor;
use crate::types::VideoFormat;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Playback state reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Buffering,
    Ready,
    Ended,
}

/// Callback delivered by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// Playback state changed
    StateChanged(EngineState),
    /// Playback failed; carries the engine's description of the failure
    Error(String),
}

/// Sending half of a session's engine callback queue
pub type PlayerEventSender = mpsc::UnboundedSender<PlayerEvent>;

/// Receiving half of a session's engine callback queue
pub type PlayerEventReceiver = mpsc::UnboundedReceiver<PlayerEvent>;

/// Repeat mode of the whole pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatMode {
    Off,
    All,
}

/// Audio content type used for focus handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioContentType {
    Movie,
    Music,
    Speech,
}

/// Audio attributes applied to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioAttributes {
    pub content_type: AudioContentType,
}

impl AudioAttributes {
    pub fn movie() -> Self {
        Self {
            content_type: AudioContentType::Movie,
        }
    }
}

/// Playback rate parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackParameters {
    pub speed: f32,
    pub pitch: f32,
    pub skip_silence: bool,
}

impl PlaybackParameters {
    /// Rate change with pitch and silence skipping left at defaults
    pub fn with_speed(speed: f32) -> Self {
        Self {
            speed,
            pitch: 1.0,
            skip_silence: false,
        }
    }
}

/// Handle of the surface the engine renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceHandle(pub i64);

/// The native playback engine.
///
/// Implementations handle their own thread safety; control calls may come
/// from a different context than the one delivering callbacks.
pub trait MediaPlayer: Send + Sync {
    /// Register the queue that receives engine callbacks
    fn add_listener(&self, events: PlayerEventSender);

    /// Hand over the resolved source
    fn set_source(&self, source: &SourceDescriptor);

    /// Start loading the source
    fn prepare(&self);

    fn set_video_surface(&self, surface: SurfaceHandle);

    /// Apply audio attributes; `handle_audio_focus` requests exclusive focus
    fn set_audio_attributes(&self, attributes: AudioAttributes, handle_audio_focus: bool);

    fn set_play_when_ready(&self, play_when_ready: bool);

    fn set_repeat_mode(&self, mode: RepeatMode);

    /// Volume in [0.0, 1.0]
    fn set_volume(&self, volume: f32);

    fn set_playback_parameters(&self, parameters: PlaybackParameters);

    fn seek_to(&self, position_ms: u64);

    fn current_position(&self) -> u64;

    /// Upper bound of the buffered data, in milliseconds
    fn buffered_position(&self) -> u64;

    /// Media duration in milliseconds, 0 when unknown
    fn duration(&self) -> u64;

    /// Format of the selected video track, if any
    fn video_format(&self) -> Option<VideoFormat>;

    fn stop(&self);

    fn release(&self);
}

/// Render surface obtained from the host
pub trait RenderSurface: Send {
    fn handle(&self) -> SurfaceHandle;

    /// Return the surface to the host
    fn release(&mut self);
}

/// Downstream consumer of session events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &SessionEvent);

    fn fail(&self, code: &str, message: &str);

    fn end_of_stream(&self) {}
}

/// Host callbacks for a listener attaching to or leaving an event channel
pub trait StreamHandler: Send + Sync {
    fn on_listen(&self, sink: Arc<dyn EventSink>);

    fn on_cancel(&self);
}

/// Host event channel for one session
pub trait EventChannel: Send + Sync {
    /// Install or clear the stream handler
    fn set_stream_handler(&self, handler: Option<Arc<dyn StreamHandler>>);
}

/// Everything a session needs from the host, besides its source
pub struct SessionBackend {
    pub player: Box<dyn MediaPlayer>,
    pub surface: Box<dyn RenderSurface>,
    pub event_channel: Box<dyn EventChannel>,
}

impl SessionBackend {
    pub fn new(
        player: Box<dyn MediaPlayer>,
        surface: Box<dyn RenderSurface>,
        event_channel: Box<dyn EventChannel>,
    ) -> Self {
        Self {
            player,
            surface,
            event_channel,
        }
    }

    /// Give back the player and surface without ever wiring them up
    pub fn release(mut self) {
        self.surface.release();
        self.player.release();
    }
}

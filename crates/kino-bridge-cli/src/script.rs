//! Scripted engine for `replay`
//!
//! A script describes what the engine reports and what the host does, in
//! order. The scripted engine implements the platform traits so the replay
//! runs through a real [`PlaybackSession`](kino_bridge::PlaybackSession).
//!
//! ```json
//! {
//!   "duration_ms": 60000,
//!   "video_format": { "width": 1080, "height": 1920, "rotation_degrees": 90 },
//!   "steps": [
//!     { "action": "buffered", "position_ms": 4000 },
//!     { "action": "engine", "event": { "type": "state_changed", "value": "buffering" } },
//!     { "action": "listen" },
//!     { "action": "engine", "event": { "type": "state_changed", "value": "ready" } },
//!     { "action": "play" }
//!   ]
//! }
//! ```

use crate::output::{format_line, OutputFormat};
use anyhow::Context;
use kino_bridge::platform::{
    AudioAttributes, PlaybackParameters, PlayerEventSender, RepeatMode,
};
use kino_bridge::{
    EventChannel, EventSink, MediaPlayer, PlayerEvent, RenderSurface, SessionBackend,
    SessionEvent, SourceDescriptor, StreamHandler, SurfaceHandle, VideoFormat,
};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Engine timeline and host actions
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Script {
    /// Duration the engine reports once ready
    pub duration_ms: u64,
    /// Selected video track, absent for audio-only media
    pub video_format: Option<VideoFormat>,
    pub steps: Vec<Step>,
}

/// One scripted action
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Host listener attaches
    Listen,
    /// Host listener leaves
    Cancel,
    /// Engine callback
    Engine { event: PlayerEvent },
    /// Engine's buffered position moves
    Buffered { position_ms: u64 },
    Play,
    Pause,
    Seek { position_ms: u64 },
    Volume { volume: f64 },
    Speed { speed: f64 },
    Looping { looping: bool },
    Dispose,
}

impl Script {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing script {}", path.display()))
    }

    /// Whether the script attaches the listener itself
    pub fn attaches_listener(&self) -> bool {
        self.steps.iter().any(|step| matches!(step, Step::Listen))
    }
}

/// State shared by the scripted player, surface and channel
pub struct ScriptedEngine {
    duration_ms: u64,
    video_format: Option<VideoFormat>,
    listener: Mutex<Option<PlayerEventSender>>,
    handler: Mutex<Option<Arc<dyn StreamHandler>>>,
    position_ms: Mutex<u64>,
    buffered_ms: Mutex<u64>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    pub fn new(script: &Script) -> Arc<Self> {
        Arc::new(Self {
            duration_ms: script.duration_ms,
            video_format: script.video_format,
            listener: Mutex::new(None),
            handler: Mutex::new(None),
            position_ms: Mutex::new(0),
            buffered_ms: Mutex::new(0),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Player, surface and channel backed by this engine
    pub fn backend(self: &Arc<Self>) -> SessionBackend {
        SessionBackend::new(
            Box::new(ScriptedPlayer(self.clone())),
            Box::new(ScriptedSurface(self.clone())),
            Box::new(ScriptedChannel(self.clone())),
        )
    }

    /// Report a callback to the session
    pub fn deliver(&self, event: PlayerEvent) -> anyhow::Result<()> {
        let listener = self.listener.lock();
        let listener = listener.as_ref().context("no engine listener registered")?;
        listener
            .send(event)
            .map_err(|_| anyhow::anyhow!("session stopped listening to the engine"))
    }

    pub fn set_buffered(&self, position_ms: u64) {
        *self.buffered_ms.lock() = position_ms;
    }

    /// Attach a host listener through the installed stream handler
    pub fn listen(&self, sink: Arc<dyn EventSink>) -> anyhow::Result<()> {
        self.stream_handler()?.on_listen(sink);
        Ok(())
    }

    pub fn cancel(&self) -> anyhow::Result<()> {
        self.stream_handler()?.on_cancel();
        Ok(())
    }

    /// Calls the session made on the platform, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn stream_handler(&self) -> anyhow::Result<Arc<dyn StreamHandler>> {
        self.handler.lock().clone().context("no stream handler installed")
    }

    fn record(&self, call: String) {
        debug!(%call, "Platform call");
        self.calls.lock().push(call);
    }
}

struct ScriptedPlayer(Arc<ScriptedEngine>);

impl MediaPlayer for ScriptedPlayer {
    fn add_listener(&self, events: PlayerEventSender) {
        *self.0.listener.lock() = Some(events);
    }

    fn set_source(&self, source: &SourceDescriptor) {
        self.0.record(format!("set_source {} {}", source.kind, source.uri()));
    }

    fn prepare(&self) {
        self.0.record("prepare".to_string());
    }

    fn set_video_surface(&self, surface: SurfaceHandle) {
        self.0.record(format!("set_video_surface {}", surface.0));
    }

    fn set_audio_attributes(&self, attributes: AudioAttributes, handle_audio_focus: bool) {
        self.0.record(format!(
            "set_audio_attributes {:?} handle_audio_focus={handle_audio_focus}",
            attributes.content_type
        ));
    }

    fn set_play_when_ready(&self, play_when_ready: bool) {
        self.0.record(format!("set_play_when_ready {play_when_ready}"));
    }

    fn set_repeat_mode(&self, mode: RepeatMode) {
        self.0.record(format!("set_repeat_mode {mode:?}"));
    }

    fn set_volume(&self, volume: f32) {
        self.0.record(format!("set_volume {volume}"));
    }

    fn set_playback_parameters(&self, parameters: PlaybackParameters) {
        self.0.record(format!("set_playback_parameters speed={}", parameters.speed));
    }

    fn seek_to(&self, position_ms: u64) {
        *self.0.position_ms.lock() = position_ms;
        self.0.record(format!("seek_to {position_ms}"));
    }

    fn current_position(&self) -> u64 {
        *self.0.position_ms.lock()
    }

    fn buffered_position(&self) -> u64 {
        *self.0.buffered_ms.lock()
    }

    fn duration(&self) -> u64 {
        self.0.duration_ms
    }

    fn video_format(&self) -> Option<VideoFormat> {
        self.0.video_format
    }

    fn stop(&self) {
        self.0.record("stop".to_string());
    }

    fn release(&self) {
        self.0.listener.lock().take();
        self.0.record("release".to_string());
    }
}

struct ScriptedSurface(Arc<ScriptedEngine>);

impl RenderSurface for ScriptedSurface {
    fn handle(&self) -> SurfaceHandle {
        SurfaceHandle(1)
    }

    fn release(&mut self) {
        self.0.record("release_surface".to_string());
    }
}

struct ScriptedChannel(Arc<ScriptedEngine>);

impl EventChannel for ScriptedChannel {
    fn set_stream_handler(&self, handler: Option<Arc<dyn StreamHandler>>) {
        let call = if handler.is_some() { "set_stream_handler" } else { "clear_stream_handler" };
        self.0.record(call.to_string());
        *self.0.handler.lock() = handler;
    }
}

/// Host listener printing every event to stdout
pub struct ConsoleSink {
    format: OutputFormat,
}

impl ConsoleSink {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl EventSink for ConsoleSink {
    fn emit(&self, event: &SessionEvent) {
        println!("{}", format_line(event, self.format));
    }

    fn fail(&self, code: &str, message: &str) {
        println!("{}", format_line(&json!({ "code": code, "message": message }), self.format));
    }

    fn end_of_stream(&self) {
        println!("{}", format_line(&json!({ "event": "endOfStream" }), self.format));
    }
}

//! Playback Session - bridges one native player to the host
//!
//! Coordinates:
//! - Handing the resolved source to the engine
//! - Surface, audio attribute and event channel wiring
//! - State machine driven by engine callbacks
//! - Event translation into [`SessionEvent`]s
//! - Teardown

use crate::{
    events::SessionEvent,
    options::PlaybackOptions,
    platform::{
        AudioAttributes, EngineState, EventChannel, MediaPlayer, PlaybackParameters, PlayerEvent,
        PlayerEventReceiver, RenderSurface, RepeatMode, SessionBackend,
    },
    sink::{QueuingEventSink, QueuingStreamHandler},
    source::{SourceDescriptor, SourceResolver},
    types::*,
    Error, Result,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Clamp a requested volume into [0.0, 1.0]. NaN is treated as silence.
pub fn clamp_volume(volume: f64) -> f32 {
    if volume.is_nan() {
        return 0.0;
    }
    volume.clamp(0.0, 1.0) as f32
}

/// One-shot guard for the `initialized` event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Initialization {
    Pending,
    Done,
}

/// Playback session owning a single native player
pub struct PlaybackSession {
    /// Unique session ID
    id: SessionId,
    /// Session configuration
    options: PlaybackOptions,
    /// Resolved source
    source: SourceDescriptor,
    /// Native player, `None` once released
    player: Option<Box<dyn MediaPlayer>>,
    /// Render surface, `None` once released
    surface: Option<Box<dyn RenderSurface>>,
    /// Host event channel, `None` once detached
    event_channel: Option<Box<dyn EventChannel>>,
    /// Events waiting for, or forwarded to, the host listener
    sink: QueuingEventSink,
    /// Engine callbacks
    events: PlayerEventReceiver,
    /// Current state
    state: PlayerState,
    initialization: Initialization,
    disposed: bool,
}

impl PlaybackSession {
    /// Resolve the source and start a session on it.
    ///
    /// If resolution fails the backend's player and surface are released
    /// before the error is returned.
    #[instrument(skip(resolver, backend, options))]
    pub fn new(
        resolver: &SourceResolver,
        backend: SessionBackend,
        uri: &str,
        format_hint: Option<&str>,
        options: PlaybackOptions,
    ) -> Result<Self> {
        match resolver.resolve(uri, format_hint, &options) {
            Ok(source) => Ok(Self::with_source(source, backend, options)),
            Err(e) => {
                warn!(error = %e, "Source resolution failed, releasing backend");
                backend.release();
                Err(e)
            }
        }
    }

    /// Start a session on an already resolved source
    pub fn with_source(source: SourceDescriptor, backend: SessionBackend, options: PlaybackOptions) -> Self {
        let SessionBackend {
            player,
            surface,
            event_channel,
        } = backend;

        let (events_tx, events) = mpsc::unbounded_channel();
        let sink = QueuingEventSink::new();

        let mut session = Self {
            id: SessionId::new(),
            options,
            source,
            player: Some(player),
            surface: Some(surface),
            event_channel: Some(event_channel),
            sink,
            events,
            state: PlayerState::Idle,
            initialization: Initialization::Pending,
            disposed: false,
        };

        if let Some(player) = &session.player {
            player.add_listener(events_tx);
            player.set_source(&session.source);
            player.prepare();
        }
        session.transition(PlayerState::Preparing);
        session.setup();

        info!(
            session_id = %session.id,
            uri = %session.source.uri(),
            kind = %session.source.kind,
            degraded = session.source.is_degraded(),
            "Playback session created"
        );

        session
    }

    fn setup(&mut self) {
        if let Some(channel) = &self.event_channel {
            channel.set_stream_handler(Some(Arc::new(QueuingStreamHandler::new(self.sink.clone()))));
        }

        let (Some(player), Some(surface)) = (&self.player, &self.surface) else {
            return;
        };
        player.set_video_surface(surface.handle());
        player.set_audio_attributes(AudioAttributes::movie(), !self.options.mix_with_others);
    }

    /// Get session ID
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Get current state
    pub fn state(&self) -> PlayerState {
        self.state
    }

    /// Resolved source
    pub fn source(&self) -> &SourceDescriptor {
        &self.source
    }

    pub fn options(&self) -> &PlaybackOptions {
        &self.options
    }

    /// True once the engine has been ready at least once
    pub fn is_initialized(&self) -> bool {
        self.initialization == Initialization::Done
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Sink shared with the host's stream handler
    pub fn event_sink(&self) -> QueuingEventSink {
        self.sink.clone()
    }

    fn transition(&mut self, next: PlayerState) {
        let current = self.state;
        if !current.can_transition_to(next) {
            warn!(from = %current, to = %next, "Unexpected engine transition");
        }
        self.state = next;
        debug!(from = %current, to = %next, "State transition");
    }

    fn emit(&self, event: SessionEvent) {
        self.sink.emit(event);
    }

    /// Apply a single engine callback
    pub fn handle_player_event(&mut self, event: PlayerEvent) {
        if self.disposed {
            debug!(?event, "Session disposed, ignoring engine callback");
            return;
        }

        match event {
            PlayerEvent::StateChanged(EngineState::Buffering) => {
                self.transition(PlayerState::Buffering);
                self.send_buffering_update();
            }
            PlayerEvent::StateChanged(EngineState::Ready) => {
                self.transition(PlayerState::Ready);
                if self.initialization == Initialization::Pending {
                    self.initialization = Initialization::Done;
                    self.send_initialized();
                }
            }
            PlayerEvent::StateChanged(EngineState::Ended) => {
                let already_ended = self.state == PlayerState::Ended;
                self.transition(PlayerState::Ended);
                if !already_ended {
                    self.emit(SessionEvent::Completed);
                }
            }
            PlayerEvent::StateChanged(EngineState::Idle) => {
                debug!(state = %self.state, "Engine went idle");
            }
            PlayerEvent::Error(message) => {
                warn!(session_id = %self.id, error = %message, "Playback error");
                self.transition(PlayerState::Errored);
                self.emit(SessionEvent::Error {
                    message: format!("Video player had error {message}"),
                });
            }
        }
    }

    /// Apply every engine callback already queued. Returns how many ran.
    pub fn process_pending(&mut self) -> usize {
        let mut processed = 0;
        while !self.disposed {
            let Ok(event) = self.events.try_recv() else {
                break;
            };
            self.handle_player_event(event);
            processed += 1;
        }
        processed
    }

    /// Wait for the next engine callback and apply it.
    ///
    /// Returns `false` once the engine's queue is closed or the session is
    /// disposed.
    pub async fn process_next(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        match self.events.recv().await {
            Some(event) => {
                self.handle_player_event(event);
                true
            }
            None => false,
        }
    }

    fn send_buffering_update(&self) {
        if let Some(player) = &self.player {
            self.emit(SessionEvent::buffering(player.buffered_position()));
        }
    }

    fn send_initialized(&self) {
        if let Some(player) = &self.player {
            let event = SessionEvent::initialized(player.duration(), player.video_format());
            info!(session_id = %self.id, ?event, "Playback initialized");
            self.emit(event);
        }
    }

    fn player(&self) -> Result<&dyn MediaPlayer> {
        self.player.as_deref().ok_or(Error::Disposed)
    }

    /// Start playback once ready
    pub fn play(&self) -> Result<()> {
        self.player()?.set_play_when_ready(true);
        Ok(())
    }

    /// Pause playback
    pub fn pause(&self) -> Result<()> {
        self.player()?.set_play_when_ready(false);
        Ok(())
    }

    /// Repeat the whole pipeline
    pub fn set_looping(&self, looping: bool) -> Result<()> {
        let mode = if looping { RepeatMode::All } else { RepeatMode::Off };
        self.player()?.set_repeat_mode(mode);
        Ok(())
    }

    /// Set volume, clamped to [0.0, 1.0]
    pub fn set_volume(&self, volume: f64) -> Result<()> {
        self.player()?.set_volume(clamp_volume(volume));
        Ok(())
    }

    /// Set the playback rate multiplier
    pub fn set_playback_speed(&self, speed: f64) -> Result<()> {
        let player = self.player()?;
        if !speed.is_finite() || speed <= 0.0 {
            return Err(Error::InvalidConfig(format!("playback speed must be positive, got {speed}")));
        }
        player.set_playback_parameters(PlaybackParameters::with_speed(speed as f32));
        Ok(())
    }

    /// Seek to position
    pub fn seek_to(&self, position_ms: u64) -> Result<()> {
        debug!(position_ms, "Seeking");
        self.player()?.seek_to(position_ms);
        Ok(())
    }

    /// Get current position
    pub fn position(&self) -> Result<u64> {
        Ok(self.player()?.current_position())
    }

    /// Release the player, the surface and the event channel.
    ///
    /// Safe to call more than once; only the first call does anything.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        if self.is_initialized() {
            if let Some(player) = &self.player {
                player.stop();
            }
        }
        if let Some(mut surface) = self.surface.take() {
            surface.release();
        }
        if let Some(channel) = self.event_channel.take() {
            channel.set_stream_handler(None);
        }
        self.sink.close();
        if let Some(player) = self.player.take() {
            player.release();
        }
        self.events.close();

        info!("Playback session disposed");
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

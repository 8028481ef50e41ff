//! Integration tests for Kino Bridge

use kino_bridge::{
    platform::{AudioAttributes, PlaybackParameters, RepeatMode},
    DrmSystem, DrmWarning, EngineState, Error, EventChannel, EventSink, MediaPipeline, MediaPlayer,
    PlaybackOptions, PlaybackSession, PlayerEvent, PlayerState, ProtocolKind, RenderSurface,
    SessionBackend, SessionEvent, SourceDescriptor, SourceResolver, StaticCryptoCapability,
    StreamHandler, SurfaceHandle, VideoFormat,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio_test::{assert_err, assert_ok};

// =============================================================================
// Fakes
// =============================================================================

/// Shared view of everything the fakes were asked to do
#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<String>>,
    listener: Mutex<Option<UnboundedSender<PlayerEvent>>>,
    handler: Mutex<Option<Arc<dyn StreamHandler>>>,
    buffered_ms: Mutex<u64>,
    duration_ms: Mutex<u64>,
    video_format: Mutex<Option<VideoFormat>>,
}

impl Recorder {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == call).count()
    }

    fn position_of(&self, call: &str) -> Option<usize> {
        self.calls.lock().iter().position(|c| c.as_str() == call)
    }

    fn send(&self, event: PlayerEvent) {
        self.listener
            .lock()
            .as_ref()
            .expect("listener registered")
            .send(event)
            .expect("session alive");
    }

    fn state(&self, state: EngineState) {
        self.send(PlayerEvent::StateChanged(state));
    }

    fn listen(&self, sink: Arc<dyn EventSink>) {
        let handler = self.handler.lock().clone().expect("stream handler installed");
        handler.on_listen(sink);
    }

    fn cancel(&self) {
        let handler = self.handler.lock().clone().expect("stream handler installed");
        handler.on_cancel();
    }
}

struct FakePlayer(Arc<Recorder>);

impl MediaPlayer for FakePlayer {
    fn add_listener(&self, events: UnboundedSender<PlayerEvent>) {
        *self.0.listener.lock() = Some(events);
    }

    fn set_source(&self, source: &SourceDescriptor) {
        self.0.record(format!("set_source {}", source.kind));
    }

    fn prepare(&self) {
        self.0.record("prepare");
    }

    fn set_video_surface(&self, surface: SurfaceHandle) {
        self.0.record(format!("set_video_surface {}", surface.0));
    }

    fn set_audio_attributes(&self, attributes: AudioAttributes, handle_audio_focus: bool) {
        self.0.record(format!(
            "set_audio_attributes {:?} focus={handle_audio_focus}",
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
        self.0.record(format!(
            "set_playback_parameters {} {} {}",
            parameters.speed, parameters.pitch, parameters.skip_silence
        ));
    }

    fn seek_to(&self, position_ms: u64) {
        self.0.record(format!("seek_to {position_ms}"));
    }

    fn current_position(&self) -> u64 {
        1_234
    }

    fn buffered_position(&self) -> u64 {
        *self.0.buffered_ms.lock()
    }

    fn duration(&self) -> u64 {
        *self.0.duration_ms.lock()
    }

    fn video_format(&self) -> Option<VideoFormat> {
        *self.0.video_format.lock()
    }

    fn stop(&self) {
        self.0.record("stop");
    }

    fn release(&self) {
        self.0.record("release");
    }
}

struct FakeSurface(Arc<Recorder>);

impl RenderSurface for FakeSurface {
    fn handle(&self) -> SurfaceHandle {
        SurfaceHandle(7)
    }

    fn release(&mut self) {
        self.0.record("surface.release");
    }
}

struct FakeChannel(Arc<Recorder>);

impl EventChannel for FakeChannel {
    fn set_stream_handler(&self, handler: Option<Arc<dyn StreamHandler>>) {
        let call = if handler.is_some() { "set_stream_handler" } else { "clear_stream_handler" };
        self.0.record(call);
        *self.0.handler.lock() = handler;
    }
}

/// Host-side listener recording what it receives, in wire form
#[derive(Default)]
struct RecordingSink {
    received: Mutex<Vec<Value>>,
}

impl RecordingSink {
    fn received(&self) -> Vec<Value> {
        self.received.lock().clone()
    }

    fn names(&self) -> Vec<String> {
        self.received
            .lock()
            .iter()
            .map(|v| v["event"].as_str().unwrap_or("error").to_string())
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &SessionEvent) {
        self.received.lock().push(serde_json::to_value(event).unwrap());
    }

    fn fail(&self, code: &str, message: &str) {
        self.received.lock().push(json!({ "code": code, "message": message }));
    }
}

fn resolver() -> SourceResolver {
    SourceResolver::new(Arc::new(StaticCryptoCapability::widevine(30)))
}

fn backend(recorder: &Arc<Recorder>) -> SessionBackend {
    SessionBackend::new(
        Box::new(FakePlayer(recorder.clone())),
        Box::new(FakeSurface(recorder.clone())),
        Box::new(FakeChannel(recorder.clone())),
    )
}

fn open_session(uri: &str, options: PlaybackOptions) -> (PlaybackSession, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let session = PlaybackSession::new(&resolver(), backend(&recorder), uri, None, options)
        .expect("session created");
    (session, recorder)
}

// =============================================================================
// Source Resolver Tests
// =============================================================================

#[test]
fn test_format_hints_select_protocol() {
    let resolver = resolver();
    let options = PlaybackOptions::default();
    let uri = "https://example.com/stream/video.mp4";

    let cases = [
        ("ss", ProtocolKind::SmoothStreaming),
        ("dash", ProtocolKind::Dash),
        ("hls", ProtocolKind::Hls),
        ("other", ProtocolKind::Progressive),
    ];
    for (hint, expected) in cases {
        let source = resolver.resolve(uri, Some(hint), &options).unwrap();
        assert_eq!(source.kind, expected, "hint {hint}");
        assert_eq!(source.pipeline.kind(), expected, "hint {hint}");
    }
}

#[test]
fn test_unknown_hint_never_falls_back() {
    let err = assert_err!(resolver().resolve(
        "https://example.com/video.m3u8",
        Some("bogus"),
        &PlaybackOptions::default(),
    ));
    assert!(matches!(err, Error::UnsupportedFormat { .. }));
    assert!(err.is_config_error());
}

#[test]
fn test_inference_is_deterministic() {
    let resolver = resolver();
    let options = PlaybackOptions::default();

    for uri in [
        "https://example.com/live/master.m3u8",
        "https://example.com/vod/manifest.mpd",
        "https://example.com/vod/movie.ism",
        "https://example.com/vod/movie.webm",
        "/storage/emulated/0/Movies/holiday.mkv",
    ] {
        let first = resolver.resolve(uri, None, &options).unwrap();
        let second = resolver.resolve(uri, None, &options).unwrap();
        assert_eq!(first.kind, second.kind, "{uri}");
    }
}

#[test]
fn test_dash_builds_drm_manager_without_scheme() {
    let resolver = resolver();
    let options = PlaybackOptions::default();
    assert!(!options.has_drm());

    let first = resolver.resolve("https://example.com/manifest.mpd", None, &options).unwrap();
    let second = resolver.resolve("https://example.com/manifest.mpd", None, &options).unwrap();

    for source in [&first, &second] {
        let MediaPipeline::Dash(dash) = &source.pipeline else {
            panic!("expected DASH pipeline");
        };
        assert_eq!(dash.drm_session_manager.system(), DrmSystem::Widevine);
        assert!(!dash.drm_session_manager.multi_session());
        assert!(source.media_item.drm.is_none());
    }
    assert_eq!(
        first.pipeline.drm_session_manager().unwrap().provider(),
        second.pipeline.drm_session_manager().unwrap().provider()
    );
}

#[test]
fn test_hls_has_no_drm_manager() {
    let options = PlaybackOptions::widevine("https://license.example.com/wv");
    let source = resolver()
        .resolve("https://example.com/master.m3u8", None, &options)
        .unwrap();

    assert!(source.pipeline.drm_session_manager().is_none());
    assert_eq!(source.media_item.drm.as_ref().unwrap().system, DrmSystem::Widevine);
    assert!(!source.is_degraded());
}

#[test]
fn test_old_platform_drm_is_warning_only() {
    let resolver = SourceResolver::new(Arc::new(StaticCryptoCapability::widevine(16)));
    let options = PlaybackOptions::widevine("https://license.example.com/wv");

    let source = assert_ok!(resolver.resolve("https://example.com/manifest.mpd", None, &options));
    assert!(source.is_degraded());
    assert_eq!(source.warnings.len(), 1);
}

#[test]
fn test_scheme_without_license_uri_is_rejected() {
    let mut options = PlaybackOptions::default();
    options.drm_scheme = Some("widevine".to_string());

    let err = assert_err!(resolver().resolve("https://example.com/manifest.mpd", None, &options));
    assert!(matches!(err, Error::MissingLicenseUri { .. }));
}

#[test]
fn test_custom_key_system_uuid_is_warning_only() {
    let mut options = PlaybackOptions::default();
    options.drm_scheme = Some("1077efec-c0b2-4d02-ace3-3c1e52e2fb4b".to_string());
    options.drm_license_uri = Some("https://license.example.com/custom".to_string());

    let source = assert_ok!(resolver().resolve("https://example.com/v.m3u8", None, &options));
    let drm = source.media_item.drm.as_ref().unwrap();
    let DrmSystem::Other(uuid) = drm.system else {
        panic!("expected a custom key system, got {}", drm.system);
    };

    assert_eq!(uuid.to_string(), "1077efec-c0b2-4d02-ace3-3c1e52e2fb4b");
    assert_eq!(source.kind, ProtocolKind::Hls);
    assert_eq!(source.warnings, vec![DrmWarning::UnsupportedScheme { system: drm.system }]);
    assert!(source.is_degraded());
}

// =============================================================================
// Session Construction Tests
// =============================================================================

#[test]
fn test_session_setup_wiring() {
    let (session, recorder) = open_session("https://example.com/video.mp4", PlaybackOptions::default());

    assert_eq!(session.state(), PlayerState::Preparing);
    assert!(!session.is_initialized());

    let set_source = recorder.position_of("set_source progressive").unwrap();
    let prepare = recorder.position_of("prepare").unwrap();
    assert!(set_source < prepare);
    assert_eq!(recorder.count("set_stream_handler"), 1);
    assert_eq!(recorder.count("set_video_surface 7"), 1);
    assert_eq!(recorder.count("set_audio_attributes Movie focus=true"), 1);
}

#[test]
fn test_mixing_releases_audio_focus() {
    let options = PlaybackOptions::default().with_mix_with_others(true);
    let (_session, recorder) = open_session("https://example.com/video.mp4", options);

    assert_eq!(recorder.count("set_audio_attributes Movie focus=false"), 1);
}

#[test]
fn test_failed_resolution_releases_backend() {
    let recorder = Arc::new(Recorder::default());
    let result = PlaybackSession::new(
        &resolver(),
        backend(&recorder),
        "https://example.com/video.mp4",
        Some("bogus"),
        PlaybackOptions::default(),
    );

    assert!(matches!(result, Err(Error::UnsupportedFormat { .. })));
    assert_eq!(recorder.calls(), vec!["surface.release", "release"]);
}

// =============================================================================
// Event Translation Tests
// =============================================================================

#[test]
fn test_initialized_fires_once() {
    let (mut session, recorder) = open_session("https://example.com/video.mp4", PlaybackOptions::default());
    *recorder.duration_ms.lock() = 60_000;
    *recorder.video_format.lock() = Some(VideoFormat::new(1080, 1920, 90));

    let sink = Arc::new(RecordingSink::default());
    recorder.listen(sink.clone());

    recorder.state(EngineState::Ready);
    recorder.state(EngineState::Ready);
    recorder.state(EngineState::Ready);
    assert_eq!(session.process_pending(), 3);

    assert!(session.is_initialized());
    assert_eq!(session.state(), PlayerState::Ready);
    assert_eq!(
        sink.received(),
        vec![json!({ "event": "initialized", "duration": 60000, "width": 1920, "height": 1080 })]
    );
}

#[test]
fn test_initialized_without_video_format() {
    let (mut session, recorder) = open_session("https://example.com/audio.mp3", PlaybackOptions::default());
    *recorder.duration_ms.lock() = 3_000;

    let sink = Arc::new(RecordingSink::default());
    recorder.listen(sink.clone());
    recorder.state(EngineState::Ready);
    session.process_pending();

    assert_eq!(sink.received(), vec![json!({ "event": "initialized", "duration": 3000 })]);
}

#[test]
fn test_buffering_updates_and_completion() {
    let (mut session, recorder) = open_session("https://example.com/video.mp4", PlaybackOptions::default());
    let sink = Arc::new(RecordingSink::default());
    recorder.listen(sink.clone());

    *recorder.buffered_ms.lock() = 2_000;
    recorder.state(EngineState::Buffering);
    recorder.state(EngineState::Ready);
    *recorder.buffered_ms.lock() = 9_000;
    recorder.state(EngineState::Buffering);
    recorder.state(EngineState::Ready);
    recorder.state(EngineState::Ended);
    recorder.state(EngineState::Ended);
    session.process_pending();

    assert_eq!(session.state(), PlayerState::Ended);
    assert_eq!(
        sink.names(),
        vec!["bufferingUpdate", "initialized", "bufferingUpdate", "completed"]
    );
    assert_eq!(sink.received()[0], json!({ "event": "bufferingUpdate", "values": [[0, 2000]] }));
    assert_eq!(sink.received()[2]["values"], json!([[0, 9000]]));
}

#[test]
fn test_completed_does_not_suppress_replay() {
    let (mut session, recorder) = open_session("https://example.com/video.mp4", PlaybackOptions::default());
    let sink = Arc::new(RecordingSink::default());
    recorder.listen(sink.clone());

    recorder.state(EngineState::Ready);
    recorder.state(EngineState::Ended);
    session.process_pending();

    session.seek_to(0).unwrap();
    recorder.state(EngineState::Buffering);
    recorder.state(EngineState::Ready);
    recorder.state(EngineState::Ended);
    session.process_pending();

    assert_eq!(
        sink.names(),
        vec!["initialized", "completed", "bufferingUpdate", "completed"]
    );
}

#[test]
fn test_player_error_is_reported_not_fatal() {
    let (mut session, recorder) = open_session("https://example.com/video.mp4", PlaybackOptions::default());
    let sink = Arc::new(RecordingSink::default());
    recorder.listen(sink.clone());

    recorder.state(EngineState::Ready);
    recorder.send(PlayerEvent::Error("Source error: 404".to_string()));
    session.process_pending();

    assert_eq!(session.state(), PlayerState::Errored);
    assert_eq!(
        sink.received()[1],
        json!({ "code": "VideoError", "message": "Video player had error Source error: 404" })
    );
    assert_eq!(recorder.count("stop"), 0);
}

#[tokio::test]
async fn test_process_next_awaits_callbacks() {
    let (mut session, recorder) = open_session("https://example.com/video.mp4", PlaybackOptions::default());
    let sink = Arc::new(RecordingSink::default());
    recorder.listen(sink.clone());

    let listener = recorder.listener.lock().clone().unwrap();
    tokio::spawn(async move {
        listener.send(PlayerEvent::StateChanged(EngineState::Ready)).unwrap();
    });

    assert!(session.process_next().await);
    assert_eq!(sink.names(), vec!["initialized"]);

    session.dispose();
    assert!(!session.process_next().await);
}

// =============================================================================
// Queuing Sink Tests
// =============================================================================

#[test]
fn test_events_before_listen_are_delivered_in_order() {
    let (mut session, recorder) = open_session("https://example.com/video.mp4", PlaybackOptions::default());

    recorder.state(EngineState::Buffering);
    recorder.state(EngineState::Ready);
    recorder.state(EngineState::Ended);
    session.process_pending();
    assert_eq!(session.event_sink().pending(), 3);

    let sink = Arc::new(RecordingSink::default());
    recorder.listen(sink.clone());

    assert_eq!(sink.names(), vec!["bufferingUpdate", "initialized", "completed"]);
}

#[test]
fn test_events_while_detached_are_dropped() {
    let (mut session, recorder) = open_session("https://example.com/video.mp4", PlaybackOptions::default());
    let first = Arc::new(RecordingSink::default());
    let second = Arc::new(RecordingSink::default());

    recorder.listen(first.clone());
    recorder.state(EngineState::Ready);
    session.process_pending();

    recorder.cancel();
    recorder.state(EngineState::Buffering);
    session.process_pending();

    recorder.listen(second.clone());
    recorder.state(EngineState::Ended);
    session.process_pending();

    assert_eq!(first.names(), vec!["initialized"]);
    assert_eq!(second.names(), vec!["completed"]);
}

/// Host listener that unsubscribes from inside its own callback
struct DetachOnCompleted {
    handler: Arc<dyn StreamHandler>,
    inner: RecordingSink,
}

impl EventSink for DetachOnCompleted {
    fn emit(&self, event: &SessionEvent) {
        self.inner.emit(event);
        if *event == SessionEvent::Completed {
            self.handler.on_cancel();
        }
    }

    fn fail(&self, code: &str, message: &str) {
        self.inner.fail(code, message);
    }
}

#[test]
fn test_listener_may_detach_during_delivery() {
    let (mut session, recorder) = open_session("https://example.com/video.mp4", PlaybackOptions::default());
    let handler = recorder.handler.lock().clone().expect("stream handler installed");
    let sink = Arc::new(DetachOnCompleted {
        handler,
        inner: RecordingSink::default(),
    });
    recorder.listen(sink.clone());

    recorder.state(EngineState::Ready);
    recorder.state(EngineState::Ended);
    recorder.state(EngineState::Buffering);
    assert_eq!(session.process_pending(), 3);

    assert_eq!(sink.inner.names(), vec!["initialized", "completed"]);
    assert!(!session.event_sink().is_attached());
    assert_eq!(session.event_sink().pending(), 0);

    // The stream keeps working for the next listener
    let next = Arc::new(RecordingSink::default());
    recorder.listen(next.clone());
    recorder.state(EngineState::Ended);
    session.process_pending();
    assert_eq!(next.names(), vec!["completed"]);
}

#[test]
fn test_listener_may_attach_during_delivery() {
    let (mut session, recorder) = open_session("https://example.com/video.mp4", PlaybackOptions::default());
    let handler = recorder.handler.lock().clone().expect("stream handler installed");

    // Queued before anyone listens; the first delivery re-enters the handler
    recorder.state(EngineState::Ready);
    recorder.state(EngineState::Ended);
    session.process_pending();
    assert_eq!(session.event_sink().pending(), 2);

    let sink = Arc::new(DetachOnCompleted {
        handler: handler.clone(),
        inner: RecordingSink::default(),
    });
    handler.on_listen(sink.clone());

    assert_eq!(sink.inner.names(), vec!["initialized", "completed"]);
    assert!(!session.event_sink().is_attached());
}

// =============================================================================
// Control Tests
// =============================================================================

#[test]
fn test_volume_is_clamped() {
    let (session, recorder) = open_session("https://example.com/video.mp4", PlaybackOptions::default());

    session.set_volume(-0.5).unwrap();
    session.set_volume(1.7).unwrap();
    session.set_volume(0.42).unwrap();

    assert_eq!(recorder.count("set_volume 0"), 1);
    assert_eq!(recorder.count("set_volume 1"), 1);
    assert_eq!(recorder.count("set_volume 0.42"), 1);
}

#[test]
fn test_controls_forward_to_player() {
    let (session, recorder) = open_session("https://example.com/video.mp4", PlaybackOptions::default());

    session.play().unwrap();
    session.pause().unwrap();
    session.set_looping(true).unwrap();
    session.set_looping(false).unwrap();
    session.set_playback_speed(1.5).unwrap();
    session.seek_to(42_000).unwrap();
    assert_eq!(session.position().unwrap(), 1_234);

    for call in [
        "set_play_when_ready true",
        "set_play_when_ready false",
        "set_repeat_mode All",
        "set_repeat_mode Off",
        "set_playback_parameters 1.5 1 false",
        "seek_to 42000",
    ] {
        assert_eq!(recorder.count(call), 1, "{call}");
    }
    assert_eq!(session.state(), PlayerState::Preparing);
}

#[test]
fn test_invalid_speed_is_rejected() {
    let (session, recorder) = open_session("https://example.com/video.mp4", PlaybackOptions::default());

    assert!(matches!(session.set_playback_speed(0.0), Err(Error::InvalidConfig(_))));
    assert!(matches!(session.set_playback_speed(f64::NAN), Err(Error::InvalidConfig(_))));
    assert!(!recorder.calls().iter().any(|c| c.starts_with("set_playback_parameters")));
}

// =============================================================================
// Dispose Tests
// =============================================================================

#[test]
fn test_dispose_before_ready_skips_stop() {
    let (mut session, recorder) = open_session("https://example.com/video.mp4", PlaybackOptions::default());

    session.dispose();

    assert_eq!(recorder.count("stop"), 0);
    assert_eq!(recorder.count("surface.release"), 1);
    assert_eq!(recorder.count("clear_stream_handler"), 1);
    assert_eq!(recorder.count("release"), 1);
    assert!(session.is_disposed());
}

#[test]
fn test_dispose_after_ready_stops_first() {
    let (mut session, recorder) = open_session("https://example.com/video.mp4", PlaybackOptions::default());
    recorder.state(EngineState::Ready);
    session.process_pending();

    session.dispose();

    let stop = recorder.position_of("stop").unwrap();
    let release = recorder.position_of("release").unwrap();
    assert!(stop < release);
}

#[test]
fn test_dispose_releases_exactly_once() {
    let (mut session, recorder) = open_session("https://example.com/video.mp4", PlaybackOptions::default());

    session.dispose();
    session.dispose();
    drop(session);

    assert_eq!(recorder.count("surface.release"), 1);
    assert_eq!(recorder.count("release"), 1);
    assert_eq!(recorder.count("clear_stream_handler"), 1);
}

#[test]
fn test_drop_disposes() {
    let (session, recorder) = open_session("https://example.com/video.mp4", PlaybackOptions::default());
    drop(session);

    assert_eq!(recorder.count("release"), 1);
}

#[test]
fn test_no_events_after_dispose() {
    let (mut session, recorder) = open_session("https://example.com/video.mp4", PlaybackOptions::default());
    let sink = Arc::new(RecordingSink::default());
    recorder.listen(sink.clone());

    recorder.state(EngineState::Ready);
    session.dispose();
    assert_eq!(session.process_pending(), 0);
    session.handle_player_event(PlayerEvent::StateChanged(EngineState::Ended));

    assert!(sink.received().is_empty());
    assert!(matches!(session.play(), Err(Error::Disposed)));
    assert!(matches!(session.position(), Err(Error::Disposed)));
}

#[test]
fn test_dispose_discards_undelivered_events() {
    let (mut session, recorder) = open_session("https://example.com/video.mp4", PlaybackOptions::default());
    let handler = recorder.handler.lock().clone().expect("stream handler installed");

    recorder.state(EngineState::Ready);
    session.process_pending();
    assert_eq!(session.event_sink().pending(), 1);

    session.dispose();
    assert_eq!(session.event_sink().pending(), 0);

    // A host holding on to the old handler must not see the stale events
    let late = Arc::new(RecordingSink::default());
    handler.on_listen(late.clone());
    assert!(late.received().is_empty());
}

//! CLI command implementations

use crate::output::{format_output, OutputFormat};
use crate::script::{ConsoleSink, Script, ScriptedEngine, Step};
use crate::{OptionArgs, PlatformArgs};
use anyhow::Context;
use kino_bridge::drm::CryptoProvider;
use kino_bridge::{
    ByteStreamFactory, CryptoCapability, DrmConfiguration, DrmSystem, EventSink, MediaPipeline,
    PlaybackOptions, PlaybackSession, PlayerState, ProtocolKind, SessionId, SourceDescriptor,
    SourceResolver, StaticCryptoCapability, Transport,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Build playback options from an options file or from flags
pub fn load_options(args: &OptionArgs) -> anyhow::Result<PlaybackOptions> {
    if let Some(path) = &args.options {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading options {}", path.display()))?;
        let map: serde_json::Value = serde_json::from_str(&text)?;
        return Ok(PlaybackOptions::from_map(map)?);
    }

    let options = PlaybackOptions {
        mix_with_others: args.mix,
        drm_scheme: args.drm_scheme.clone(),
        drm_license_uri: args.license_uri.clone(),
        drm_session_for_clear_content: args.clear_content,
        user_agent: args.user_agent.clone(),
    };
    options.validate()?;
    Ok(options)
}

/// Crypto capability of the simulated platform
pub fn crypto_capability(args: &PlatformArgs) -> Arc<dyn CryptoCapability> {
    if args.no_widevine {
        Arc::new(StaticCryptoCapability::none(args.api_level))
    } else {
        Arc::new(StaticCryptoCapability::widevine(args.api_level))
    }
}

/// Resolved source, as printed by `resolve`
#[derive(Debug, Serialize)]
struct SourceReport {
    uri: String,
    kind: ProtocolKind,
    transport: Transport,
    data_source: ByteStreamFactory,
    manifest_source: Option<ByteStreamFactory>,
    drm: Option<DrmConfiguration>,
    key_session: Option<KeySessionReport>,
    warnings: Vec<String>,
    degraded: bool,
}

#[derive(Debug, Serialize)]
struct KeySessionReport {
    system: DrmSystem,
    uuid: String,
    multi_session: bool,
    provider: CryptoProvider,
    license_uri: Option<String>,
}

impl From<&SourceDescriptor> for SourceReport {
    fn from(source: &SourceDescriptor) -> Self {
        let manifest_source = match &source.pipeline {
            MediaPipeline::SmoothStreaming(p) => Some(p.manifest_source.clone()),
            MediaPipeline::Dash(p) => Some(p.manifest_source.clone()),
            MediaPipeline::Progressive(_) | MediaPipeline::Hls(_) => None,
        };
        let key_session = source.pipeline.drm_session_manager().map(|manager| KeySessionReport {
            system: manager.system(),
            uuid: manager.system().uuid().to_string(),
            multi_session: manager.multi_session(),
            provider: manager.provider(),
            license_uri: manager.license_callback().license_uri().map(str::to_string),
        });

        Self {
            uri: source.uri().to_string(),
            kind: source.kind,
            transport: source.transport,
            data_source: source.pipeline.data_source().clone(),
            manifest_source,
            drm: source.media_item.drm.clone(),
            key_session,
            warnings: source.warnings.iter().map(ToString::to_string).collect(),
            degraded: source.is_degraded(),
        }
    }
}

/// Resolve a source and print its descriptor
pub fn resolve(
    uri: &str,
    format_hint: Option<&str>,
    options: PlaybackOptions,
    crypto: Arc<dyn CryptoCapability>,
    format: &str,
) -> anyhow::Result<()> {
    let resolver = SourceResolver::new(crypto);
    let source = resolver.resolve(uri, format_hint, &options)?;

    println!("{}", format_output(&SourceReport::from(&source), OutputFormat::from(format)));
    Ok(())
}

/// End-of-replay summary
#[derive(Debug, Serialize)]
struct ReplaySummary {
    session_id: SessionId,
    final_state: PlayerState,
    initialized: bool,
    platform_calls: Vec<String>,
}

/// Replay a scripted timeline through a real session
pub async fn replay(
    uri: &str,
    format_hint: Option<&str>,
    options: PlaybackOptions,
    crypto: Arc<dyn CryptoCapability>,
    script_path: &Path,
    format: &str,
) -> anyhow::Result<()> {
    let format = OutputFormat::from(format);
    let script = Script::load(script_path)?;
    let engine = ScriptedEngine::new(&script);

    let resolver = SourceResolver::new(crypto);
    let mut session = PlaybackSession::new(&resolver, engine.backend(), uri, format_hint, options)?;
    let sink: Arc<dyn EventSink> = Arc::new(ConsoleSink::new(format));

    if !script.attaches_listener() {
        engine.listen(sink.clone())?;
    }

    for step in script.steps {
        match step {
            Step::Listen => engine.listen(sink.clone())?,
            Step::Cancel => engine.cancel()?,
            Step::Buffered { position_ms } => engine.set_buffered(position_ms),
            Step::Engine { event } => {
                if session.is_disposed() {
                    warn!(?event, "Session disposed, skipping engine callback");
                    continue;
                }
                engine.deliver(event)?;
                session.process_next().await;
            }
            Step::Dispose => session.dispose(),
            control => {
                if let Err(e) = apply_control(&session, &control) {
                    warn!(?control, error = %e, "Control rejected");
                }
            }
        }
    }

    session.dispose();
    info!(session_id = %session.id(), "Replay finished");

    let summary = ReplaySummary {
        session_id: session.id(),
        final_state: session.state(),
        initialized: session.is_initialized(),
        platform_calls: engine.calls(),
    };
    eprintln!("{}", format_output(&summary, format));
    Ok(())
}

fn apply_control(session: &PlaybackSession, step: &Step) -> kino_bridge::Result<()> {
    match *step {
        Step::Play => session.play(),
        Step::Pause => session.pause(),
        Step::Seek { position_ms } => session.seek_to(position_ms),
        Step::Volume { volume } => session.set_volume(volume),
        Step::Speed { speed } => session.set_playback_speed(speed),
        Step::Looping { looping } => session.set_looping(looping),
        Step::Listen
        | Step::Cancel
        | Step::Engine { .. }
        | Step::Buffered { .. }
        | Step::Dispose => Ok(()),
    }
}

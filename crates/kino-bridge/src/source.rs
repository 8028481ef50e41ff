//! Source resolution
//!
//! Turns a URI, an optional format hint and the playback options into the
//! pipeline handed to the engine:
//!
//! ```text
//!   uri ──► MediaUri ──► transport ──► ByteStreamFactory ─┐
//!    │                                                     ├─► MediaPipeline
//!   hint ─► ProtocolKind ──────────────────────────────────┘        │
//!                                                                   ▼
//!   options ─► DrmConfiguration ─► support check ─► SourceDescriptor
//! ```

use crate::byte_stream::{ByteStreamFactory, HttpByteStreamFactory};
use crate::drm::{
    CryptoCapability, DrmConfiguration, DrmSessionManager, DrmWarning, HttpLicenseCallback,
    SecurityLevel,
};
use crate::error::{Error, Result};
use crate::options::PlaybackOptions;
use crate::types::{DrmSystem, ProtocolKind, Transport};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use url::Url;

/// Media URI as supplied by the host.
///
/// Bare paths are not valid URLs, so the parsed form is optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUri {
    raw: String,
    url: Option<Url>,
}

impl MediaUri {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(Error::InvalidUri(raw.to_string()));
        }
        Ok(Self {
            raw: raw.to_string(),
            url: Url::parse(raw).ok(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn scheme(&self) -> Option<&str> {
        self.url.as_ref().map(|url| url.scheme())
    }

    /// `http` and `https` sources are remote, everything else is local
    pub fn transport(&self) -> Transport {
        match self.scheme() {
            Some("http") | Some("https") => Transport::Remote,
            _ => Transport::Local,
        }
    }

    /// Last non-empty path segment, without query or fragment
    pub fn last_path_segment(&self) -> Option<&str> {
        match &self.url {
            Some(url) => url.path_segments()?.filter(|s| !s.is_empty()).last(),
            None => {
                let path = self.raw.split(['?', '#']).next().unwrap_or_default();
                path.split('/').filter(|s| !s.is_empty()).last()
            }
        }
    }
}

impl std::fmt::Display for MediaUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Pick the protocol for a source.
///
/// An explicit hint wins and must be one of the known hints; otherwise the
/// last path segment's extension decides.
pub fn classify(uri: &MediaUri, format_hint: Option<&str>) -> Result<ProtocolKind> {
    match format_hint {
        Some(hint) => ProtocolKind::from_format_hint(hint)
            .ok_or_else(|| Error::UnsupportedFormat { hint: hint.to_string() }),
        None => Ok(ProtocolKind::infer(uri.last_path_segment().unwrap_or_default())),
    }
}

/// Media item handed to the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub uri: MediaUri,
    pub drm: Option<DrmConfiguration>,
}

/// Progressive download pipeline
#[derive(Debug, Clone)]
pub struct ProgressivePipeline {
    pub data_source: ByteStreamFactory,
}

/// HLS pipeline; playlists and segments share one factory
#[derive(Debug, Clone)]
pub struct HlsPipeline {
    pub data_source: ByteStreamFactory,
}

/// Smooth Streaming pipeline
#[derive(Debug, Clone)]
pub struct SmoothStreamingPipeline {
    /// Chunk source for media fragments
    pub chunk_source: ByteStreamFactory,
    /// Factory for manifest fetches
    pub manifest_source: ByteStreamFactory,
}

/// DASH pipeline with its key session manager
#[derive(Debug, Clone)]
pub struct DashPipeline {
    /// Chunk source for media segments
    pub chunk_source: ByteStreamFactory,
    /// Factory for manifest fetches
    pub manifest_source: ByteStreamFactory,
    pub drm_session_manager: DrmSessionManager,
}

/// Playback pipeline, one variant per protocol
#[derive(Debug, Clone)]
pub enum MediaPipeline {
    Progressive(ProgressivePipeline),
    Hls(HlsPipeline),
    SmoothStreaming(SmoothStreamingPipeline),
    Dash(DashPipeline),
}

impl MediaPipeline {
    pub fn kind(&self) -> ProtocolKind {
        match self {
            MediaPipeline::Progressive(_) => ProtocolKind::Progressive,
            MediaPipeline::Hls(_) => ProtocolKind::Hls,
            MediaPipeline::SmoothStreaming(_) => ProtocolKind::SmoothStreaming,
            MediaPipeline::Dash(_) => ProtocolKind::Dash,
        }
    }

    /// Factory used for media data
    pub fn data_source(&self) -> &ByteStreamFactory {
        match self {
            MediaPipeline::Progressive(p) => &p.data_source,
            MediaPipeline::Hls(p) => &p.data_source,
            MediaPipeline::SmoothStreaming(p) => &p.chunk_source,
            MediaPipeline::Dash(p) => &p.chunk_source,
        }
    }

    /// Key session manager, only present on DASH
    pub fn drm_session_manager(&self) -> Option<&DrmSessionManager> {
        match self {
            MediaPipeline::Dash(p) => Some(&p.drm_session_manager),
            _ => None,
        }
    }
}

/// Fully resolved source
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    pub kind: ProtocolKind,
    pub transport: Transport,
    pub media_item: MediaItem,
    pub pipeline: MediaPipeline,
    /// DRM problems found while resolving
    pub warnings: Vec<DrmWarning>,
}

impl SourceDescriptor {
    pub fn uri(&self) -> &MediaUri {
        &self.media_item.uri
    }

    /// True when DRM was requested but the platform cannot honor it.
    /// Playback of protected content will fail downstream.
    pub fn is_degraded(&self) -> bool {
        let dash_without_crypto = self.media_item.drm.is_some()
            && self
                .pipeline
                .drm_session_manager()
                .is_some_and(|manager| manager.is_degraded());
        !self.warnings.is_empty() || dash_without_crypto
    }
}

/// Resolves sources against the platform's crypto support
#[derive(Clone)]
pub struct SourceResolver {
    crypto: Arc<dyn CryptoCapability>,
}

impl SourceResolver {
    pub fn new(crypto: Arc<dyn CryptoCapability>) -> Self {
        Self { crypto }
    }

    pub fn crypto(&self) -> &dyn CryptoCapability {
        self.crypto.as_ref()
    }

    /// Resolve a source.
    ///
    /// Configuration problems are errors. DRM support problems are only
    /// warnings on the returned descriptor.
    #[instrument(skip(self, options))]
    pub fn resolve(
        &self,
        uri: &str,
        format_hint: Option<&str>,
        options: &PlaybackOptions,
    ) -> Result<SourceDescriptor> {
        options.validate()?;

        let uri = MediaUri::parse(uri)?;
        let kind = classify(&uri, format_hint)?;
        let transport = uri.transport();
        let data_source = ByteStreamFactory::for_transport(transport, options.user_agent());

        let media_item = MediaItem {
            drm: DrmConfiguration::from_options(options)?,
            uri,
        };

        let mut warnings = Vec::new();
        if let Some(drm) = &media_item.drm {
            if let Some(warning) = drm.check_support(self.crypto()) {
                warn!(warning = %warning, "DRM unavailable, playback will be degraded");
                warnings.push(warning);
            }
        }

        let pipeline = match kind {
            ProtocolKind::Progressive => MediaPipeline::Progressive(ProgressivePipeline { data_source }),
            ProtocolKind::Hls => MediaPipeline::Hls(HlsPipeline { data_source }),
            ProtocolKind::SmoothStreaming => MediaPipeline::SmoothStreaming(SmoothStreamingPipeline {
                manifest_source: data_source.manifest_factory(),
                chunk_source: data_source,
            }),
            ProtocolKind::Dash => MediaPipeline::Dash(DashPipeline {
                manifest_source: data_source.manifest_factory(),
                chunk_source: data_source,
                drm_session_manager: build_dash_session_manager(options, self.crypto()),
            }),
        };

        info!(
            uri = %media_item.uri,
            kind = %kind,
            transport = ?transport,
            drm = media_item.drm.is_some(),
            "Source resolved"
        );

        Ok(SourceDescriptor {
            kind,
            transport,
            media_item,
            pipeline,
            warnings,
        })
    }
}

/// Key session manager for DASH sources.
///
/// KNOWN QUIRK: built for every DASH source and always bound to Widevine,
/// even when the options request no DRM or name another scheme. The license
/// URI may therefore be absent, in which case key requests fail.
pub fn build_dash_session_manager(
    options: &PlaybackOptions,
    crypto: &dyn CryptoCapability,
) -> DrmSessionManager {
    let license_factory = HttpByteStreamFactory::new(options.user_agent());
    let callback = HttpLicenseCallback::new(options.drm_license_uri.clone(), license_factory);

    DrmSessionManager::builder(DrmSystem::Widevine)
        .multi_session(false)
        .security_level(SecurityLevel::L3)
        .build(Arc::new(callback), crypto)
}

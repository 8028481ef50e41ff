//! Core types for Kino Bridge

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Streaming protocol used to fetch the media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    /// Plain progressive download of a single container file
    Progressive,
    /// HTTP Live Streaming
    Hls,
    /// MPEG-DASH
    Dash,
    /// Microsoft Smooth Streaming
    SmoothStreaming,
}

impl ProtocolKind {
    /// Map an explicit format hint. Matching is case-exact.
    pub fn from_format_hint(hint: &str) -> Option<Self> {
        match hint {
            "ss" => Some(ProtocolKind::SmoothStreaming),
            "dash" => Some(ProtocolKind::Dash),
            "hls" => Some(ProtocolKind::Hls),
            "other" => Some(ProtocolKind::Progressive),
            _ => None,
        }
    }

    /// Infer the protocol from a file name by its extension.
    ///
    /// Total: anything unrecognized is progressive.
    pub fn infer(file_name: &str) -> Self {
        let name = file_name.to_lowercase();
        if name.ends_with(".mpd") {
            ProtocolKind::Dash
        } else if name.ends_with(".m3u8") {
            ProtocolKind::Hls
        } else if is_smooth_streaming_name(&name) {
            ProtocolKind::SmoothStreaming
        } else {
            ProtocolKind::Progressive
        }
    }

    /// The format hint string that selects this protocol
    pub fn format_hint(&self) -> &'static str {
        match self {
            ProtocolKind::SmoothStreaming => "ss",
            ProtocolKind::Dash => "dash",
            ProtocolKind::Hls => "hls",
            ProtocolKind::Progressive => "other",
        }
    }
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolKind::Progressive => write!(f, "progressive"),
            ProtocolKind::Hls => write!(f, "HLS"),
            ProtocolKind::Dash => write!(f, "DASH"),
            ProtocolKind::SmoothStreaming => write!(f, "SmoothStreaming"),
        }
    }
}

// Matches `.ism` / `.isml`, optionally followed by `/manifest` and anything after it.
fn is_smooth_streaming_name(name: &str) -> bool {
    for ext in [".isml", ".ism"] {
        if let Some(idx) = name.rfind(ext) {
            let rest = &name[idx + ext.len()..];
            if rest.is_empty() || rest == "/" || rest.starts_with("/manifest") {
                return true;
            }
        }
    }
    false
}

/// Where the media bytes come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Fetched over HTTP(S)
    Remote,
    /// Files, assets, content providers, bare paths
    Local,
}

/// DRM system types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrmSystem {
    Widevine,
    FairPlay,
    PlayReady,
    ClearKey,
    /// Key system known only by its UUID
    Other(Uuid),
}

impl DrmSystem {
    const KNOWN: [DrmSystem; 4] = [
        DrmSystem::Widevine,
        DrmSystem::FairPlay,
        DrmSystem::PlayReady,
        DrmSystem::ClearKey,
    ];

    /// Key system UUID, as found in PSSH boxes
    pub fn uuid(&self) -> Uuid {
        match self {
            DrmSystem::Widevine => Uuid::from_u128(0xedef8ba9_79d6_4ace_a3c8_27dcd51d21ed),
            DrmSystem::FairPlay => Uuid::from_u128(0x94ce86fb_07ff_4f43_adb8_93d2fa968ca2),
            DrmSystem::PlayReady => Uuid::from_u128(0x9a04f079_9840_4286_ab92_e65be0885f95),
            DrmSystem::ClearKey => Uuid::from_u128(0xe2719d58_a985_b3c9_781a_b030af78d30e),
            DrmSystem::Other(uuid) => *uuid,
        }
    }

    /// Key system for a UUID; well-known UUIDs map to their named system
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self::KNOWN
            .into_iter()
            .find(|system| system.uuid() == uuid)
            .unwrap_or(DrmSystem::Other(uuid))
    }

    /// Resolve a DRM scheme string.
    ///
    /// Accepts `widevine`, `playready`, `clearkey` (any case) or any literal
    /// key system UUID. Whether the platform supports it is checked later.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_lowercase().as_str() {
            "widevine" => Some(DrmSystem::Widevine),
            "playready" => Some(DrmSystem::PlayReady),
            "clearkey" => Some(DrmSystem::ClearKey),
            other => Uuid::parse_str(other).ok().map(Self::from_uuid),
        }
    }
}

impl std::fmt::Display for DrmSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrmSystem::Widevine => write!(f, "Widevine"),
            DrmSystem::FairPlay => write!(f, "FairPlay"),
            DrmSystem::PlayReady => write!(f, "PlayReady"),
            DrmSystem::ClearKey => write!(f, "ClearKey"),
            DrmSystem::Other(uuid) => write!(f, "{uuid}"),
        }
    }
}

/// Track types that may be bound to a DRM session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackType {
    Video,
    Audio,
    Text,
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Format of the selected video track as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    /// Clockwise rotation to apply for upright display
    pub rotation_degrees: u32,
}

impl VideoFormat {
    pub fn new(width: u32, height: u32, rotation_degrees: u32) -> Self {
        Self { width, height, rotation_degrees }
    }

    /// Dimensions of the upright frame.
    ///
    /// Portrait recordings are stored landscape with a 90° or 270° rotation,
    /// so those swap width and height.
    pub fn display_resolution(&self) -> Resolution {
        match self.rotation_degrees {
            90 | 270 => Resolution::new(self.height, self.width),
            _ => Resolution::new(self.width, self.height),
        }
    }
}

/// Session state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    /// Nothing handed to the engine yet
    Idle,
    /// Source handed to the engine, waiting for its first report
    Preparing,
    /// Engine can play from the current position
    Ready,
    /// Engine is loading data
    Buffering,
    /// End of stream reached
    Ended,
    /// Engine reported a playback error
    Errored,
}

impl PlayerState {
    /// Whether the engine is expected to move a session from this state
    /// into `target`. Unexpected moves are still applied, just logged.
    pub fn can_transition_to(&self, target: PlayerState) -> bool {
        use PlayerState::*;
        matches!(
            (self, target),
            // From Idle
            (Idle, Preparing) |
            // From Preparing
            (Preparing, Buffering) | (Preparing, Ready) | (Preparing, Errored) |
            // From Buffering
            (Buffering, Buffering) | (Buffering, Ready) | (Buffering, Ended) | (Buffering, Errored) |
            // From Ready
            (Ready, Ready) | (Ready, Buffering) | (Ready, Ended) | (Ready, Errored) |
            // From Ended
            (Ended, Buffering) | (Ended, Ready) | (Ended, Errored) |
            // From Errored
            (Errored, _)
        )
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Idle => write!(f, "idle"),
            PlayerState::Preparing => write!(f, "preparing"),
            PlayerState::Ready => write!(f, "ready"),
            PlayerState::Buffering => write!(f, "buffering"),
            PlayerState::Ended => write!(f, "ended"),
            PlayerState::Errored => write!(f, "errored"),
        }
    }
}

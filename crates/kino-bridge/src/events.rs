//! Session events delivered to the host
//!
//! Serialized in the shape host listeners expect:
//!
//! ```text
//! {"event":"initialized","duration":60000,"width":1920,"height":1080}
//! {"event":"bufferingUpdate","values":[[0,15000]]}
//! {"event":"completed"}
//! ```

use crate::types::VideoFormat;
use serde::{Deserialize, Serialize};

/// Buffered interval, `[start_ms, end_ms]`
pub type BufferedRange = [u64; 2];

/// Normalized playback event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SessionEvent {
    /// First time the engine became ready
    Initialized {
        #[serde(rename = "duration")]
        duration_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        width: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        height: Option<u32>,
    },
    /// Buffered ranges changed
    BufferingUpdate {
        #[serde(rename = "values")]
        buffered_ranges: Vec<BufferedRange>,
    },
    /// Natural end of stream
    Completed,
    /// Playback failure
    Error { message: String },
}

impl SessionEvent {
    /// Build an `Initialized` event, rotating dimensions to the upright frame
    pub fn initialized(duration_ms: u64, video_format: Option<VideoFormat>) -> Self {
        let resolution = video_format.map(|format| format.display_resolution());
        SessionEvent::Initialized {
            duration_ms,
            width: resolution.map(|r| r.width),
            height: resolution.map(|r| r.height),
        }
    }

    /// Single-range buffering update from the start of the media
    pub fn buffering(buffered_position_ms: u64) -> Self {
        SessionEvent::BufferingUpdate {
            buffered_ranges: vec![[0, buffered_position_ms]],
        }
    }

    /// Event name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Initialized { .. } => "initialized",
            SessionEvent::BufferingUpdate { .. } => "bufferingUpdate",
            SessionEvent::Completed => "completed",
            SessionEvent::Error { .. } => "error",
        }
    }
}

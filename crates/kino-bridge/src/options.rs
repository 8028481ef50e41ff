//! Per-session playback options
//!
//! Options arrive from the host as a string-keyed map and are resolved once
//! per session. They never change afterwards.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// User agent sent when the host does not supply one
pub const DEFAULT_USER_AGENT: &str = "KinoBridge";

/// Playback options supplied by the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackOptions {
    /// Allow audio to mix with other sessions instead of taking exclusive focus
    #[serde(deserialize_with = "null_as_false")]
    pub mix_with_others: bool,
    /// DRM scheme (`widevine`, `playready`, `clearkey` or a system UUID)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drm_scheme: Option<String>,
    /// License server URI, required whenever a scheme is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drm_license_uri: Option<String>,
    /// Establish a DRM session even for unencrypted audio/video tracks
    #[serde(deserialize_with = "null_as_false")]
    pub drm_session_for_clear_content: bool,
    /// User agent for media and license requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl PlaybackOptions {
    /// Build options from the host's map representation.
    ///
    /// Missing keys take their defaults. The result is validated.
    pub fn from_map(map: serde_json::Value) -> Result<Self> {
        let options: PlaybackOptions = serde_json::from_value(map)?;
        options.validate()?;
        Ok(options)
    }

    /// Convert back to the host's map representation
    pub fn to_map(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Create Widevine options for a license server
    pub fn widevine(license_uri: impl Into<String>) -> Self {
        Self {
            drm_scheme: Some("widevine".to_string()),
            drm_license_uri: Some(license_uri.into()),
            ..Default::default()
        }
    }

    /// Set a custom user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Allow mixing audio with other sessions
    pub fn with_mix_with_others(mut self, mix: bool) -> Self {
        self.mix_with_others = mix;
        self
    }

    /// Check the scheme/license invariant
    pub fn validate(&self) -> Result<()> {
        if let Some(scheme) = &self.drm_scheme {
            let missing = self
                .drm_license_uri
                .as_deref()
                .map_or(true, |uri| uri.trim().is_empty());
            if missing {
                return Err(Error::MissingLicenseUri { scheme: scheme.clone() });
            }
        }
        Ok(())
    }

    /// Effective user agent
    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }

    /// Check if a DRM scheme was requested
    pub fn has_drm(&self) -> bool {
        self.drm_scheme.is_some()
    }
}

fn null_as_false<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

//! DRM - key session wiring for protected sources
//!
//! Two independent pieces end up on a resolved source:
//!
//! - a [`DrmConfiguration`] attached to the media item itself, present only
//!   when the host asked for a DRM scheme;
//! - a [`DrmSessionManager`] attached to DASH pipelines, always bound to
//!   Widevine (see `source::build_dash_session_manager`).
//!
//! License acquisition goes through a [`LicenseCallback`]. The platform's
//! crypto support is an injected [`CryptoCapability`].

use crate::byte_stream::HttpByteStreamFactory;
use crate::error::{Error, Result};
use crate::options::PlaybackOptions;
use crate::types::{DrmSystem, TrackType};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Lowest platform API level with DRM support
pub const MIN_DRM_API_LEVEL: u32 = 18;

/// Non-fatal DRM problems found while resolving a source.
///
/// Playback continues, but protected content will fail downstream.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrmWarning {
    #[error("DRM content not supported on API level {level} (requires {required})")]
    ApiLevelTooLow { level: u32, required: u32 },

    #[error("This device does not support the {system} DRM scheme")]
    UnsupportedScheme { system: DrmSystem },
}

/// Crypto support offered by the platform
pub trait CryptoCapability: Send + Sync {
    /// Platform API level
    fn api_level(&self) -> u32;

    /// Check if a key system can be instantiated on this device
    fn is_scheme_supported(&self, system: DrmSystem) -> bool;
}

/// Fixed crypto capability, for hosts that check support up front
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticCryptoCapability {
    pub api_level: u32,
    pub supported: Vec<DrmSystem>,
}

impl StaticCryptoCapability {
    /// Capability with no key systems at all
    pub fn none(api_level: u32) -> Self {
        Self {
            api_level,
            supported: Vec::new(),
        }
    }

    /// Typical device: Widevine and ClearKey
    pub fn widevine(api_level: u32) -> Self {
        Self {
            api_level,
            supported: vec![DrmSystem::Widevine, DrmSystem::ClearKey],
        }
    }

    pub fn with_system(mut self, system: DrmSystem) -> Self {
        if !self.supported.contains(&system) {
            self.supported.push(system);
        }
        self
    }
}

impl CryptoCapability for StaticCryptoCapability {
    fn api_level(&self) -> u32 {
        self.api_level
    }

    fn is_scheme_supported(&self, system: DrmSystem) -> bool {
        self.supported.contains(&system)
    }
}

/// DRM attachment for a media item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrmConfiguration {
    /// Key system
    pub system: DrmSystem,
    /// License server URI
    pub license_uri: String,
    /// Extra headers for license requests
    pub license_request_headers: HashMap<String, String>,
    /// Track types that get a DRM session even when unencrypted
    pub session_for_clear_types: Vec<TrackType>,
}

impl DrmConfiguration {
    /// Build the attachment from playback options.
    ///
    /// Returns `None` when no scheme was requested.
    pub fn from_options(options: &PlaybackOptions) -> Result<Option<Self>> {
        let Some(scheme) = options.drm_scheme.as_deref() else {
            return Ok(None);
        };

        let system = DrmSystem::from_scheme(scheme)
            .ok_or_else(|| Error::UnsupportedDrmScheme(scheme.to_string()))?;
        let license_uri = options
            .drm_license_uri
            .clone()
            .ok_or_else(|| Error::MissingLicenseUri { scheme: scheme.to_string() })?;

        let session_for_clear_types = if options.drm_session_for_clear_content {
            vec![TrackType::Video, TrackType::Audio]
        } else {
            Vec::new()
        };

        Ok(Some(Self {
            system,
            license_uri,
            license_request_headers: HashMap::new(),
            session_for_clear_types,
        }))
    }

    /// Check the platform can honor this configuration
    pub fn check_support(&self, crypto: &dyn CryptoCapability) -> Option<DrmWarning> {
        let level = crypto.api_level();
        if level < MIN_DRM_API_LEVEL {
            Some(DrmWarning::ApiLevelTooLow {
                level,
                required: MIN_DRM_API_LEVEL,
            })
        } else if !crypto.is_scheme_supported(self.system) {
            Some(DrmWarning::UnsupportedScheme { system: self.system })
        } else {
            None
        }
    }
}

/// Widevine security level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityLevel {
    /// Hardware-backed
    L1,
    /// Software-only
    L3,
}

impl SecurityLevel {
    /// Value of the `securityLevel` key-system property
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityLevel::L1 => "L1",
            SecurityLevel::L3 => "L3",
        }
    }
}

/// Crypto backend a session manager ended up with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CryptoProvider {
    /// Platform key system, with the security level forced if requested
    Platform {
        system: DrmSystem,
        security_level: Option<SecurityLevel>,
    },
    /// No-op provider; any encrypted sample fails to decrypt
    Dummy,
}

/// Performs license requests for a key session
#[async_trait]
pub trait LicenseCallback: Send + Sync + std::fmt::Debug {
    /// Send a key request challenge, returning the license response
    async fn execute_key_request(&self, challenge: Bytes) -> Result<Bytes>;

    /// License server the callback talks to, if it has a fixed one
    fn license_uri(&self) -> Option<&str> {
        None
    }
}

/// License callback posting key requests to an HTTP license server
#[derive(Debug, Clone)]
pub struct HttpLicenseCallback {
    license_uri: Option<String>,
    factory: HttpByteStreamFactory,
    headers: HashMap<String, String>,
}

impl HttpLicenseCallback {
    pub fn new(license_uri: Option<String>, factory: HttpByteStreamFactory) -> Self {
        Self {
            license_uri,
            factory,
            headers: HashMap::new(),
        }
    }

    /// Add a header sent with every key request
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    pub fn user_agent(&self) -> &str {
        &self.factory.user_agent
    }

    fn header_map(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
        for (key, value) in &self.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| Error::InvalidConfig(format!("license header {key}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::InvalidConfig(format!("license header {key}: {e}")))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl LicenseCallback for HttpLicenseCallback {
    fn license_uri(&self) -> Option<&str> {
        self.license_uri.as_deref()
    }

    async fn execute_key_request(&self, challenge: Bytes) -> Result<Bytes> {
        let uri = self
            .license_uri
            .as_deref()
            .ok_or_else(|| Error::drm("no license server URI configured"))?;
        let url = Url::parse(uri).map_err(|_| Error::InvalidUri(uri.to_string()))?;

        debug!(url = %url, bytes = challenge.len(), "Executing key request");

        let response = self
            .factory
            .build_client()?
            .post(url)
            .headers(self.header_map()?)
            .body(challenge)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::drm(format!("license server returned {status}")));
        }

        Ok(response.bytes().await?)
    }
}

/// Key session manager bound to a single key system
#[derive(Debug, Clone)]
pub struct DrmSessionManager {
    system: DrmSystem,
    multi_session: bool,
    provider: CryptoProvider,
    callback: Arc<dyn LicenseCallback>,
}

impl DrmSessionManager {
    pub fn builder(system: DrmSystem) -> DrmSessionManagerBuilder {
        DrmSessionManagerBuilder {
            system,
            multi_session: false,
            security_level: None,
        }
    }

    pub fn system(&self) -> DrmSystem {
        self.system
    }

    pub fn multi_session(&self) -> bool {
        self.multi_session
    }

    pub fn provider(&self) -> CryptoProvider {
        self.provider
    }

    pub fn license_callback(&self) -> Arc<dyn LicenseCallback> {
        Arc::clone(&self.callback)
    }

    /// True when the platform could not supply the key system
    pub fn is_degraded(&self) -> bool {
        self.provider == CryptoProvider::Dummy
    }
}

/// Builder for [`DrmSessionManager`]
#[derive(Debug, Clone)]
pub struct DrmSessionManagerBuilder {
    system: DrmSystem,
    multi_session: bool,
    security_level: Option<SecurityLevel>,
}

impl DrmSessionManagerBuilder {
    pub fn multi_session(mut self, enabled: bool) -> Self {
        self.multi_session = enabled;
        self
    }

    /// Force the key system's security level
    pub fn security_level(mut self, level: SecurityLevel) -> Self {
        self.security_level = Some(level);
        self
    }

    /// Acquire the key system from the platform, falling back to a no-op
    /// provider when it is unavailable.
    pub fn build(
        self,
        callback: Arc<dyn LicenseCallback>,
        crypto: &dyn CryptoCapability,
    ) -> DrmSessionManager {
        let provider = if crypto.is_scheme_supported(self.system) {
            CryptoProvider::Platform {
                system: self.system,
                security_level: self.security_level,
            }
        } else {
            warn!(system = %self.system, "Key system unavailable, using dummy crypto");
            CryptoProvider::Dummy
        };

        DrmSessionManager {
            system: self.system,
            multi_session: self.multi_session,
            provider,
            callback,
        }
    }
}

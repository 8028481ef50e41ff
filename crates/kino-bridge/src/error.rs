//! Error types for Kino Bridge

use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Bridge error types
///
/// Configuration errors surface synchronously while a session is being
/// built and abort its construction. Playback failures never show up here;
/// they travel through the event stream instead.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Unsupported type: {hint}")]
    UnsupportedFormat { hint: String },

    #[error("Invalid media URI: {0:?}")]
    InvalidUri(String),

    #[error("DRM scheme {scheme} requires a license server URI")]
    MissingLicenseUri { scheme: String },

    #[error("Unsupported DRM scheme: {0}")]
    UnsupportedDrmScheme(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // DRM errors
    #[error("License acquisition failed: {0}")]
    LicenseAcquisition(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    // Session errors
    #[error("Playback session already disposed")]
    Disposed,

    // Internal errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a license acquisition error
    pub fn drm(msg: impl Into<String>) -> Self {
        Error::LicenseAcquisition(msg.into())
    }

    /// Returns true if this error was caused by the caller's configuration
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedFormat { .. }
                | Error::InvalidUri(_)
                | Error::MissingLicenseUri { .. }
                | Error::UnsupportedDrmScheme(_)
                | Error::InvalidConfig(_)
        )
    }

    /// Returns the error code reported to the host
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            Error::InvalidUri(_) => "INVALID_URI",
            Error::MissingLicenseUri { .. } => "MISSING_LICENSE_URI",
            Error::UnsupportedDrmScheme(_) => "DRM_UNSUPPORTED",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::LicenseAcquisition(_) => "LICENSE_ACQUIRE",
            Error::Network(_) => "NETWORK",
            Error::Disposed => "DISPOSED",
            Error::Json(_) => "JSON",
        }
    }
}

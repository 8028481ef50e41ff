//! Byte-stream factories handed to the media engine
//!
//! The engine owns the actual I/O. These types only describe how its
//! connections must be configured: user agent, timeouts, redirect policy.
//! The HTTP factory can also build a `reqwest` client with the same
//! settings, which is what license acquisition uses.

use crate::error::Result;
use crate::types::Transport;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connect timeout for remote sources
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(8_000);

/// Read timeout for remote sources
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(8_000);

const MAX_REDIRECTS: usize = 20;

/// Network-backed factory for `http`/`https` sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpByteStreamFactory {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Follow redirects that switch between http and https
    pub allow_cross_protocol_redirects: bool,
}

impl HttpByteStreamFactory {
    /// Factory with default timeouts and same-protocol redirects only
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            allow_cross_protocol_redirects: false,
        }
    }

    /// Factory used for media sources
    pub fn for_media(user_agent: impl Into<String>) -> Self {
        Self::new(user_agent).with_cross_protocol_redirects(true)
    }

    pub fn with_cross_protocol_redirects(mut self, allow: bool) -> Self {
        self.allow_cross_protocol_redirects = allow;
        self
    }

    /// Build an HTTP client with this factory's settings
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let allow_cross_protocol = self.allow_cross_protocol_redirects;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                return attempt.error("too many redirects");
            }
            let crosses_protocol = attempt
                .previous()
                .last()
                .is_some_and(|prev| prev.scheme() != attempt.url().scheme());
            if crosses_protocol && !allow_cross_protocol {
                attempt.stop()
            } else {
                attempt.follow()
            }
        });

        let client = reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .connect_timeout(self.connect_timeout)
            .read_timeout(self.read_timeout)
            .redirect(policy)
            .build()?;
        Ok(client)
    }
}

/// Factory for local sources (files, assets, content providers).
///
/// Anything that turns out to be remote is delegated to `upstream`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultByteStreamFactory {
    pub user_agent: String,
    pub upstream: HttpByteStreamFactory,
}

impl DefaultByteStreamFactory {
    pub fn new(user_agent: impl Into<String>) -> Self {
        let user_agent = user_agent.into();
        Self {
            upstream: HttpByteStreamFactory::new(user_agent.clone()),
            user_agent,
        }
    }

    /// Wrap an existing network factory
    pub fn with_upstream(upstream: HttpByteStreamFactory) -> Self {
        Self {
            user_agent: upstream.user_agent.clone(),
            upstream,
        }
    }
}

/// Byte-stream factory selected for a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ByteStreamFactory {
    Http(HttpByteStreamFactory),
    Default(DefaultByteStreamFactory),
}

impl ByteStreamFactory {
    /// Factory for a source reached over `transport`
    pub fn for_transport(transport: Transport, user_agent: &str) -> Self {
        match transport {
            Transport::Remote => ByteStreamFactory::Http(HttpByteStreamFactory::for_media(user_agent)),
            Transport::Local => ByteStreamFactory::Default(DefaultByteStreamFactory::new(user_agent)),
        }
    }

    /// Secondary factory for manifest fetches, layered over this one
    pub fn manifest_factory(&self) -> Self {
        let upstream = match self {
            ByteStreamFactory::Http(http) => http.clone(),
            ByteStreamFactory::Default(default) => default.upstream.clone(),
        };
        ByteStreamFactory::Default(DefaultByteStreamFactory::with_upstream(upstream))
    }

    pub fn user_agent(&self) -> &str {
        match self {
            ByteStreamFactory::Http(http) => &http.user_agent,
            ByteStreamFactory::Default(default) => &default.user_agent,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ByteStreamFactory::Http(_))
    }
}

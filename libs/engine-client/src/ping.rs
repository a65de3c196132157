//! Probe results.
//!
//! The daemon advertises its API version on `/_ping` through the
//! `API-Version` header. Some status endpoints return it in a JSON payload
//! instead, so both sources are read.

use http::HeaderMap;
use serde::Deserialize;

pub const API_VERSION_HEADER: &str = "api-version";
pub const OS_TYPE_HEADER: &str = "ostype";
pub const EXPERIMENTAL_HEADER: &str = "docker-experimental";
pub const BUILDER_VERSION_HEADER: &str = "builder-version";

/// What the daemon told us about itself on a probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ping {
    /// Advertised API version; `None` for daemons that predate advertising
    pub api_version: Option<String>,
    pub os_type: Option<String>,
    pub experimental: bool,
    pub builder_version: Option<String>,
}

#[derive(Deserialize)]
struct StatusPayload {
    #[serde(rename = "ApiVersion")]
    api_version: Option<String>,
}

impl Ping {
    /// A ping advertising `version`.
    #[must_use]
    pub fn with_api_version(version: impl Into<String>) -> Self {
        Self {
            api_version: Some(version.into()),
            ..Self::default()
        }
    }

    /// Read the probe headers. Empty header values count as absent.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(ToOwned::to_owned)
        };

        Self {
            api_version: text(API_VERSION_HEADER),
            os_type: text(OS_TYPE_HEADER),
            experimental: text(EXPERIMENTAL_HEADER).is_some_and(|v| v == "true"),
            builder_version: text(BUILDER_VERSION_HEADER),
        }
    }

    /// Fill a missing API version from a JSON status payload (`ApiVersion`).
    ///
    /// Bodies that are not JSON (`/_ping` answers `OK`) are ignored.
    #[must_use]
    pub fn with_payload_fallback(mut self, body: &[u8]) -> Self {
        if self.api_version.is_none()
            && let Ok(payload) = serde_json::from_slice::<StatusPayload>(body)
        {
            self.api_version = payload.api_version.filter(|v| !v.is_empty());
        }
        self
    }

    /// Advertised version if present and non-empty
    #[must_use]
    pub fn advertised_version(&self) -> Option<&str> {
        self.api_version.as_deref().filter(|v| !v.is_empty())
    }
}

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A mutating request hit a 3xx response and was not replayed.
///
/// Carries the original verb, the resolved redirect target and the redirect
/// status so the caller can still inspect what the daemon answered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{method} {location}: unexpected redirect in response ({status})")]
pub struct RedirectBlocked {
    /// Method of the original request
    pub method: http::Method,
    /// Target of the `Location` header, resolved against the request URI
    pub location: http::Uri,
    /// Status of the redirect response
    pub status: http::StatusCode,
}

/// Engine client error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EngineError {
    /// Host string is not a `scheme://address[/path]` value
    #[error("unable to parse daemon host `{host}`: {reason}")]
    InvalidHost {
        /// The rejected host string
        host: String,
        /// Diagnostic message (unstable format, for logging only)
        reason: String,
    },

    /// Certificate, key or CA material could not be loaded
    #[error("could not load TLS material from {}: {source}", path.display())]
    TlsConfig {
        /// File that failed to load
        path: PathBuf,
        /// Underlying I/O or decoding cause
        #[source]
        source: std::io::Error,
    },

    /// TLS setup failed after the material was loaded
    #[error("TLS error: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Mutating request was redirected
    #[error(transparent)]
    RedirectBlocked(#[from] RedirectBlocked),

    /// The version probe sent before the first request failed.
    ///
    /// Negotiation stays pending, so the next request probes again.
    #[error("API version negotiation probe failed: {0}")]
    NegotiationProbe(#[source] Box<EngineError>),

    /// Transport error (network, connection, unsupported dial target, etc)
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Single request timed out
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Request building failed
    #[error("Failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    /// Final request URI did not parse
    #[error("Invalid request URI '{uri}': {source}")]
    InvalidUri {
        /// The URI that failed to parse
        uri: String,
        /// Parser error
        #[source]
        source: http::uri::InvalidUri,
    },

    /// Invalid header name
    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// Invalid header value
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Response body exceeded size limit
    #[error("Response body too large: limit {limit} bytes, got {actual} bytes")]
    BodyTooLarge { limit: usize, actual: usize },

    /// Daemon answered with a non-2xx status
    #[error("HTTP {status}: {body_preview}")]
    HttpStatus {
        status: http::StatusCode,
        body_preview: String,
        content_type: Option<String>,
    },

    /// JSON encoding or decoding error
    #[error("JSON processing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Request buffer is full (fail-fast)
    #[error("Client overloaded: request buffer is full")]
    Overloaded,

    /// Internal service failure (buffer worker died, channel closed)
    #[error("Client unavailable: internal failure")]
    ServiceClosed,
}

impl EngineError {
    /// Returns the blocked redirect if this error (or the probe error it wraps)
    /// came from the redirect policy.
    #[must_use]
    pub fn redirect_blocked(&self) -> Option<&RedirectBlocked> {
        match self {
            EngineError::RedirectBlocked(blocked) => Some(blocked),
            EngineError::NegotiationProbe(inner) => inner.redirect_blocked(),
            _ => None,
        }
    }

    pub(crate) fn invalid_host(host: &str, reason: impl Into<String>) -> Self {
        EngineError::InvalidHost {
            host: host.to_owned(),
            reason: reason.into(),
        }
    }
}

impl From<hyper::Error> for EngineError {
    fn from(err: hyper::Error) -> Self {
        EngineError::Transport(Box::new(err))
    }
}

impl From<hyper_util::client::legacy::Error> for EngineError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        EngineError::Transport(Box::new(err))
    }
}

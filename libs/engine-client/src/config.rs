use crate::layers::DEFAULT_MAX_REDIRECTS;
use crate::tls::TlsOptions;
use std::collections::BTreeMap;
use std::time::Duration;

/// Default User-Agent string for engine API requests
pub const DEFAULT_USER_AGENT: &str = concat!("engine-client/", env!("CARGO_PKG_VERSION"));

/// Daemon host used when neither the builder nor the environment names one
#[cfg(not(windows))]
pub const DEFAULT_HOST: &str = "unix:///var/run/docker.sock";

/// Daemon host used when neither the builder nor the environment names one
#[cfg(windows)]
pub const DEFAULT_HOST: &str = "npipe:////./pipe/docker_engine";

/// TLS root certificate source used when no CA file is configured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsRootConfig {
    /// Use Mozilla's root certificates (webpki-roots, no OS dependency)
    #[default]
    WebPki,
    /// Use OS native root certificate store
    Native,
}

/// Engine client configuration
#[derive(Debug, Clone)]
pub struct EngineClientConfig {
    /// Daemon host, `scheme://address[/path]` (default: [`DEFAULT_HOST`])
    pub host: String,

    /// Pinned API version. `None` starts at `DEFAULT_API_VERSION` with
    /// negotiation available.
    pub version: Option<String>,

    /// Probe the daemon before the first request and downgrade to its
    /// advertised version (default: false)
    pub api_version_negotiation: bool,

    /// Client TLS material; `None` for plain HTTP or socket transports
    pub tls: Option<TlsOptions>,

    /// Root store used for verification when `tls` has no CA file (default: `WebPki`)
    pub tls_roots: TlsRootConfig,

    /// Per-request timeout, probe included (default: 30 seconds)
    pub request_timeout: Duration,

    /// User-Agent header value (default: [`DEFAULT_USER_AGENT`])
    pub user_agent: String,

    /// Extra headers sent on every request
    pub http_headers: BTreeMap<String, String>,

    /// Redirects followed for `GET`/`HEAD` before the last response is returned (default: 10)
    pub max_redirects: usize,

    /// Maximum response body size in bytes (default: 10 MB)
    pub max_body_size: usize,

    /// Requests that may queue in front of the transport (default: 1024)
    pub buffer_capacity: usize,

    /// Timeout for idle pooled connections (default: 90 seconds)
    ///
    /// Only used by the pooled TCP transport.
    pub pool_idle_timeout: Option<Duration>,

    /// Maximum number of idle connections per host (default: 32)
    pub pool_max_idle_per_host: usize,
}

impl Default for EngineClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            version: None,
            api_version_negotiation: false,
            tls: None,
            tls_roots: TlsRootConfig::default(),
            request_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            http_headers: BTreeMap::new(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_body_size: 10 * 1024 * 1024,
            buffer_capacity: 1024,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
        }
    }
}

impl EngineClientConfig {
    /// Configuration for tests: short timeout, negotiation off
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            buffer_capacity: 64,
            ..Self::default()
        }
    }
}

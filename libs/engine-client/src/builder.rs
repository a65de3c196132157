use crate::client::{BufferedService, EngineClient, Endpoint};
use crate::config::{EngineClientConfig, TlsRootConfig};
use crate::env::ClientEnv;
use crate::error::EngineError;
use crate::host::parse_host_url;
use crate::layers::{MutationSafeRedirectPolicy, UserAgentLayer};
use crate::negotiation::VersionNegotiator;
use crate::response::ResponseBody;
use crate::tls::TlsOptions;
use crate::transport::{self, Transport};
use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Request, Response};
use http_body_util::Full;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower::buffer::Buffer;
use tower::timeout::TimeoutLayer;
use tower::util::BoxCloneService;
use tower::{Service, ServiceBuilder, ServiceExt};
use tower_http::follow_redirect::FollowRedirectLayer;

/// Authority used in request URIs for socket hosts
const SOCKET_AUTHORITY: &str = "localhost";

/// Builder for constructing an [`EngineClient`]
///
/// Options apply in call order, so `.env(..)` followed by `.host(..)` keeps
/// the explicit host.
pub struct EngineClientBuilder {
    config: EngineClientConfig,
    transport: Option<Transport>,
}

impl EngineClientBuilder {
    /// Create a new builder with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineClientConfig::default())
    }

    /// Create a builder with a specific configuration
    #[must_use]
    pub fn with_config(config: EngineClientConfig) -> Self {
        Self {
            config,
            transport: None,
        }
    }

    /// Set the daemon host (`unix:///var/run/docker.sock`, `tcp://host:2375/base`)
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Pin the API version; disables negotiation. An empty version is ignored.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        if !version.is_empty() {
            self.config.version = Some(version);
        }
        self
    }

    /// Probe the daemon before the first request and downgrade to its version
    #[must_use]
    pub fn api_version_negotiation(mut self) -> Self {
        self.config.api_version_negotiation = true;
        self
    }

    /// Replace the host transport with a custom service.
    ///
    /// Requests reach it with absolute URIs, after the redirect, user agent
    /// and timeout layers. Configured TLS material is still loaded by
    /// [`build`](Self::build) and rejected there if invalid.
    #[must_use]
    pub fn http_client<S>(mut self, service: S) -> Self
    where
        S: Service<Request<Full<Bytes>>, Response = Response<ResponseBody>, Error = EngineError>
            + Clone
            + Send
            + 'static,
        S::Future: Send + 'static,
    {
        self.transport = Some(BoxCloneService::new(service));
        self
    }

    /// Use client TLS options
    #[must_use]
    pub fn tls(mut self, options: TlsOptions) -> Self {
        self.config.tls = Some(options);
        self
    }

    /// Use `ca.pem`, `cert.pem` and `key.pem` from `dir`
    #[must_use]
    pub fn tls_from_cert_dir(self, dir: impl AsRef<Path>, verify: bool) -> Self {
        self.tls(TlsOptions::from_cert_dir(dir, verify))
    }

    /// Root store used when no CA file is configured
    #[must_use]
    pub fn tls_roots(mut self, roots: TlsRootConfig) -> Self {
        self.config.tls_roots = roots;
        self
    }

    /// Apply environment overrides: certificates, then host, then version.
    #[must_use]
    pub fn env(mut self, env: &ClientEnv) -> Self {
        if let Some(tls) = env.tls_options() {
            self = self.tls(tls);
        }
        if let Some(host) = &env.host {
            self = self.host(host.clone());
        }
        if let Some(version) = &env.api_version {
            self = self.version(version.clone());
        }
        self
    }

    /// Set the per-request timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add a header sent on every request
    #[must_use]
    pub fn http_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.http_headers.insert(name.into(), value.into());
        self
    }

    /// Redirects followed for `GET`/`HEAD` before the redirect response is returned
    #[must_use]
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Set the request buffer capacity; clamped to at least 1
    #[must_use]
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    #[must_use]
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.pool_max_idle_per_host = max;
        self
    }

    /// Build the client
    ///
    /// Must be called inside a Tokio runtime: the request buffer spawns its
    /// worker task here.
    ///
    /// # Errors
    /// Returns an error if the host does not parse, a custom header or the
    /// user agent is invalid, or the configured TLS material cannot be loaded
    /// (whatever the host scheme or transport).
    pub fn build(self) -> Result<EngineClient, EngineError> {
        let config = self.config;
        let host = parse_host_url(&config.host)?;
        let custom_headers = header_map(&config.http_headers)?;
        let ua_layer = UserAgentLayer::try_new(&config.user_agent)?;

        // TLS material is validated even when the transport never uses it
        let tls_config = config
            .tls
            .as_ref()
            .map(|tls| tls.load_client_config(config.tls_roots))
            .transpose()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => transport::for_host(&host, &config, tls_config)?,
        };

        let negotiator = match config.version.as_deref().filter(|v| !v.is_empty()) {
            Some(version) => VersionNegotiator::pinned(version),
            None => VersionNegotiator::negotiable(None, config.api_version_negotiation),
        };

        let scheme = if config.tls.is_some() || host.scheme() == "https" {
            "https"
        } else {
            "http"
        };
        let authority = if host.is_socket() {
            SOCKET_AUTHORITY
        } else {
            host.host()
        };
        let endpoint = Endpoint {
            daemon_host: config.host.clone(),
            origin: format!("{scheme}://{authority}"),
            base_path: host.path().to_owned(),
        };

        // =======================================================================
        // Tower Layer Stack (outer to inner)
        //
        //   Buffer → ErrorMapping → Timeout → UserAgent → FollowRedirect → transport
        //
        // The redirect policy sees every hop, so a mutating request fails
        // with RedirectBlocked before the target is contacted.
        // =======================================================================
        let timeout = config.request_timeout;
        let service = ServiceBuilder::new()
            .layer(TimeoutLayer::new(timeout))
            .layer(ua_layer)
            .layer(FollowRedirectLayer::with_policy(
                MutationSafeRedirectPolicy::new(config.max_redirects),
            ))
            .service(transport)
            .map_err(move |e: tower::BoxError| map_tower_error(e, timeout));

        let buffered_service: BufferedService =
            Buffer::new(service.boxed_clone(), config.buffer_capacity.max(1));

        tracing::debug!(
            host = %host,
            version = %negotiator.working_version(),
            negotiation = ?negotiator.phase(),
            "engine client built"
        );

        Ok(EngineClient {
            service: buffered_service,
            negotiator: Arc::new(negotiator),
            endpoint: Arc::new(endpoint),
            custom_headers: Arc::new(custom_headers),
            max_body_size: config.max_body_size,
        })
    }
}

impl Default for EngineClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn header_map<'a>(
    headers: impl IntoIterator<Item = (&'a String, &'a String)>,
) -> Result<HeaderMap, EngineError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        map.insert(
            HeaderName::try_from(name.as_str())?,
            HeaderValue::try_from(value.as_str())?,
        );
    }
    Ok(map)
}

/// Map tower errors to `EngineError`
///
/// Timeouts carry the configured duration; typed errors from inner layers
/// (`RedirectBlocked`, transport failures) are unboxed as they are.
fn map_tower_error(err: tower::BoxError, timeout: Duration) -> EngineError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return EngineError::Timeout(timeout);
    }

    match err.downcast::<EngineError>() {
        Ok(engine_err) => *engine_err,
        Err(other) => EngineError::Transport(other),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_HOST, DEFAULT_USER_AGENT};
    use crate::negotiation::NegotiationPhase;
    use crate::version::DEFAULT_API_VERSION;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> ClientEnv {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        ClientEnv::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_builder_default() {
        let builder = EngineClientBuilder::new();
        assert_eq!(builder.config.host, DEFAULT_HOST);
        assert_eq!(builder.config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(builder.config.buffer_capacity, 1024);
        assert!(builder.transport.is_none());
    }

    #[tokio::test]
    async fn test_with_config() {
        let config = EngineClientConfig {
            host: "tcp://daemon.test:2375/engine".to_owned(),
            version: Some("1.33".to_owned()),
            ..EngineClientConfig::for_testing()
        };
        let client = EngineClientBuilder::with_config(config).build().unwrap();
        assert_eq!(client.client_version(), "1.33");
        assert_eq!(client.endpoint.origin, "http://daemon.test:2375");
        assert_eq!(client.endpoint.base_path, "/engine");
    }

    #[test]
    fn test_empty_version_is_ignored() {
        let builder = EngineClientBuilder::new().version("1.30").version("");
        assert_eq!(builder.config.version.as_deref(), Some("1.30"));
    }

    #[test]
    fn test_buffer_capacity_zero_clamped() {
        let builder = EngineClientBuilder::new().buffer_capacity(0);
        assert_eq!(builder.config.buffer_capacity, 1);
    }

    #[tokio::test]
    async fn test_build_default_client() {
        let client = EngineClientBuilder::new().build().unwrap();
        assert_eq!(client.daemon_host(), DEFAULT_HOST);
        assert_eq!(client.client_version(), DEFAULT_API_VERSION);
        assert_eq!(client.negotiation_phase(), NegotiationPhase::Pending);
    }

    #[tokio::test]
    async fn test_pinned_version() {
        let client = EngineClientBuilder::new().version("1.35").build().unwrap();
        assert_eq!(client.client_version(), "1.35");
        assert_eq!(client.negotiation_phase(), NegotiationPhase::Disabled);
    }

    #[tokio::test]
    async fn test_env_table() {
        let cases: &[(&[(&str, &str)], Result<&str, &str>)] = &[
            (&[], Ok(DEFAULT_API_VERSION)),
            (&[("DOCKER_CERT_PATH", "invalid/path")], Err("invalid/path/cert.pem")),
            (&[("DOCKER_HOST", "host")], Err("unable to parse daemon host `host`")),
            (&[("DOCKER_HOST", "invalid://url")], Ok(DEFAULT_API_VERSION)),
            (&[("DOCKER_API_VERSION", "1.22")], Ok("1.22")),
        ];

        for (vars, expected) in cases {
            let result = EngineClientBuilder::new().env(&env_of(vars)).build();
            match expected {
                Ok(version) => assert_eq!(result.unwrap().client_version(), *version, "{vars:?}"),
                Err(message) => {
                    let err = result.unwrap_err();
                    assert!(err.to_string().contains(message), "{vars:?}: {err}");
                }
            }
        }
    }

    #[tokio::test]
    async fn test_env_version_overrides_negotiation() {
        let client = EngineClientBuilder::new()
            .api_version_negotiation()
            .env(&env_of(&[("DOCKER_API_VERSION", "9.99")]))
            .build()
            .unwrap();
        client.negotiate_api_version_ping(&crate::ping::Ping::with_api_version("1.24"));
        assert_eq!(client.client_version(), "9.99");
    }

    #[tokio::test]
    async fn test_explicit_host_after_env_wins() {
        let client = EngineClientBuilder::new()
            .env(&env_of(&[("DOCKER_HOST", "tcp://from-env:2375")]))
            .host("tcp://explicit:2375")
            .build()
            .unwrap();
        assert_eq!(client.daemon_host(), "tcp://explicit:2375");
    }

    #[tokio::test]
    async fn test_tls_switches_scheme_to_https() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/testdata");
        let client = EngineClientBuilder::new()
            .host("tcp://daemon.test:2376")
            .tls_from_cert_dir(dir, true)
            .build()
            .unwrap();
        assert_eq!(client.endpoint.origin, "https://daemon.test:2376");
    }

    #[tokio::test]
    async fn test_socket_host_uses_placeholder_authority() {
        let client = EngineClientBuilder::new()
            .host("unix:///var/run/docker.sock")
            .build()
            .unwrap();
        assert_eq!(client.endpoint.origin, "http://localhost");
        assert_eq!(client.endpoint.base_path, "");
    }

    #[tokio::test]
    async fn test_invalid_tls_material_fails_with_custom_transport() {
        let transport = tower::service_fn(|_req: Request<Full<Bytes>>| {
            std::future::ready(Err::<Response<ResponseBody>, _>(EngineError::ServiceClosed))
        });
        let err = EngineClientBuilder::new()
            .host("tcp://daemon.test:2376")
            .http_client(transport)
            .tls_from_cert_dir("invalid/path", true)
            .build()
            .unwrap_err();

        assert!(
            matches!(&err, EngineError::TlsConfig { path, .. } if path.ends_with("ca.pem")),
            "{err}"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invalid_tls_material_fails_for_socket_host() {
        let err = EngineClientBuilder::new()
            .host("unix:///var/run/docker.sock")
            .tls_from_cert_dir("invalid/path", false)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("invalid/path/cert.pem"), "{err}");
    }

    #[tokio::test]
    async fn test_invalid_custom_header() {
        let result = EngineClientBuilder::new().http_header("bad header", "x").build();
        assert!(matches!(result, Err(EngineError::InvalidHeaderName(_))));
    }

    #[tokio::test]
    async fn test_invalid_user_agent() {
        let result = EngineClientBuilder::new().user_agent("bad\x00agent").build();
        assert!(matches!(result, Err(EngineError::InvalidHeaderValue(_))));
    }

    /// Skipping server verification is logged at build time
    #[tokio::test]
    async fn test_insecure_tls_warning_emitted() {
        use std::sync::Mutex;
        use tracing_subscriber::layer::SubscriberExt;

        #[derive(Clone, Default)]
        struct WarningCapture {
            warnings: Arc<Mutex<Vec<String>>>,
        }

        impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarningCapture {
            fn on_event(
                &self,
                event: &tracing::Event<'_>,
                _ctx: tracing_subscriber::layer::Context<'_, S>,
            ) {
                if *event.metadata().level() == tracing::Level::WARN {
                    let mut visitor = MessageVisitor(String::new());
                    event.record(&mut visitor);
                    self.warnings.lock().unwrap().push(visitor.0);
                }
            }
        }

        struct MessageVisitor(String);
        impl tracing::field::Visit for MessageVisitor {
            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    self.0 = format!("{value:?}");
                }
            }
        }

        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/testdata");
        let capture = WarningCapture::default();
        let warnings = Arc::clone(&capture.warnings);
        let subscriber = tracing_subscriber::registry().with(capture);

        tracing::subscriber::with_default(subscriber, || {
            EngineClientBuilder::new()
                .host("tcp://daemon.test:2376")
                .tls_from_cert_dir(&dir, false)
                .build()
                .unwrap();
        });

        let captured = warnings.lock().unwrap();
        assert!(
            captured.iter().any(|w| w.contains("daemon certificate is disabled")),
            "expected an insecure TLS warning, got: {:?}",
            *captured
        );
    }

    #[test]
    fn test_map_tower_error_timeout() {
        let elapsed = Box::new(tower::timeout::error::Elapsed::new());
        let err = map_tower_error(elapsed, Duration::from_secs(3));
        assert!(matches!(err, EngineError::Timeout(d) if d == Duration::from_secs(3)));
    }

    #[test]
    fn test_map_tower_error_preserves_engine_error() {
        let err = map_tower_error(Box::new(EngineError::Overloaded), Duration::from_secs(1));
        assert!(matches!(err, EngineError::Overloaded));
    }
}

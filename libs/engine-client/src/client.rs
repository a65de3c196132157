use crate::builder::EngineClientBuilder;
use crate::env::ClientEnv;
use crate::error::EngineError;
use crate::negotiation::{NegotiationPhase, VersionNegotiator};
use crate::path::build_api_path;
use crate::ping::Ping;
use crate::request::RequestBuilder;
use crate::response::{ResponseBody, checked_body, read_body_limited};
use crate::types::{ServerVersion, SystemInfo};
use bytes::Bytes;
use http::{HeaderMap, Request, Response};
use http_body_util::Full;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tower::Service;
use tower::buffer::Buffer;

/// Type alias for the future type of the inner service
pub type ServiceFuture =
    Pin<Box<dyn Future<Output = Result<Response<ResponseBody>, EngineError>> + Send>>;

/// Type alias for the buffered service
pub type BufferedService = Buffer<Request<Full<Bytes>>, ServiceFuture>;

/// Unversioned probe endpoint
const PING_PATH: &str = "/_ping";

/// Where requests are sent.
#[derive(Debug)]
pub struct Endpoint {
    /// Host string the client was built for
    pub daemon_host: String,
    /// `http://authority` or `https://authority`
    pub origin: String,
    /// Base path from the host string, possibly empty
    pub base_path: String,
}

/// Engine API client
///
/// Wraps a tower stack (timeout, user agent, redirect policy, transport)
/// and the version negotiator. Every call goes through
/// `<base path>/v<version>/<path>`; with automatic negotiation the first
/// call probes `/_ping` and downgrades the version to what the daemon
/// supports.
///
/// `EngineClient` is `Clone + Send + Sync`. Clones share the negotiated
/// version and the request buffer.
///
/// ```ignore
/// let client = EngineClient::builder()
///     .host("tcp://10.0.0.5:2375")
///     .api_version_negotiation()
///     .build()?;
///
/// let version = client.server_version().await?;
/// ```
#[derive(Clone)]
pub struct EngineClient {
    pub(crate) service: BufferedService,
    pub(crate) negotiator: Arc<VersionNegotiator>,
    pub(crate) endpoint: Arc<Endpoint>,
    pub(crate) custom_headers: Arc<HeaderMap>,
    pub(crate) max_body_size: usize,
}

impl std::fmt::Debug for EngineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineClient")
            .field("daemon_host", &self.endpoint.daemon_host)
            .field("version", &self.negotiator.working_version())
            .field("phase", &self.negotiator.phase())
            .finish_non_exhaustive()
    }
}

impl EngineClient {
    /// Create a builder for configuring the client
    #[must_use]
    pub fn builder() -> EngineClientBuilder {
        EngineClientBuilder::new()
    }

    /// Build a client from the process environment (`DOCKER_HOST`,
    /// `DOCKER_API_VERSION`, `DOCKER_TLS_VERIFY`, `DOCKER_CERT_PATH`).
    ///
    /// # Errors
    /// Returns an error if the host does not parse or the TLS material cannot be loaded.
    pub fn from_env() -> Result<Self, EngineError> {
        EngineClientBuilder::new()
            .env(&ClientEnv::from_process_env())
            .build()
    }

    /// Working API version
    #[must_use]
    pub fn client_version(&self) -> String {
        self.negotiator.working_version()
    }

    /// Host string the client was built for
    #[must_use]
    pub fn daemon_host(&self) -> &str {
        &self.endpoint.daemon_host
    }

    #[must_use]
    pub fn negotiation_phase(&self) -> NegotiationPhase {
        self.negotiator.phase()
    }

    /// Headers sent on every request
    #[must_use]
    pub fn custom_http_headers(&self) -> &HeaderMap {
        &self.custom_headers
    }

    /// Probe the daemon. Never versioned, never triggers negotiation.
    ///
    /// A response carrying an `API-Version` header is accepted whatever its
    /// status; otherwise non-2xx answers are errors.
    ///
    /// # Errors
    /// Returns a transport, timeout or `HttpStatus` error.
    pub async fn ping(&self) -> Result<Ping, EngineError> {
        let target = build_api_path(self.base_path(), None, PING_PATH, None);
        let mut builder = Request::get(self.request_uri(&target)?);
        if let Some(headers) = builder.headers_mut() {
            headers.extend(self.custom_headers.as_ref().clone());
        }
        let response = self.execute(builder.body(Full::new(Bytes::new()))?).await?;

        let ping = Ping::from_headers(response.headers());
        if ping.api_version.is_some() {
            return Ok(ping);
        }
        let body = if response.status().is_success() {
            read_body_limited(response, self.max_body_size).await?
        } else {
            checked_body(response, self.max_body_size).await?
        };
        Ok(ping.with_payload_fallback(&body))
    }

    /// Probe the daemon and downgrade the working version to what it supports.
    ///
    /// No-op for clients with a pinned version or completed negotiation.
    /// Serialized with the automatic probe of the first request.
    ///
    /// # Errors
    /// Returns `EngineError::NegotiationProbe` if the probe fails; the version
    /// is left unchanged.
    pub async fn negotiate_api_version(&self) -> Result<(), EngineError> {
        self.negotiator.negotiate(|| self.ping()).await
    }

    /// Downgrade the working version using a probe result obtained elsewhere.
    ///
    /// No-op for clients with a pinned version or completed negotiation.
    pub fn negotiate_api_version_ping(&self, ping: &Ping) {
        self.negotiator.apply_ping(ping);
    }

    /// `GET /info`
    ///
    /// # Errors
    /// Returns an error if the call fails or the daemon answers non-2xx.
    pub async fn info(&self) -> Result<SystemInfo, EngineError> {
        self.get("/info").send().await?.json().await
    }

    /// `GET /version`
    ///
    /// # Errors
    /// Returns an error if the call fails or the daemon answers non-2xx.
    pub async fn server_version(&self) -> Result<ServerVersion, EngineError> {
        self.get("/version").send().await?.json().await
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), http::Method::GET, path)
    }

    pub fn head(&self, path: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), http::Method::HEAD, path)
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), http::Method::POST, path)
    }

    pub fn put(&self, path: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), http::Method::PUT, path)
    }

    pub fn patch(&self, path: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), http::Method::PATCH, path)
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), http::Method::DELETE, path)
    }

    pub(crate) fn base_path(&self) -> &str {
        &self.endpoint.base_path
    }

    pub(crate) fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    pub(crate) fn request_uri(&self, target: &str) -> Result<http::Uri, EngineError> {
        let uri = format!("{}{target}", self.endpoint.origin);
        uri.parse()
            .map_err(|source| EngineError::InvalidUri { uri, source })
    }

    /// Run the automatic probe once, before the first versioned call.
    pub(crate) async fn ensure_negotiated(&self) -> Result<(), EngineError> {
        self.negotiator.ensure_negotiated(|| self.ping()).await
    }

    /// Send a prepared request through the buffered stack.
    pub(crate) async fn execute(
        &self,
        request: Request<Full<Bytes>>,
    ) -> Result<Response<ResponseBody>, EngineError> {
        let mut service = self.service.clone();
        try_acquire_buffer_slot(&mut service).await?;
        service.call(request).await.map_err(map_buffer_error)
    }
}

/// Map buffer errors to `EngineError`
///
/// Buffer passes inner service errors through boxed; anything else means
/// the worker is gone.
pub fn map_buffer_error(err: tower::BoxError) -> EngineError {
    match err.downcast::<EngineError>() {
        Ok(engine_err) => *engine_err,
        Err(err) => {
            tracing::error!(
                error = %err,
                "buffer worker closed unexpectedly; service unavailable"
            );
            EngineError::ServiceClosed
        }
    }
}

/// Try to acquire a buffer slot with fail-fast semantics.
///
/// If the buffer is full, returns `EngineError::Overloaded` immediately
/// instead of waiting.
///
/// # Errors
/// Returns `EngineError::Overloaded` when full, `EngineError::ServiceClosed` when the worker died.
pub async fn try_acquire_buffer_slot(service: &mut BufferedService) -> Result<(), EngineError> {
    use std::task::Poll;

    let poll_result = std::future::poll_fn(|cx| match service.poll_ready(cx) {
        Poll::Ready(result) => Poll::Ready(Some(result)),
        Poll::Pending => Poll::Ready(None),
    })
    .await;

    match poll_result {
        Some(Ok(())) => Ok(()),
        Some(Err(e)) => Err(map_buffer_error(e)),
        None => Err(EngineError::Overloaded),
    }
}

//! Dialers for daemon host schemes.
//!
//! Every transport is a boxed tower service taking absolute request URIs.
//! Socket transports rewrite the URI to origin-form before writing it to
//! the socket.

mod pooled;
#[cfg(any(unix, windows))]
mod socket;

use crate::config::EngineClientConfig;
use crate::error::EngineError;
use crate::host::ParsedHost;
use crate::response::ResponseBody;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use std::sync::Arc;
use tower::util::BoxCloneService;

/// Type-erased transport carrying requests to the daemon
pub type Transport = BoxCloneService<Request<Full<Bytes>>, Response<ResponseBody>, EngineError>;

/// Pick the transport for `host`.
///
/// `tls_config` is the client TLS configuration already loaded from the
/// configured material. Unknown schemes are accepted here and fail on the
/// first request, so a client can be built for a host it cannot dial.
///
/// # Errors
/// Returns `EngineError::Tls` if the default root store cannot be set up
/// for an `https` host.
pub fn for_host(
    host: &ParsedHost,
    config: &EngineClientConfig,
    tls_config: Option<rustls::ClientConfig>,
) -> Result<Transport, EngineError> {
    match host.scheme() {
        "tcp" | "http" | "https" => {
            pooled::transport(config, tls_config, host.scheme() == "https")
        }
        #[cfg(unix)]
        "unix" => Ok(socket::unix(host.host())),
        #[cfg(windows)]
        "npipe" => Ok(socket::named_pipe(host.host())),
        other => Ok(unsupported(other)),
    }
}

/// Transport failing every request with `EngineError::Transport`
fn unsupported(scheme: &str) -> Transport {
    tracing::debug!(scheme, "no transport for daemon host scheme");
    let message: Arc<str> = format!("unsupported protocol scheme `{scheme}`").into();
    BoxCloneService::new(tower::service_fn(move |_req: Request<Full<Bytes>>| {
        let message = Arc::clone(&message);
        async move {
            Err::<Response<ResponseBody>, _>(EngineError::Transport(message.to_string().into()))
        }
    }))
}

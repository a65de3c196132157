use super::Transport;
use crate::config::{EngineClientConfig, TlsRootConfig};
use crate::error::EngineError;
use crate::response::ResponseBody;
use crate::tls::TlsOptions;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::{Connect, HttpConnector};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tower::ServiceExt;
use tower::util::BoxCloneService;

/// Pooled hyper client for `tcp`/`http`/`https` hosts.
///
/// Hosts without client TLS options and without the `https` scheme get a
/// plain HTTP connector and never touch a root store.
///
/// # Errors
/// Returns a TLS error if the default root store cannot be set up for an
/// `https` host.
pub fn transport(
    config: &EngineClientConfig,
    tls_config: Option<rustls::ClientConfig>,
    https: bool,
) -> Result<Transport, EngineError> {
    match connector_tls(tls_config, https, config.tls_roots)? {
        Some(tls_config) => {
            let connector = hyper_rustls::HttpsConnectorBuilder::new()
                .with_tls_config(tls_config)
                .https_or_http()
                .enable_all_versions()
                .build();
            Ok(pooled_client(config, connector))
        }
        None => Ok(pooled_client(config, HttpConnector::new())),
    }
}

/// TLS configuration for the connector; `None` means plain HTTP.
fn connector_tls(
    tls_config: Option<rustls::ClientConfig>,
    https: bool,
    roots: TlsRootConfig,
) -> Result<Option<rustls::ClientConfig>, EngineError> {
    match tls_config {
        Some(tls_config) => Ok(Some(tls_config)),
        None if https => TlsOptions::default().load_client_config(roots).map(Some),
        None => Ok(None),
    }
}

fn pooled_client<C>(config: &EngineClientConfig, connector: C) -> Transport
where
    C: Connect + Clone + Send + Sync + 'static,
{
    // pool_timer is required for pool_idle_timeout to take effect
    let mut client_builder = Client::builder(TokioExecutor::new());
    client_builder
        .pool_timer(TokioTimer::new())
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .http2_only(false);
    if let Some(idle_timeout) = config.pool_idle_timeout {
        client_builder.pool_idle_timeout(idle_timeout);
    }

    let client = client_builder.build::<_, Full<Bytes>>(connector);
    let service = client
        .map_response(|response| {
            response.map(|body| -> ResponseBody { body.map_err(Into::into).boxed() })
        })
        .map_err(EngineError::from);

    BoxCloneService::new(service)
}

//! HTTP/1 over local sockets.
//!
//! Each request opens a fresh connection: the daemon socket is local, so
//! dialing is cheap and no pool is kept.

use super::Transport;
use crate::error::EngineError;
use crate::response::ResponseBody;
use bytes::Bytes;
use http::header::HOST;
use http::uri::PathAndQuery;
use http::{HeaderValue, Request, Response, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tower::util::BoxCloneService;

/// Transport dialing the Unix socket at `path`
#[cfg(unix)]
pub fn unix(path: &str) -> Transport {
    let path = Arc::new(PathBuf::from(path));
    BoxCloneService::new(tower::service_fn(move |request: Request<Full<Bytes>>| {
        let path = Arc::clone(&path);
        async move {
            let stream = tokio::net::UnixStream::connect(path.as_path())
                .await
                .map_err(|e| dial_error(&path, e))?;
            send_over(stream, request).await
        }
    }))
}

/// Transport dialing the named pipe at `path`
#[cfg(windows)]
pub fn named_pipe(path: &str) -> Transport {
    use tokio::net::windows::named_pipe::ClientOptions;

    let path = Arc::new(PathBuf::from(path));
    BoxCloneService::new(tower::service_fn(move |request: Request<Full<Bytes>>| {
        let path = Arc::clone(&path);
        async move {
            let pipe = ClientOptions::new()
                .open(path.as_path())
                .map_err(|e| dial_error(&path, e))?;
            send_over(pipe, request).await
        }
    }))
}

fn dial_error(path: &std::path::Path, err: io::Error) -> EngineError {
    EngineError::Transport(format!("cannot connect to daemon at {}: {err}", path.display()).into())
}

async fn send_over<S>(
    stream: S,
    request: Request<Full<Bytes>>,
) -> Result<Response<ResponseBody>, EngineError>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (mut sender, connection) =
        hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::debug!(error = %e, "daemon socket connection closed");
        }
    });

    let response = sender.send_request(into_origin_form(request)?).await?;
    Ok(response.map(|body| body.map_err(Into::into).boxed()))
}

/// Move the authority of an absolute URI into the `Host` header.
fn into_origin_form(
    mut request: Request<Full<Bytes>>,
) -> Result<Request<Full<Bytes>>, EngineError> {
    let host = request
        .uri()
        .authority()
        .map(|authority| HeaderValue::from_str(authority.as_str()))
        .transpose()?;
    let path_and_query = request
        .uri()
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));

    if let Some(host) = host {
        request.headers_mut().entry(HOST).or_insert(host);
    }
    *request.uri_mut() = Uri::from(path_and_query);
    Ok(request)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_into_origin_form() {
        let request = Request::get("http://localhost/v1.40/containers/json?all=1")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let request = into_origin_form(request).unwrap();

        assert_eq!(request.uri().to_string(), "/v1.40/containers/json?all=1");
        assert_eq!(request.headers()[HOST], "localhost");
    }

    #[test]
    fn test_into_origin_form_keeps_explicit_host() {
        let request = Request::get("http://localhost/_ping")
            .header(HOST, "daemon.internal")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let request = into_origin_form(request).unwrap();
        assert_eq!(request.headers()[HOST], "daemon.internal");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unix_dial_failure_is_transport_error() {
        use tower::ServiceExt;

        let dir = tempfile::tempdir().unwrap();
        let transport = unix(dir.path().join("missing.sock").to_str().unwrap());
        let request = Request::get("http://localhost/_ping")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let err = transport.oneshot(request).await.unwrap_err();
        assert!(matches!(err, EngineError::Transport(_)));
        assert!(err.to_string().contains("missing.sock"));
    }
}

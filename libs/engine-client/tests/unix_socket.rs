//! Integration test for the Unix socket transport.
//!
//! A raw HTTP/1.1 responder on a temporary socket stands in for the daemon
//! and records the request heads it receives.
#![cfg(unix)]

use engine_client::{EngineClient, NegotiationPhase};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixListener;

/// Serve every connection with one fixed response, recording request heads.
fn spawn_daemon(listener: UnixListener, heads: Arc<Mutex<Vec<String>>>) {
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let heads = Arc::clone(&heads);
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = stream.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        return;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                heads.lock().unwrap().push(String::from_utf8_lossy(&buf).into_owned());

                let body = r#"{"ID":"socket-daemon"}"#;
                let response = format!(
                    concat!(
                        "HTTP/1.1 200 OK\r\n",
                        "Api-Version: 1.30\r\n",
                        "Content-Type: application/json\r\n",
                        "Content-Length: {}\r\n",
                        "Connection: close\r\n\r\n{}",
                    ),
                    body.len(),
                    body
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
            });
        }
    });
}

#[tokio::test]
async fn negotiates_and_calls_over_unix_socket() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("engine.sock");
    let listener = UnixListener::bind(&socket).unwrap();
    let heads = Arc::new(Mutex::new(Vec::new()));
    spawn_daemon(listener, Arc::clone(&heads));

    let client = EngineClient::builder()
        .host(format!("unix://{}", socket.display()))
        .api_version_negotiation()
        .build()
        .unwrap();

    let info = client.info().await.unwrap();
    assert_eq!(info.id, "socket-daemon");
    assert_eq!(client.client_version(), "1.30");
    assert_eq!(client.negotiation_phase(), NegotiationPhase::Negotiated);

    let heads = heads.lock().unwrap();
    assert_eq!(heads.len(), 2);
    assert!(heads[0].starts_with("GET /_ping HTTP/1.1\r\n"), "{}", heads[0]);
    assert!(heads[1].starts_with("GET /v1.30/info HTTP/1.1\r\n"), "{}", heads[1]);
    assert!(heads[1].to_ascii_lowercase().contains("host: localhost\r\n"));
}

#[tokio::test]
async fn missing_socket_is_a_transport_error() {
    let dir = tempfile::tempdir().unwrap();
    let client = EngineClient::builder()
        .host(format!("unix://{}", dir.path().join("absent.sock").display()))
        .build()
        .unwrap();

    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, engine_client::EngineError::Transport(_)), "{err}");
    assert!(err.to_string().contains("absent.sock"), "{err}");
}

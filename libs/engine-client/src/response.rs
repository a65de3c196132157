use crate::error::EngineError;
use bytes::Bytes;
use http::{HeaderMap, Response, StatusCode};
use http_body_util::BodyExt;
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Maximum body preview kept in [`EngineError::HttpStatus`] (8KB)
pub const ERROR_BODY_PREVIEW_LIMIT: usize = 8 * 1024;

/// Boxed response body shared by every transport
pub type ResponseBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// Error payload returned by the daemon for failed calls
#[derive(Deserialize)]
struct ErrorPayload {
    message: String,
}

/// Daemon response with size-limited body readers
///
/// - `resp.error_for_status()?` - Check status without reading body
/// - `resp.bytes().await?` - Read raw bytes
/// - `resp.checked_bytes().await?` - Read bytes with status check
/// - `resp.json::<T>().await?` - Parse as JSON with status check
#[derive(Debug)]
pub struct EngineResponse {
    pub(crate) inner: Response<ResponseBody>,
    pub(crate) max_body_size: usize,
}

impl EngineResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Consume the wrapper and return the inner response with boxed body
    #[must_use]
    pub fn into_inner(self) -> Response<ResponseBody> {
        self.inner
    }

    /// Limit applied by the body readers
    #[must_use]
    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    /// Return an error for non-2xx responses without reading the body.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::HttpStatus` with an empty preview if the status is not 2xx.
    pub fn error_for_status(self) -> Result<Self, EngineError> {
        if self.inner.status().is_success() {
            return Ok(self);
        }

        Err(EngineError::HttpStatus {
            status: self.inner.status(),
            body_preview: String::new(),
            content_type: content_type(self.inner.headers()),
        })
    }

    /// Read the body without a status check.
    ///
    /// # Errors
    /// Returns `EngineError::BodyTooLarge` if the body exceeds the limit.
    pub async fn bytes(self) -> Result<Bytes, EngineError> {
        read_body_limited(self.inner, self.max_body_size).await
    }

    /// Read the body, failing on non-2xx statuses.
    ///
    /// # Errors
    /// Returns `EngineError::HttpStatus` if status is not 2xx.
    /// Returns `EngineError::BodyTooLarge` if the body exceeds the limit.
    pub async fn checked_bytes(self) -> Result<Bytes, EngineError> {
        checked_body(self.inner, self.max_body_size).await
    }

    /// Parse the body as JSON, failing on non-2xx statuses.
    ///
    /// # Errors
    /// Returns `EngineError::HttpStatus` if status is not 2xx.
    /// Returns `EngineError::BodyTooLarge` if the body exceeds the limit.
    /// Returns `EngineError::Json` if parsing fails.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, EngineError> {
        let body = checked_body(self.inner, self.max_body_size).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Read the body as lossy UTF-8, failing on non-2xx statuses.
    ///
    /// # Errors
    /// Returns `EngineError::HttpStatus` if status is not 2xx.
    /// Returns `EngineError::BodyTooLarge` if the body exceeds the limit.
    pub async fn text(self) -> Result<String, EngineError> {
        let body = checked_body(self.inner, self.max_body_size).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Preview text for a failed call: the daemon's `message` field when the
/// body is a JSON error payload, the raw body otherwise.
fn error_preview(body: &[u8]) -> String {
    match serde_json::from_slice::<ErrorPayload>(body) {
        Ok(payload) => payload.message,
        Err(_) => String::from_utf8_lossy(body).trim_end().to_owned(),
    }
}

/// Read the body, converting non-2xx statuses into `EngineError::HttpStatus`.
///
/// # Errors
/// Returns `EngineError::HttpStatus`, `EngineError::BodyTooLarge` or a transport error.
pub async fn checked_body(
    response: Response<ResponseBody>,
    max_body_size: usize,
) -> Result<Bytes, EngineError> {
    let status = response.status();
    if status.is_success() {
        return read_body_limited(response, max_body_size).await;
    }

    let content_type = content_type(response.headers());
    let preview_limit = max_body_size.min(ERROR_BODY_PREVIEW_LIMIT);
    let body_preview = match read_body_limited(response, preview_limit).await {
        Ok(bytes) => error_preview(&bytes),
        Err(EngineError::BodyTooLarge { .. }) => "<body too large for preview>".to_owned(),
        Err(e) => return Err(e),
    };

    Err(EngineError::HttpStatus {
        status,
        body_preview,
        content_type,
    })
}

/// Collect the body, failing once more than `limit` bytes arrive.
///
/// # Errors
/// Returns `EngineError::BodyTooLarge` past the limit or `EngineError::Transport` on read failure.
pub async fn read_body_limited(
    response: Response<ResponseBody>,
    limit: usize,
) -> Result<Bytes, EngineError> {
    let mut body = std::pin::pin!(response.into_body());
    let mut collected = Vec::new();

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(EngineError::Transport)?;
        if let Some(chunk) = frame.data_ref() {
            if collected.len() + chunk.len() > limit {
                return Err(EngineError::BodyTooLarge {
                    limit,
                    actual: collected.len() + chunk.len(),
                });
            }
            collected.extend_from_slice(chunk);
        }
    }

    Ok(Bytes::from(collected))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http_body_util::Full;

    const OVERSIZED: &str =
        "0123456789012345678901234567890123456789012345678901234567890123456789";

    fn response(status: u16, content_type: Option<&str>, body: &'static str) -> EngineResponse {
        let mut builder = Response::builder().status(status);
        if let Some(ct) = content_type {
            builder = builder.header(http::header::CONTENT_TYPE, ct);
        }
        let body: ResponseBody = Full::new(Bytes::from_static(body.as_bytes()))
            .map_err(|never| match never {})
            .boxed();
        EngineResponse {
            inner: builder.body(body).unwrap(),
            max_body_size: 64,
        }
    }

    #[tokio::test]
    async fn test_json_success() {
        #[derive(Deserialize)]
        struct Version {
            #[serde(rename = "ApiVersion")]
            api_version: String,
        }

        let resp = response(200, Some("application/json"), r#"{"ApiVersion":"1.41"}"#);
        let version: Version = resp.json().await.unwrap();
        assert_eq!(version.api_version, "1.41");
    }

    #[tokio::test]
    async fn test_daemon_error_message_is_extracted() {
        let resp = response(
            404,
            Some("application/json"),
            r#"{"message":"No such container: abc"}"#,
        );
        match resp.text().await.unwrap_err() {
            EngineError::HttpStatus {
                status,
                body_preview,
                content_type,
            } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(body_preview, "No such container: abc");
                assert_eq!(content_type.as_deref(), Some("application/json"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_plain_error_body_is_kept() {
        let resp = response(500, Some("text/plain"), "boom\n");
        let err = resp.checked_bytes().await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::HttpStatus { ref body_preview, .. } if body_preview == "boom"
        ));
    }

    #[tokio::test]
    async fn test_body_limit() {
        let resp = response(200, None, OVERSIZED);
        let err = resp.bytes().await.unwrap_err();
        assert!(matches!(err, EngineError::BodyTooLarge { limit: 64, .. }));
    }

    #[tokio::test]
    async fn test_oversized_error_body_keeps_status() {
        let resp = response(503, None, OVERSIZED);
        let err = resp.checked_bytes().await.unwrap_err();
        match err {
            EngineError::HttpStatus { status, body_preview, .. } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body_preview, "<body too large for preview>");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_error_for_status() {
        assert!(response(204, None, "").error_for_status().is_ok());
        let err = response(409, None, "conflict").error_for_status().unwrap_err();
        assert!(matches!(
            err,
            EngineError::HttpStatus { status, .. } if status == StatusCode::CONFLICT
        ));
    }

    #[test]
    fn test_into_inner_keeps_status_and_headers() {
        let resp = response(204, Some("text/plain"), "");
        assert_eq!(resp.max_body_size(), 64);
        let inner = resp.into_inner();
        assert_eq!(inner.status(), StatusCode::NO_CONTENT);
        assert_eq!(inner.headers()[http::header::CONTENT_TYPE], "text/plain");
    }
}

use crate::client::EngineClient;
use crate::error::EngineError;
use crate::path::{Query, build_api_path};
use crate::response::EngineResponse;
use bytes::Bytes;
use http::Request;
use http::header::{HeaderName, HeaderValue};
use http_body_util::Full;
use serde::Serialize;

#[derive(Clone, Debug)]
enum BodyKind {
    Empty,
    Bytes(Bytes),
    /// Serialized JSON; sets a default content type
    Json(Bytes),
}

/// Builder for one versioned API call
///
/// Created by [`EngineClient::get`], [`EngineClient::post`], etc. The path
/// is the logical API path (`/containers/json`); the base path and the
/// version prefix are added at send time, after negotiation.
///
/// ```ignore
/// let containers: Vec<Summary> = client
///     .get("/containers/json")
///     .query("all", "1")
///     .send()
///     .await?
///     .json()
///     .await?;
/// ```
#[must_use = "RequestBuilder does nothing until .send() is called"]
pub struct RequestBuilder {
    client: EngineClient,
    method: http::Method,
    path: String,
    query: Query,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: BodyKind,
    /// Error captured during building (deferred to `send()`)
    error: Option<EngineError>,
}

impl RequestBuilder {
    pub(crate) fn new(client: EngineClient, method: http::Method, path: &str) -> Self {
        Self {
            client,
            method,
            path: path.to_owned(),
            query: Query::new(),
            headers: Vec::new(),
            body: BodyKind::Empty,
            error: None,
        }
    }

    /// Append a query parameter
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.append(key, value);
        self
    }

    /// Append every parameter of `query`
    pub fn query_params(mut self, query: &Query) -> Self {
        for (key, value) in query.iter() {
            self.query.append(key, value);
        }
        self
    }

    /// Add a header; it replaces a client-wide custom header of the same name.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }

        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => self.headers.push((name, value)),
            (Err(e), _) => self.error = Some(EngineError::InvalidHeaderName(e)),
            (_, Err(e)) => self.error = Some(EngineError::InvalidHeaderValue(e)),
        }
        self
    }

    /// Set a JSON body; `content-type: application/json` is added unless set.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Json` if serialization fails, or an error
    /// deferred by an earlier builder call.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, EngineError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        self.body = BodyKind::Json(Bytes::from(serde_json::to_vec(body)?));
        Ok(self)
    }

    /// Set a raw body
    pub fn body_bytes(mut self, body: Bytes) -> Self {
        self.body = BodyKind::Bytes(body);
        self
    }

    /// Negotiate if needed, then send the request.
    ///
    /// Every status is returned as a response; use
    /// [`EngineResponse::error_for_status`] or the checked readers to fail on
    /// non-2xx.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if:
    /// - a header given to the builder was invalid
    /// - the version probe failed (`NegotiationProbe`)
    /// - the final URI does not parse
    /// - a mutating request was redirected (`RedirectBlocked`)
    /// - transport failure, timeout, or a full request buffer (`Overloaded`)
    pub async fn send(self) -> Result<EngineResponse, EngineError> {
        if let Some(e) = self.error {
            return Err(e);
        }

        let client = self.client;
        client.ensure_negotiated().await?;

        let version = client.client_version();
        let target = build_api_path(
            client.base_path(),
            Some(&version),
            &self.path,
            Some(&self.query),
        );
        let uri = client.request_uri(&target)?;

        let mut builder = Request::builder().method(self.method).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            headers.extend(client.custom_http_headers().clone());
            for (name, value) in self.headers {
                headers.insert(name, value);
            }
            if matches!(self.body, BodyKind::Json(_))
                && !headers.contains_key(http::header::CONTENT_TYPE)
            {
                headers.insert(
                    http::header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
            }
        }

        let body = match self.body {
            BodyKind::Empty => Bytes::new(),
            BodyKind::Bytes(b) | BodyKind::Json(b) => b,
        };
        let request = builder.body(Full::new(body))?;

        let inner = client.execute(request).await?;
        Ok(EngineResponse {
            inner,
            max_body_size: client.max_body_size(),
        })
    }
}

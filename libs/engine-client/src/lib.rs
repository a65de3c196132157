#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Client core for a versioned container engine API
//!
//! This crate provides a hyper-based engine client with:
//! - Daemon host parsing (`unix://`, `npipe://`, `tcp://`, `http(s)://`)
//! - Versioned API paths (`<base>/v<version>/<path>?<query>`)
//! - API version negotiation against `/_ping`, downgrade only
//! - A redirect policy that never replays mutating requests
//! - Client TLS from a certificate directory (`ca.pem`, `cert.pem`, `key.pem`)
//! - `DOCKER_HOST`, `DOCKER_API_VERSION`, `DOCKER_TLS_VERIFY` and
//!   `DOCKER_CERT_PATH` overrides
//!
//! # Version negotiation
//!
//! A client starts at [`DEFAULT_API_VERSION`]. With
//! [`EngineClientBuilder::api_version_negotiation`] the first request probes
//! the daemon once and lowers the version to what it advertises (or to
//! [`FALLBACK_API_VERSION`] for daemons that advertise nothing). An explicit
//! version, including one from `DOCKER_API_VERSION`, disables negotiation.
//!
//! # Example
//!
//! ```ignore
//! use engine_client::EngineClient;
//!
//! let client = EngineClient::builder()
//!     .host("tcp://10.0.0.5:2375")
//!     .api_version_negotiation()
//!     .build()?;
//!
//! let containers: serde_json::Value = client
//!     .get("/containers/json")
//!     .query("all", "1")
//!     .send()
//!     .await?
//!     .json()
//!     .await?;
//! ```

mod builder;
mod client;
mod config;
mod env;
mod error;
mod host;
mod layers;
mod negotiation;
mod path;
mod ping;
mod request;
mod response;
mod tls;
mod transport;
mod types;
mod version;

pub use builder::EngineClientBuilder;
pub use client::EngineClient;
pub use config::{DEFAULT_HOST, DEFAULT_USER_AGENT, EngineClientConfig, TlsRootConfig};
pub use env::{
    ClientEnv, DOCKER_API_VERSION_ENV, DOCKER_CERT_PATH_ENV, DOCKER_HOST_ENV, DOCKER_TLS_VERIFY_ENV,
};
pub use error::{EngineError, RedirectBlocked};
pub use host::{ParsedHost, parse_host_url};
pub use layers::{
    DEFAULT_MAX_REDIRECTS, MutationSafeRedirectPolicy, RedirectDecision, UserAgentLayer,
    UserAgentService, decide,
};
pub use negotiation::{NegotiationPhase, VersionNegotiator};
pub use path::{Query, build_api_path};
pub use ping::{
    API_VERSION_HEADER, BUILDER_VERSION_HEADER, EXPERIMENTAL_HEADER, OS_TYPE_HEADER, Ping,
};
pub use request::RequestBuilder;
pub use response::{ERROR_BODY_PREVIEW_LIMIT, EngineResponse, ResponseBody};
pub use tls::{CA_FILE_NAME, CERT_FILE_NAME, KEY_FILE_NAME, TlsOptions};
pub use transport::Transport;
pub use types::{ComponentVersion, ServerVersion, SystemInfo};
pub use version::{
    ApiVersion, DEFAULT_API_VERSION, FALLBACK_API_VERSION, ParseApiVersionError, compare_versions,
    less_than, strip_v_prefix,
};

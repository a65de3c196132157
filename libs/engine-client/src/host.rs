//! Daemon host strings.
//!
//! A host is written `scheme://address[/path]`, for example
//! `unix:///var/run/docker.sock` or `tcp://10.0.0.5:2376/engine`. Parsing is
//! purely syntactic: whether a scheme can actually be dialed is decided when
//! the transport is built.

use crate::error::EngineError;
use std::fmt;

const SCHEME_SEPARATOR: &str = "://";

/// Schemes whose address is a socket path rather than `host[:port]`.
const SOCKET_SCHEMES: &[&str] = &["unix", "npipe"];

/// Host string split into its components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHost {
    scheme: String,
    host: String,
    path: String,
}

impl ParsedHost {
    /// Scheme exactly as written (`tcp`, `unix`, ...)
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Address: `host[:port]` for network schemes, the socket path otherwise
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Base path below which the API lives; empty when none was given
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// `true` for `unix`/`npipe` hosts
    #[must_use]
    pub fn is_socket(&self) -> bool {
        SOCKET_SCHEMES.contains(&self.scheme.as_str())
    }
}

impl fmt::Display for ParsedHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SCHEME_SEPARATOR}{}{}", self.scheme, self.host, self.path)
    }
}

/// Parse a daemon host string.
///
/// # Errors
///
/// Returns [`EngineError::InvalidHost`] if the string is empty, has no
/// `://` separator, or has an empty scheme or address.
pub fn parse_host_url(host: &str) -> Result<ParsedHost, EngineError> {
    let Some((scheme, addr)) = host.split_once(SCHEME_SEPARATOR) else {
        return Err(EngineError::invalid_host(host, "missing scheme separator"));
    };
    if scheme.is_empty() {
        return Err(EngineError::invalid_host(host, "empty scheme"));
    }
    if addr.is_empty() {
        return Err(EngineError::invalid_host(host, "empty address"));
    }

    let (address, path) = if SOCKET_SCHEMES.contains(&scheme) {
        (addr, "")
    } else {
        match addr.find('/') {
            Some(idx) => addr.split_at(idx),
            None => (addr, ""),
        }
    };
    if address.is_empty() {
        return Err(EngineError::invalid_host(host, "empty address"));
    }

    Ok(ParsedHost {
        scheme: scheme.to_owned(),
        host: address.to_owned(),
        path: path.to_owned(),
    })
}

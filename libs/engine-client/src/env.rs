//! Environment overrides.
//!
//! The client core never reads the process environment itself; callers
//! collect overrides here and hand them to the builder.

use crate::tls::TlsOptions;
use std::path::PathBuf;

/// Daemon host override
pub const DOCKER_HOST_ENV: &str = "DOCKER_HOST";
/// API version override; pins the version and disables negotiation
pub const DOCKER_API_VERSION_ENV: &str = "DOCKER_API_VERSION";
/// Any non-empty value enables verification of the daemon certificate
pub const DOCKER_TLS_VERIFY_ENV: &str = "DOCKER_TLS_VERIFY";
/// Directory holding `ca.pem`, `cert.pem` and `key.pem`
pub const DOCKER_CERT_PATH_ENV: &str = "DOCKER_CERT_PATH";

/// Overrides collected from the environment. Empty values count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientEnv {
    pub host: Option<String>,
    pub api_version: Option<String>,
    pub tls_verify: bool,
    pub cert_path: Option<PathBuf>,
}

impl ClientEnv {
    /// Collect overrides through `lookup`, which maps a variable name to its value.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());

        Self {
            host: non_empty(DOCKER_HOST_ENV),
            api_version: non_empty(DOCKER_API_VERSION_ENV),
            tls_verify: non_empty(DOCKER_TLS_VERIFY_ENV).is_some(),
            cert_path: non_empty(DOCKER_CERT_PATH_ENV).map(PathBuf::from),
        }
    }

    /// Collect overrides from the process environment.
    #[must_use]
    pub fn from_process_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// TLS options for the certificate directory, if one is set
    #[must_use]
    pub fn tls_options(&self) -> Option<TlsOptions> {
        self.cert_path
            .as_ref()
            .map(|dir| TlsOptions::from_cert_dir(dir, self.tls_verify))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> ClientEnv {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        ClientEnv::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_empty_environment() {
        assert_eq!(env_of(&[]), ClientEnv::default());
    }

    #[test]
    fn test_all_overrides() {
        let env = env_of(&[
            ("DOCKER_HOST", "tcp://10.0.0.5:2376"),
            ("DOCKER_API_VERSION", "1.22"),
            ("DOCKER_TLS_VERIFY", "1"),
            ("DOCKER_CERT_PATH", "/certs"),
        ]);
        assert_eq!(env.host.as_deref(), Some("tcp://10.0.0.5:2376"));
        assert_eq!(env.api_version.as_deref(), Some("1.22"));
        assert!(env.tls_verify);
        assert_eq!(env.cert_path, Some(PathBuf::from("/certs")));

        let tls = env.tls_options().unwrap();
        assert!(!tls.insecure_skip_verify);
        assert_eq!(tls.cert_file, Some(PathBuf::from("/certs/cert.pem")));
    }

    #[test]
    fn test_empty_values_are_unset() {
        let env = env_of(&[
            ("DOCKER_HOST", ""),
            ("DOCKER_API_VERSION", ""),
            ("DOCKER_TLS_VERIFY", ""),
        ]);
        assert_eq!(env, ClientEnv::default());
    }

    #[test]
    fn test_any_verify_value_enables_verification() {
        // "0" is still a non-empty value
        assert!(env_of(&[("DOCKER_TLS_VERIFY", "0")]).tls_verify);
    }

    #[test]
    fn test_cert_path_without_verify_is_insecure() {
        let tls = env_of(&[("DOCKER_CERT_PATH", "/certs")]).tls_options().unwrap();
        assert!(tls.insecure_skip_verify);
    }
}

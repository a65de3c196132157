//! TLS material for daemon connections.
//!
//! Client certificates follow the engine's certificate directory layout
//! (`ca.pem`, `cert.pem`, `key.pem`). The CA bundle is only read when the
//! server certificate is verified; the key pair is always read when set.

use crate::config::TlsRootConfig;
use crate::error::EngineError;
use rustls::DigitallySignedStruct;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

pub const CA_FILE_NAME: &str = "ca.pem";
pub const CERT_FILE_NAME: &str = "cert.pem";
pub const KEY_FILE_NAME: &str = "key.pem";

/// Client TLS options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsOptions {
    /// PEM bundle of CAs trusted for the daemon certificate
    pub ca_file: Option<PathBuf>,
    /// PEM client certificate chain
    pub cert_file: Option<PathBuf>,
    /// PEM client private key (PKCS#8, PKCS#1 or SEC1)
    pub key_file: Option<PathBuf>,
    /// Accept any daemon certificate. Handshake signatures are still checked.
    pub insecure_skip_verify: bool,
}

impl TlsOptions {
    /// Options for a certificate directory holding `ca.pem`, `cert.pem` and `key.pem`.
    #[must_use]
    pub fn from_cert_dir(dir: impl AsRef<Path>, verify: bool) -> Self {
        let dir = dir.as_ref();
        Self {
            ca_file: Some(dir.join(CA_FILE_NAME)),
            cert_file: Some(dir.join(CERT_FILE_NAME)),
            key_file: Some(dir.join(KEY_FILE_NAME)),
            insecure_skip_verify: !verify,
        }
    }

    /// Load the material and build a rustls client configuration.
    ///
    /// # Errors
    ///
    /// - [`EngineError::TlsConfig`] if a file is missing, unreadable or holds
    ///   no usable PEM item, or if only one half of the key pair is set
    /// - [`EngineError::Tls`] if rustls rejects the material
    pub fn load_client_config(
        &self,
        roots: TlsRootConfig,
    ) -> Result<rustls::ClientConfig, EngineError> {
        let provider = get_crypto_provider();
        let builder = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| EngineError::Tls(Box::new(e)))?;

        let builder = if self.insecure_skip_verify {
            tracing::warn!("TLS verification of the daemon certificate is disabled");
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider }))
        } else {
            builder.with_root_certificates(self.root_store(roots)?)
        };

        let config = match (&self.cert_file, &self.key_file) {
            (Some(cert_file), Some(key_file)) => {
                let chain = read_certs(cert_file)?;
                let key = read_private_key(key_file)?;
                builder
                    .with_client_auth_cert(chain, key)
                    .map_err(|e| EngineError::Tls(Box::new(e)))?
            }
            (None, None) => builder.with_no_client_auth(),
            (Some(path), None) | (None, Some(path)) => {
                return Err(tls_config_error(
                    path,
                    io::ErrorKind::InvalidInput,
                    "client certificate and key must be set together",
                ));
            }
        };
        Ok(config)
    }

    fn root_store(&self, roots: TlsRootConfig) -> Result<rustls::RootCertStore, EngineError> {
        let mut store = rustls::RootCertStore::empty();
        if let Some(ca_file) = &self.ca_file {
            let (added, ignored) = store.add_parsable_certificates(read_certs(ca_file)?);
            if added == 0 {
                return Err(tls_config_error(
                    ca_file,
                    io::ErrorKind::InvalidData,
                    "no valid CA certificate",
                ));
            }
            if ignored > 0 {
                tracing::warn!(
                    added,
                    ignored,
                    path = %ca_file.display(),
                    "some CA certificates could not be parsed"
                );
            }
            return Ok(store);
        }

        match roots {
            TlsRootConfig::WebPki => {
                store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            }
            TlsRootConfig::Native => {
                let (added, _) =
                    store.add_parsable_certificates(native_root_certs().iter().cloned());
                if added == 0 {
                    return Err(EngineError::Tls(
                        "no valid native root CA certificates found in OS certificate store".into(),
                    ));
                }
            }
        }
        Ok(store)
    }
}

fn tls_config_error(path: &Path, kind: io::ErrorKind, message: &str) -> EngineError {
    EngineError::TlsConfig {
        path: path.to_path_buf(),
        source: io::Error::new(kind, message.to_owned()),
    }
}

fn open_pem(path: &Path) -> Result<BufReader<File>, EngineError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| EngineError::TlsConfig {
            path: path.to_path_buf(),
            source,
        })
}

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, EngineError> {
    let mut reader = open_pem(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| EngineError::TlsConfig {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(tls_config_error(
            path,
            io::ErrorKind::InvalidData,
            "no PEM certificate found",
        ));
    }
    Ok(certs)
}

fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, EngineError> {
    let mut reader = open_pem(path)?;
    match rustls_pemfile::private_key(&mut reader) {
        Ok(Some(key)) => Ok(key),
        Ok(None) => Err(tls_config_error(
            path,
            io::ErrorKind::InvalidData,
            "no PEM private key found",
        )),
        Err(source) => Err(EngineError::TlsConfig {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Accepts any daemon certificate; used for `insecure_skip_verify`.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Cached native root certificates; empty when the OS store has none.
static NATIVE_ROOTS_CACHE: OnceLock<Vec<CertificateDer<'static>>> = OnceLock::new();

#[cfg(test)]
static LOAD_COUNT: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

fn load_native_certs_inner() -> Vec<CertificateDer<'static>> {
    #[cfg(test)]
    LOAD_COUNT.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

    let result = rustls_native_certs::load_native_certs();
    for err in &result.errors {
        tracing::warn!(error = %err, "error loading native root certificate");
    }

    if result.certs.is_empty() {
        tracing::warn!("no native root CA certificates found");
    } else {
        tracing::debug!(count = result.certs.len(), "loaded native root certificates");
    }
    result.certs
}

/// Native root certificates, loaded from the OS store on first use.
#[must_use]
pub fn native_root_certs() -> &'static [CertificateDer<'static>] {
    NATIVE_ROOTS_CACHE
        .get_or_init(load_native_certs_inner)
        .as_slice()
}

/// The process-wide rustls provider if one is installed, aws-lc-rs otherwise.
///
/// Never installs a global default.
#[must_use]
pub fn get_crypto_provider() -> Arc<CryptoProvider> {
    CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

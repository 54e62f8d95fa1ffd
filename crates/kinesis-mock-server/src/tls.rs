//! TLS Listener Support
//!
//! Loads a PEM certificate chain and private key and serves the router over
//! rustls via axum-server. The emulator ships no baked-in certificate: the
//! TLS listener starts only when `TLS_CERT_PATH` and `TLS_KEY_PATH` are both
//! configured, and the plain listener is always available for clients that
//! do not need transport security.

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read TLS file: {0}")]
    Read(#[from] std::io::Error),

    #[error("no certificates found in file")]
    NoCertificates,

    #[error("no private key found in file")]
    NoPrivateKey,

    #[error("failed to build TLS config: {0}")]
    ConfigBuild(String),
}

/// Load certificates from a PEM file.
fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let certs: Vec<_> = rustls_pemfile::certs(&mut reader)
        .filter_map(|result| result.ok())
        .collect();
    if certs.is_empty() {
        return Err(TlsError::NoCertificates);
    }
    Ok(certs)
}

/// Load the first private key from a PEM file (PKCS#1, PKCS#8, or SEC1).
fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    for item in rustls_pemfile::read_all(&mut reader).flatten() {
        match item {
            rustls_pemfile::Item::Pkcs1Key(key) => return Ok(PrivateKeyDer::Pkcs1(key)),
            rustls_pemfile::Item::Pkcs8Key(key) => return Ok(PrivateKeyDer::Pkcs8(key)),
            rustls_pemfile::Item::Sec1Key(key) => return Ok(PrivateKeyDer::Sec1(key)),
            _ => continue,
        }
    }
    Err(TlsError::NoPrivateKey)
}

/// Build the axum-server rustls config from PEM files.
pub fn rustls_config(
    cert_path: &Path,
    key_path: &Path,
) -> Result<axum_server::tls_rustls::RustlsConfig, TlsError> {
    let cert_chain = load_certs(cert_path)?;
    let private_key = load_private_key(key_path)?;
    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, private_key)
        .map_err(|e| TlsError::ConfigBuild(e.to_string()))?;
    Ok(axum_server::tls_rustls::RustlsConfig::from_config(
        Arc::new(config),
    ))
}

use reqwest::{Certificate, ClientBuilder, Identity};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::rustls::{
    self,
    pki_types::{CertificateDer, PrivateKeyDer},
    server::WebPkiClientVerifier,
    RootCertStore, ServerConfig,
};

use crate::config::{ConfigError, TlsClientSettings, TlsServerSettings};

fn tls_error(path: &Path, e: impl std::fmt::Display) -> ConfigError {
    ConfigError::Tls(format!("{}: {}", path.display(), e))
}

fn read_file(path: &Path) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path).map_err(|e| tls_error(path, e))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ConfigError> {
    let file = File::open(path).map_err(|e| tls_error(path, e))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| tls_error(path, e))?;
    if certs.is_empty() {
        return Err(tls_error(path, "no certificates found"));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, ConfigError> {
    let file = File::open(path).map_err(|e| tls_error(path, e))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|e| tls_error(path, e))?
        .ok_or_else(|| tls_error(path, "no private key found"))
}

/// Build the rustls server config for a TLS listener. Advertises h2 and
/// http/1.1 over ALPN; requires client certificates when a client CA is set.
pub fn server_config(settings: &TlsServerSettings) -> Result<Arc<ServerConfig>, ConfigError> {
    let certs = load_certs(&settings.cert_file)?;
    let key = load_key(&settings.key_file)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ServerConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| ConfigError::Tls(e.to_string()))?;

    let builder = match &settings.client_ca_file {
        Some(ca_file) => {
            let mut roots = RootCertStore::empty();
            for cert in load_certs(ca_file)? {
                roots.add(cert).map_err(|e| tls_error(ca_file, e))?;
            }
            let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
                .build()
                .map_err(|e| tls_error(ca_file, e))?;
            builder.with_client_cert_verifier(verifier)
        }
        None => builder.with_no_client_auth(),
    };

    let mut config = builder
        .with_single_cert(certs, key)
        .map_err(|e| tls_error(&settings.cert_file, e))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(Arc::new(config))
}

/// Apply client TLS settings to a reqwest builder.
pub fn apply_client_settings(
    mut builder: ClientBuilder,
    settings: &TlsClientSettings,
) -> Result<ClientBuilder, ConfigError> {
    if let Some(ca_file) = &settings.ca_file {
        let pem = read_file(ca_file)?;
        let roots = Certificate::from_pem_bundle(&pem).map_err(|e| tls_error(ca_file, e))?;
        for root in roots {
            builder = builder.add_root_certificate(root);
        }
    }

    match (&settings.cert_file, &settings.key_file) {
        (Some(cert_file), Some(key_file)) => {
            // reqwest wants key and chain in one PEM buffer
            let mut pem = read_file(key_file)?;
            pem.push(b'\n');
            pem.extend(read_file(cert_file)?);
            let identity = Identity::from_pem(&pem).map_err(|e| tls_error(cert_file, e))?;
            builder = builder.identity(identity);
        }
        (None, None) => {}
        _ => {
            return Err(ConfigError::Tls(
                "cert_file and key_file must be set together".to_string(),
            ))
        }
    }

    if settings.insecure_skip_verify {
        builder = builder.danger_accept_invalid_certs(true);
    }

    Ok(builder)
}

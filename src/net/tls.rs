//! TLS configuration and certificate loading.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use axum_server::tls_rustls::RustlsConfig;

/// Errors raised while loading certificate material.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("{kind} file not found: {path:?}")]
    NotFound { kind: &'static str, path: PathBuf },

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no PEM certificates found in {0:?}")]
    NoCertificates(PathBuf),

    #[error("no PEM private key found in {0:?}")]
    NoPrivateKey(PathBuf),
}

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, TlsError> {
    check_pem(cert_path, key_path)?;

    RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|source| TlsError::Io {
            path: cert_path.to_path_buf(),
            source,
        })
}

/// Verify both files exist and hold the PEM sections rustls will need.
fn check_pem(cert_path: &Path, key_path: &Path) -> Result<(), TlsError> {
    let mut certs = reader(cert_path, "Certificate")?;
    let found = rustls_pemfile::certs(&mut certs)
        .filter_map(Result::ok)
        .count();
    if found == 0 {
        return Err(TlsError::NoCertificates(cert_path.to_path_buf()));
    }

    let mut key = reader(key_path, "Private key")?;
    match rustls_pemfile::private_key(&mut key) {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(TlsError::NoPrivateKey(key_path.to_path_buf())),
        Err(source) => Err(TlsError::Io {
            path: key_path.to_path_buf(),
            source,
        }),
    }
}

fn reader(path: &Path, kind: &'static str) -> Result<BufReader<File>, TlsError> {
    if !path.exists() {
        return Err(TlsError::NotFound {
            kind,
            path: path.to_path_buf(),
        });
    }
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn missing_certificate_is_reported() {
        let err = load_tls_config(Path::new("/nope/cert.pem"), Path::new("/nope/key.pem"))
            .await
            .unwrap_err();
        assert!(matches!(err, TlsError::NotFound { kind: "Certificate", .. }));
    }

    #[tokio::test]
    async fn certificate_without_pem_blocks_is_rejected() {
        let mut cert = tempfile::NamedTempFile::new().unwrap();
        writeln!(cert, "not a certificate").unwrap();
        let key = tempfile::NamedTempFile::new().unwrap();

        let err = load_tls_config(cert.path(), key.path()).await.unwrap_err();
        assert!(matches!(err, TlsError::NoCertificates(_)));
    }
}

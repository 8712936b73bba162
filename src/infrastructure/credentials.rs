// Client certificate, private key and CA chain for mutual TLS
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to read {kind} from {}", path.display())]
pub struct CredentialError {
    kind: &'static str,
    path: PathBuf,
    #[source]
    source: std::io::Error,
}

/// PEM material read once at startup and shared read-only afterwards.
#[derive(Clone)]
pub struct Credentials {
    pub client_cert: Vec<u8>,
    pub private_key: Vec<u8>,
    pub ca_chain: Vec<u8>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_cert", &format_args!("{} bytes", self.client_cert.len()))
            .field("private_key", &"<redacted>")
            .field("ca_chain", &format_args!("{} bytes", self.ca_chain.len()))
            .finish()
    }
}

impl Credentials {
    pub fn load(cert_path: &Path, key_path: &Path, ca_path: &Path) -> Result<Self, CredentialError> {
        Ok(Self {
            client_cert: read("client certificate", cert_path)?,
            private_key: read("private key", key_path)?,
            ca_chain: read("CA chain", ca_path)?,
        })
    }
}

fn read(kind: &'static str, path: &Path) -> Result<Vec<u8>, CredentialError> {
    std::fs::read(path).map_err(|source| CredentialError {
        kind,
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_all_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("vehicle.cert.pem");
        let key = dir.path().join("vehicle.private.key");
        let ca = dir.path().join("root.pem");
        std::fs::write(&cert, b"CERT").unwrap();
        std::fs::write(&key, b"KEY").unwrap();
        std::fs::write(&ca, b"CA").unwrap();

        let credentials = Credentials::load(&cert, &key, &ca).unwrap();

        assert_eq!(credentials.client_cert, b"CERT");
        assert_eq!(credentials.private_key, b"KEY");
        assert_eq!(credentials.ca_chain, b"CA");
        assert!(!format!("{credentials:?}").contains("KEY"));
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("vehicle.cert.pem");
        std::fs::write(&cert, b"CERT").unwrap();
        let missing = dir.path().join("missing.key");

        let err = Credentials::load(&cert, &missing, &cert).unwrap_err();

        let message = err.to_string();
        assert!(message.contains("private key"));
        assert!(message.contains("missing.key"));
    }
}

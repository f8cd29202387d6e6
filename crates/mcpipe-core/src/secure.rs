//! Secure-channel credentials.
//!
//! The secure channel is modelled, not encrypted: both peers load a PEM
//! certificate, private key and CA bundle, and the handshake succeeds only if
//! both trust the same CA. What matters to the harness is that bad paths,
//! unparsable files and mismatched modes fail the connection.

use std::{
    fs,
    path::{Path, PathBuf},
};

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Failure to load secure-channel credentials.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecureChannelError {
    /// A credential file could not be read
    #[error("failed to read {path}: {reason}")]
    Read {
        /// File that failed
        path: PathBuf,
        /// I/O error text
        reason: String,
    },

    /// A file parsed but held no certificate
    #[error("no certificate found in {0}")]
    NoCertificate(PathBuf),

    /// The key file held no private key
    #[error("no private key found in {0}")]
    NoPrivateKey(PathBuf),

    /// A file was not valid PEM
    #[error("failed to parse {path}: {reason}")]
    Parse {
        /// File that failed
        path: PathBuf,
        /// Parser error text
        reason: String,
    },
}

/// Paths to the PEM files for one side of a secure channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPaths {
    /// Certificate chain
    pub cert: PathBuf,
    /// Private key
    pub key: PathBuf,
    /// Trusted CA bundle
    pub ca: PathBuf,
}

impl CredentialPaths {
    /// Credentials at explicit paths.
    pub fn new(cert: impl Into<PathBuf>, key: impl Into<PathBuf>, ca: impl Into<PathBuf>) -> Self {
        Self { cert: cert.into(), key: key.into(), ca: ca.into() }
    }

    /// `cert.pem`, `key.pem` and `ca.pem` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join("cert.pem"), dir.join("key.pem"), dir.join("ca.pem"))
    }

    /// Read and parse all three files.
    ///
    /// # Errors
    ///
    /// - [`SecureChannelError::Read`] if any file is missing or unreadable
    /// - [`SecureChannelError::NoCertificate`] / [`SecureChannelError::NoPrivateKey`]
    ///   if a file holds no usable PEM item
    /// - [`SecureChannelError::Parse`] on malformed PEM
    pub fn load(&self) -> Result<SecureContext, SecureChannelError> {
        let cert_chain = read_certs(&self.cert)?;
        read_key(&self.key)?;
        let ca = read_certs(&self.ca)?;

        let first_ca = ca.first().ok_or_else(|| SecureChannelError::NoCertificate(self.ca.clone()))?;
        let ca_fingerprint: [u8; 32] = Sha256::digest(first_ca).into();

        tracing::debug!(
            cert = %self.cert.display(),
            ca = %self.ca.display(),
            certs = cert_chain.len(),
            "loaded secure-channel credentials"
        );

        Ok(SecureContext { cert_chain, ca_fingerprint })
    }
}

/// Loaded credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureContext {
    cert_chain: Vec<Vec<u8>>,
    ca_fingerprint: [u8; 32],
}

impl SecureContext {
    /// SHA-256 of the first trusted CA certificate (DER).
    #[must_use]
    pub fn ca_fingerprint(&self) -> [u8; 32] {
        self.ca_fingerprint
    }

    /// Number of certificates in the local chain.
    #[must_use]
    pub fn chain_len(&self) -> usize {
        self.cert_chain.len()
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, SecureChannelError> {
    fs::read(path)
        .map_err(|e| SecureChannelError::Read { path: path.to_path_buf(), reason: e.to_string() })
}

fn read_certs(path: &Path) -> Result<Vec<Vec<u8>>, SecureChannelError> {
    let pem = read_pem(path)?;
    let certs = rustls_pemfile::certs(&mut &pem[..])
        .map(|cert| cert.map(|der| der.as_ref().to_vec()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SecureChannelError::Parse { path: path.to_path_buf(), reason: e.to_string() })?;

    if certs.is_empty() {
        return Err(SecureChannelError::NoCertificate(path.to_path_buf()));
    }
    Ok(certs)
}

fn read_key(path: &Path) -> Result<(), SecureChannelError> {
    let pem = read_pem(path)?;
    rustls_pemfile::private_key(&mut &pem[..])
        .map_err(|e| SecureChannelError::Parse { path: path.to_path_buf(), reason: e.to_string() })?
        .ok_or_else(|| SecureChannelError::NoPrivateKey(path.to_path_buf()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Write a CA-signed leaf certificate, its key and the CA into `dir`.
    fn write_credentials(dir: &Path) {
        let ca_key = rcgen::KeyPair::generate().unwrap();
        let mut ca_params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        let ca = ca_params.self_signed(&ca_key).unwrap();

        let leaf_key = rcgen::KeyPair::generate().unwrap();
        let leaf = rcgen::CertificateParams::new(vec!["localhost".to_string()])
            .unwrap()
            .signed_by(&leaf_key, &ca, &ca_key)
            .unwrap();

        fs::write(dir.join("cert.pem"), leaf.pem()).unwrap();
        fs::write(dir.join("key.pem"), leaf_key.serialize_pem()).unwrap();
        fs::write(dir.join("ca.pem"), ca.pem()).unwrap();
    }

    #[test]
    fn valid_credentials_load() {
        let dir = tempfile::tempdir().unwrap();
        write_credentials(dir.path());

        let paths = CredentialPaths::in_dir(dir.path());
        let first = paths.load().unwrap();
        let second = paths.load().unwrap();

        assert_eq!(first.chain_len(), 1);
        assert_eq!(first.ca_fingerprint(), second.ca_fingerprint());
    }

    #[test]
    fn different_cas_have_different_fingerprints() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        write_credentials(a.path());
        write_credentials(b.path());

        let a = CredentialPaths::in_dir(a.path()).load().unwrap();
        let b = CredentialPaths::in_dir(b.path()).load().unwrap();
        assert_ne!(a.ca_fingerprint(), b.ca_fingerprint());
    }

    #[test]
    fn missing_files_fail_to_read() {
        let paths = CredentialPaths::new("/do/not/exist", "/do/not/exist", "/do/not/exist");
        assert!(matches!(paths.load(), Err(SecureChannelError::Read { .. })));
    }

    #[test]
    fn garbage_files_hold_no_certificate() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["cert.pem", "key.pem", "ca.pem"] {
            fs::write(dir.path().join(name), "not a pem file\n").unwrap();
        }

        let err = CredentialPaths::in_dir(dir.path()).load().unwrap_err();
        assert_eq!(err, SecureChannelError::NoCertificate(dir.path().join("cert.pem")));
    }

    #[test]
    fn certificate_in_key_slot_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_credentials(dir.path());
        fs::copy(dir.path().join("cert.pem"), dir.path().join("key.pem")).unwrap();

        let err = CredentialPaths::in_dir(dir.path()).load().unwrap_err();
        assert_eq!(err, SecureChannelError::NoPrivateKey(dir.path().join("key.pem")));
    }
}

//! Shared fixtures for simulation tests.

#![allow(dead_code)]

use std::{fs, path::Path, time::Duration};

use mcpipe_client::{ClientOptions, ConcurrentClient};
use mcpipe_harness::{SimConnector, server_options};
use tempfile::TempDir;

/// Generous timeout for requests expected to succeed.
pub const TIMEOUT: Duration = Duration::from_secs(2);

/// Timeout for requests expected to time out.
pub const SHORT_TIMEOUT: Duration = Duration::from_millis(100);

/// Client against the scenario server with default options.
pub fn client() -> ConcurrentClient {
    client_with(server_options())
}

/// Client against the scenario server with `options`.
pub fn client_with(options: ClientOptions) -> ConcurrentClient {
    ConcurrentClient::new(SimConnector, options)
}

/// Directory holding a CA, a leaf certificate signed by it, and a garbage
/// certificate/key pair:
///
/// - `ca.pem`, `cert.pem`, `key.pem`
/// - `broken_cert.pem`, `broken_key.pem`
pub fn mint_credentials() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_credentials(dir.path());
    dir
}

fn write_credentials(dir: &Path) {
    let ca_key = rcgen::KeyPair::generate().unwrap();
    let mut ca_params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
    ca_params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
    let ca = ca_params.self_signed(&ca_key).unwrap();

    let leaf_key = rcgen::KeyPair::generate().unwrap();
    let leaf = rcgen::CertificateParams::new(vec!["server".to_string()])
        .unwrap()
        .signed_by(&leaf_key, &ca, &ca_key)
        .unwrap();

    fs::write(dir.join("ca.pem"), ca.pem()).unwrap();
    fs::write(dir.join("cert.pem"), leaf.pem()).unwrap();
    fs::write(dir.join("key.pem"), leaf_key.serialize_pem()).unwrap();

    fs::write(dir.join("broken_cert.pem"), "this is not a certificate\n").unwrap();
    fs::write(dir.join("broken_key.pem"), "this is not a key\n").unwrap();
}

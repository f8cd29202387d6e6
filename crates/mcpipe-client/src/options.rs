//! Client construction options.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use mcpipe_core::CredentialPaths;
use mcpipe_proto::{FrameFlags, Hello, ProtocolVariant, Qos};

/// Default request and write timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(200);

/// Paths that never exist, for negative tests.
const MISSING_PATH: &str = "/do/not/exist";

/// Secure-channel provider.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SecureChannel {
    /// Plain connection
    #[default]
    Plain,
    /// Secure connection using these credentials
    Credentials(CredentialPaths),
}

impl SecureChannel {
    /// `cert.pem`, `key.pem` and `ca.pem` in `dir`.
    pub fn valid(dir: impl AsRef<Path>) -> Self {
        Self::Credentials(CredentialPaths::in_dir(dir))
    }

    /// Credentials at paths that do not exist.
    #[must_use]
    pub fn invalid() -> Self {
        Self::Credentials(CredentialPaths::new(MISSING_PATH, MISSING_PATH, MISSING_PATH))
    }

    /// `broken_cert.pem` and `broken_key.pem` with the valid `ca.pem` in `dir`.
    pub fn broken(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::Credentials(CredentialPaths::new(
            dir.join("broken_cert.pem"),
            dir.join("broken_key.pem"),
            dir.join("ca.pem"),
        ))
    }

    /// Whether this provider asks for a secure connection.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        matches!(self, Self::Credentials(_))
    }

    /// CA path, if secure.
    #[must_use]
    pub fn ca_path(&self) -> Option<&PathBuf> {
        match self {
            Self::Plain => None,
            Self::Credentials(paths) => Some(&paths.ca),
        }
    }
}

/// How a client connects and talks to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Protocol variant
    pub variant: ProtocolVariant,
    /// Connect, handshake and write timeout
    pub timeout: Duration,
    /// Secure-channel provider
    pub secure: SecureChannel,
    /// QoS tags; `None` unless either tag is non-zero
    pub qos: Option<Qos>,
    /// Typed encoding
    pub typed: bool,
}

impl ClientOptions {
    /// Plain, keyed, untyped client for `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            variant: ProtocolVariant::Keyed,
            timeout: DEFAULT_TIMEOUT,
            secure: SecureChannel::Plain,
            qos: None,
            typed: false,
        }
    }

    /// Use `variant`.
    #[must_use]
    pub fn with_variant(mut self, variant: ProtocolVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Use `timeout` for connects and writes.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use `secure` for the secure channel.
    #[must_use]
    pub fn with_secure(mut self, secure: SecureChannel) -> Self {
        self.secure = secure;
        self
    }

    /// Tag connections with a QoS class and path. Zero for both disables QoS.
    #[must_use]
    pub fn with_qos(mut self, class: u8, path: u8) -> Self {
        self.qos = (class != 0 || path != 0).then_some(Qos { class, path });
        self
    }

    /// Request typed encoding.
    #[must_use]
    pub fn with_typed(mut self, typed: bool) -> Self {
        self.typed = typed;
        self
    }

    /// Session flags sent in the Hello.
    #[must_use]
    pub fn session_flags(&self) -> FrameFlags {
        FrameFlags::session(self.variant, self.typed)
    }

    /// Hello for these options, carrying `fingerprint` when secure.
    #[must_use]
    pub fn hello(&self, fingerprint: Option<[u8; 32]>) -> Hello {
        Hello { flags: self.session_flags(), secure_fingerprint: fingerprint, qos: self.qos }
    }
}

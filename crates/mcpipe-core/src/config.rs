//! Server configuration.

use std::time::Duration;

use crate::secure::CredentialPaths;

/// Reply ordering discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderingMode {
    /// Replies leave in request arrival order.
    #[default]
    InOrder,
    /// Replies leave as soon as they are computed; only held replies wait.
    OutOfOrder,
}

/// Server configuration. Immutable once the server is built.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Reply ordering discipline
    pub ordering: OrderingMode,
    /// Credentials for the secure channel, `None` for plain connections
    pub secure: Option<CredentialPaths>,
    /// Requests read but not yet answered, per connection (0 = unlimited)
    pub max_inflight: usize,
    /// Bound on writing one reply
    pub send_timeout: Duration,
    /// Open connections; further connections are closed on accept
    pub max_connections: usize,
    /// Minimum connection age before it may be reaped (carried, not enforced)
    pub unreapable_time: Duration,
    /// Minimum interval between connection LRU updates (carried, not enforced)
    pub update_threshold: Duration,
    /// How long a `sleep` request stalls the serving loop
    pub stall_duration: Duration,
    /// Longest the serving loop waits before re-checking the shutdown flag
    pub poll_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ordering: OrderingMode::InOrder,
            secure: None,
            max_inflight: 10,
            send_timeout: Duration::from_millis(250),
            max_connections: 100,
            unreapable_time: Duration::ZERO,
            update_threshold: Duration::ZERO,
            stall_duration: Duration::from_secs(1),
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl ServerConfig {
    /// Config answering strictly in arrival order.
    #[must_use]
    pub fn in_order() -> Self {
        Self::default()
    }

    /// Config answering as soon as replies are ready.
    #[must_use]
    pub fn out_of_order() -> Self {
        Self { ordering: OrderingMode::OutOfOrder, ..Self::default() }
    }

    /// Require secure-channel handshakes using `paths`.
    #[must_use]
    pub fn with_secure(mut self, paths: CredentialPaths) -> Self {
        self.secure = Some(paths);
        self
    }

    /// Set the per-connection in-flight limit.
    #[must_use]
    pub fn with_max_inflight(mut self, max_inflight: usize) -> Self {
        self.max_inflight = max_inflight;
        self
    }

    /// Set the connection limit.
    #[must_use]
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Set the stall applied to `sleep` requests.
    #[must_use]
    pub fn with_stall(mut self, stall: Duration) -> Self {
        self.stall_duration = stall;
        self
    }
}

//! Server plus clients in one turmoil simulation.
//!
//! ```ignore
//! let scenario = Scenario::new(ServerConfig::in_order());
//! let probe = scenario.probe();
//! scenario
//!     .client("client", async move {
//!         let mut client = ConcurrentClient::new(SimConnector, server_options());
//!         client.send_get("abc", ReplyStatus::Found, Duration::from_secs(1));
//!         client.wait_for_replies(0).await;
//!         Ok(())
//!     })
//!     .run()?;
//! assert_eq!(probe.accepted_connections(), 1);
//! ```

use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use mcpipe_client::ClientOptions;
use mcpipe_core::ServerConfig;
use mcpipe_server::{ConnectionInfo, ServerHandle, ServerHarness};

use crate::{SimEnv, SimListener};

/// Turmoil host name of the server.
pub const SERVER_HOST: &str = "server";

/// Port the server listens on.
pub const SERVER_PORT: u16 = 11211;

/// Default simulated run length.
const SIMULATION_DURATION: Duration = Duration::from_secs(60);

/// Per-message latency bounds. Kept well below the client's 200 ms
/// connect and Set timeouts.
const MIN_LATENCY: Duration = Duration::from_millis(1);
const MAX_LATENCY: Duration = Duration::from_millis(5);

type ClientFuture = Pin<Box<dyn Future<Output = turmoil::Result>>>;

/// Client options pointing at the scenario's server.
#[must_use]
pub fn server_options() -> ClientOptions {
    ClientOptions::new(SERVER_HOST, SERVER_PORT)
}

#[derive(Debug, Default)]
struct Observed {
    handle: Option<ServerHandle>,
    connections: Vec<ConnectionInfo>,
}

/// What the server saw, readable during and after a run.
#[derive(Debug, Clone, Default)]
pub struct ScenarioProbe {
    observed: Arc<Mutex<Observed>>,
}

impl ScenarioProbe {
    fn lock(&self) -> MutexGuard<'_, Observed> {
        self.observed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn started(&self, handle: ServerHandle) {
        self.lock().handle = Some(handle);
    }

    fn accepted(&self, info: &ConnectionInfo) {
        self.lock().connections.push(info.clone());
    }

    /// Connections that completed the handshake, from the server's counter.
    /// Zero before the server has started.
    #[must_use]
    pub fn accepted_connections(&self) -> usize {
        self.lock().handle.as_ref().map_or(0, ServerHandle::accepted_connections)
    }

    /// Every connection the accept hook was called for, in order.
    #[must_use]
    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.lock().connections.clone()
    }

    /// Whether the server was asked to stop.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.lock().handle.as_ref().is_some_and(ServerHandle::is_shutdown)
    }

    /// Ask the server to stop.
    pub fn shutdown(&self) {
        if let Some(handle) = self.lock().handle.as_ref() {
            handle.shutdown();
        }
    }
}

/// One server host and a set of client hosts.
pub struct Scenario {
    config: ServerConfig,
    duration: Duration,
    probe: ScenarioProbe,
    serve: bool,
    clients: Vec<(String, ClientFuture)>,
}

impl Scenario {
    /// Scenario serving with `config`.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            duration: SIMULATION_DURATION,
            probe: ScenarioProbe::default(),
            serve: true,
            clients: Vec::new(),
        }
    }

    /// Scenario whose server host never listens, so every connect is
    /// refused.
    #[must_use]
    pub fn without_server() -> Self {
        Self { serve: false, ..Self::new(ServerConfig::default()) }
    }

    /// Override the simulated run length.
    #[must_use]
    pub fn with_simulation_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Probe onto the server's state.
    #[must_use]
    pub fn probe(&self) -> ScenarioProbe {
        self.probe.clone()
    }

    /// Add a client host running `body`.
    #[must_use]
    pub fn client(
        mut self,
        name: impl Into<String>,
        body: impl Future<Output = turmoil::Result> + 'static,
    ) -> Self {
        self.clients.push((name.into(), Box::pin(body)));
        self
    }

    /// Run until every client finishes.
    pub fn run(self) -> turmoil::Result {
        let mut builder = turmoil::Builder::new();
        builder
            .simulation_duration(self.duration)
            .min_message_latency(MIN_LATENCY)
            .max_message_latency(MAX_LATENCY);
        let mut sim = builder.build();

        let config = self.config;
        let probe = self.probe;
        let serve = self.serve;
        sim.host(SERVER_HOST, move || {
            let config = config.clone();
            let probe = probe.clone();
            async move {
                if !serve {
                    return std::future::pending().await;
                }

                let listener = SimListener::bind(&format!("0.0.0.0:{SERVER_PORT}")).await?;
                let mut server = ServerHarness::new(SimEnv::new(), listener, config)?;

                let hook = probe.clone();
                server.on_connection_accepted(move |info| hook.accepted(info));
                probe.started(server.handle());

                server.run().await?;
                tracing::info!("simulated server stopped");
                Ok(())
            }
        });

        for (name, body) in self.clients {
            sim.client(name, body);
        }

        sim.run()
    }
}

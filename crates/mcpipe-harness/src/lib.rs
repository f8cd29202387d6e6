//! Deterministic simulation harness for the mcpipe server and client.
//!
//! Turmoil-based implementations of the `Environment`, `Listener` and
//! `Connector` seams, so the real serving loop and the real client run over
//! simulated TCP on a virtual clock. A stalled server advances simulated time
//! instead of blocking the test process.
//!
//! # Scenarios
//!
//! [`Scenario`] starts one server host and any number of client hosts and
//! runs them to completion. A [`ScenarioProbe`] taken before the run exposes
//! what the server saw.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference ordering model. Operations are
//! applied to both the model and the real request handler, and the order in
//! which replies are released is compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod scenario;
pub mod sim_env;
pub mod sim_net;

pub use model::{ModelOp, OrderingModel};
pub use scenario::{SERVER_HOST, SERVER_PORT, Scenario, ScenarioProbe, server_options};
pub use sim_env::SimEnv;
pub use sim_net::{SimConnector, SimListener};

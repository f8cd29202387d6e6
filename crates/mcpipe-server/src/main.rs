//! mcpipe server binary.
//!
//! # Usage
//!
//! ```bash
//! # In-order server on the default port
//! mcpipe-server --bind 127.0.0.1:11311
//!
//! # Out-of-order server requiring the secure channel
//! mcpipe-server --out-of-order --cert cert.pem --key key.pem --ca ca.pem
//! ```

use std::time::Duration;

use clap::Parser;
use mcpipe_core::{CredentialPaths, OrderingMode, ServerConfig};
use mcpipe_server::{ServerHarness, SystemEnv};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Pipelined key-value test server
#[derive(Parser, Debug)]
#[command(name = "mcpipe-server")]
#[command(about = "Key-value test server with configurable reply ordering")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "127.0.0.1:11311")]
    bind: String,

    /// Send replies as soon as they are ready instead of in arrival order
    #[arg(long)]
    out_of_order: bool,

    /// Certificate chain (PEM); requires --key and --ca
    #[arg(long, requires_all = ["key", "ca"])]
    cert: Option<String>,

    /// Private key (PEM)
    #[arg(long, requires_all = ["cert", "ca"])]
    key: Option<String>,

    /// Trusted CA bundle (PEM)
    #[arg(long, requires_all = ["cert", "key"])]
    ca: Option<String>,

    /// Requests read but not yet answered per connection (0 = unlimited)
    #[arg(long, default_value = "10")]
    max_inflight: usize,

    /// Bound on writing one reply, in milliseconds
    #[arg(long, default_value = "250")]
    send_timeout_ms: u64,

    /// Maximum open connections
    #[arg(long, default_value = "100")]
    max_connections: usize,

    /// Minimum connection age before reaping, in milliseconds
    #[arg(long, default_value = "0")]
    unreapable_time_ms: u64,

    /// Minimum interval between connection LRU updates, in milliseconds
    #[arg(long, default_value = "0")]
    update_threshold_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn config(&self) -> ServerConfig {
        let secure = match (&self.cert, &self.key, &self.ca) {
            (Some(cert), Some(key), Some(ca)) => Some(CredentialPaths::new(cert, key, ca)),
            _ => None,
        };

        ServerConfig {
            ordering: if self.out_of_order { OrderingMode::OutOfOrder } else { OrderingMode::InOrder },
            secure,
            max_inflight: self.max_inflight,
            send_timeout: Duration::from_millis(self.send_timeout_ms),
            max_connections: self.max_connections,
            unreapable_time: Duration::from_millis(self.unreapable_time_ms),
            update_threshold: Duration::from_millis(self.update_threshold_ms),
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("mcpipe server starting");
    tracing::info!("Binding to {}", args.bind);

    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    let server = ServerHarness::new(SystemEnv::new(), listener, args.config())?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}

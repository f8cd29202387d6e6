//! Client against a real server on loopback TCP.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use mcpipe_client::{ClientOptions, ConcurrentClient, TcpConnector, Transport};
use mcpipe_core::ServerConfig;
use mcpipe_proto::{ReplyStatus, Request};
use mcpipe_server::{ServerHandle, ServerHarness, SystemEnv};
use tokio::net::TcpListener;

const TIMEOUT: Duration = Duration::from_millis(500);

async fn start(config: ServerConfig) -> (u16, ServerHandle) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = ServerHarness::new(SystemEnv::new(), listener, config).unwrap();
    let port = server.local_addr().unwrap().port();
    let handle = server.handle();
    tokio::spawn(server.run());
    (port, handle)
}

fn client(port: u16) -> ConcurrentClient {
    ConcurrentClient::new(TcpConnector, ClientOptions::new("127.0.0.1", port).with_timeout(TIMEOUT))
}

#[tokio::test]
async fn hold_flush_in_order() {
    let (port, handle) = start(ServerConfig::in_order()).await;
    let mut client = client(port);

    client.send_get("hold", ReplyStatus::Found, TIMEOUT);
    client.send_get("flush", ReplyStatus::Found, TIMEOUT);
    client.send_get("k3", ReplyStatus::Found, TIMEOUT);
    client.wait_for_replies(0).await;

    let accounting = client.accounting();
    assert!(accounting.is_idle());
    assert!(accounting.inflight_max() >= 2);
    handle.shutdown();
}

#[tokio::test]
async fn sized_and_malformed_values() {
    let (port, handle) = start(ServerConfig::in_order()).await;
    let mut client = client(port);

    client.send_get("value_size:100", ReplyStatus::Found, TIMEOUT);
    client.send_get("value_size:abc", ReplyStatus::Found, TIMEOUT);
    client.send_get("empty", ReplyStatus::Found, TIMEOUT);
    client.send_set("key", &b"value"[..], ReplyStatus::Stored);
    client.wait_for_replies(0).await;
    handle.shutdown();
}

#[tokio::test]
async fn sleep_times_out_below_stall() {
    let config = ServerConfig::in_order().with_stall(Duration::from_millis(300));
    let (port, handle) = start(config).await;
    let mut client = client(port);

    client.send_get("sleep", ReplyStatus::Timeout, Duration::from_millis(50));
    client.wait_for_replies(0).await;

    client.send_get("sleep", ReplyStatus::NotFound, Duration::from_secs(2));
    client.wait_for_replies(0).await;
    handle.shutdown();
}

#[tokio::test]
async fn refused_connection_is_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut client = client(port);
    let downs = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&downs);
    client.set_status_callbacks(|| {}, move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    client.send_get("abc", ReplyStatus::ConnectError, TIMEOUT);
    client.wait_for_replies(0).await;

    assert_eq!(downs.load(Ordering::SeqCst), 1);
    assert_eq!(client.accounting().pending_max(), 1);
    assert_eq!(client.accounting().inflight_max(), 0);
}

#[tokio::test]
async fn partial_wait_leaves_remaining_outstanding() {
    let (port, handle) = start(ServerConfig::in_order()).await;
    let mut client = client(port);

    client.send_get("hold", ReplyStatus::Found, TIMEOUT);
    client.send_get("a", ReplyStatus::Found, TIMEOUT);
    client.send_get("b", ReplyStatus::Found, TIMEOUT);
    assert_eq!(client.outstanding(), 3);

    client.send_get("flush", ReplyStatus::Found, TIMEOUT);
    client.wait_for_replies(2).await;
    assert!(client.outstanding() <= 2);

    client.wait_for_replies(0).await;
    assert_eq!(client.outstanding(), 0);
    handle.shutdown();
}

#[tokio::test]
async fn transport_reports_up_once_per_connection() {
    let (port, handle) = start(ServerConfig::out_of_order()).await;
    let transport = Transport::new(TcpConnector, ClientOptions::new("127.0.0.1", port));

    let ups = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&ups);
    transport.set_status_callbacks(
        move || {
            seen.fetch_add(1, Ordering::SeqCst);
        },
        |_| {},
    );

    for key in ["a", "b", "c"] {
        let reply = transport.send_with_timeout(&Request::get(key), TIMEOUT).await;
        assert_eq!(reply.status, ReplyStatus::Found);
    }

    assert!(transport.is_up());
    assert_eq!(ups.load(Ordering::SeqCst), 1);
    assert_eq!(handle.accepted_connections(), 1);
    handle.shutdown();
}

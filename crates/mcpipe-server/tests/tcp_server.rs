//! Serving loop over real loopback TCP.
//!
//! These tests speak raw frames to the server so they exercise the handshake,
//! reply routing, backpressure and connection limits without the client
//! crate.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use mcpipe_core::{CredentialPaths, ServerConfig, frame_io};
use mcpipe_proto::{FrameFlags, Hello, ProtocolVariant, Qos, Reply, ReplyStatus, Request};
use mcpipe_server::{ConnectionInfo, ServerError, ServerHarness, SystemEnv};
use tokio::{
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};

async fn start(
    config: ServerConfig,
) -> (std::net::SocketAddr, mcpipe_server::ServerHandle, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = ServerHarness::new(SystemEnv::new(), listener, config).unwrap();
    let addr = server.local_addr().unwrap();
    let handle = server.handle();
    let task = tokio::spawn(async move { server.run().await.unwrap() });
    (addr, handle, task)
}

async fn connect(addr: std::net::SocketAddr, hello: &Hello) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    frame_io::write_frame(&mut stream, &hello.to_frame().unwrap()).await.unwrap();
    let ack = frame_io::read_frame(&mut stream).await.unwrap().unwrap();
    assert!(hello.is_acked_by(&ack));
    stream
}

fn plain_hello() -> Hello {
    Hello { flags: FrameFlags::empty(), secure_fingerprint: None, qos: None }
}

async fn get(stream: &mut TcpStream, request_id: u32, key: &str) {
    let frame = Request::get(key).to_frame(request_id, FrameFlags::empty()).unwrap();
    frame_io::write_frame(stream, &frame).await.unwrap();
}

async fn reply(stream: &mut TcpStream) -> (u32, Reply) {
    let frame = frame_io::read_frame(stream).await.unwrap().unwrap();
    (frame.header.request_id(), Reply::from_frame(&frame).unwrap())
}

#[tokio::test]
async fn echo_then_shutdown() {
    let (addr, handle, task) = start(ServerConfig::in_order()).await;
    let mut stream = connect(addr, &plain_hello()).await;

    get(&mut stream, 1, "abc").await;
    let (id, echoed) = reply(&mut stream).await;
    assert_eq!(id, 1);
    assert_eq!(echoed, Reply::found("abc", "abc"));

    get(&mut stream, 2, "shutdown").await;
    let (id, stopped) = reply(&mut stream).await;
    assert_eq!(id, 2);
    assert_eq!(stopped.status, ReplyStatus::NotFound);

    tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    assert!(handle.is_shutdown());
    assert_eq!(handle.accepted_connections(), 1);
}

#[tokio::test]
async fn hold_is_released_by_flush() {
    let (addr, handle, _task) = start(ServerConfig::in_order()).await;
    let mut stream = connect(addr, &plain_hello()).await;

    get(&mut stream, 1, "hold").await;
    let held = tokio::time::timeout(Duration::from_millis(100), reply(&mut stream)).await;
    assert!(held.is_err(), "hold must not be answered before a flush");

    get(&mut stream, 2, "flush").await;
    get(&mut stream, 3, "k3").await;

    let mut arrived = Vec::new();
    for _ in 0..3 {
        arrived.push(reply(&mut stream).await);
    }
    assert_eq!(arrived, [
        (1, Reply::found("hold", "hold")),
        (2, Reply::found("flush", "flush")),
        (3, Reply::found("k3", "k3")),
    ]);
    handle.shutdown();
}

#[tokio::test]
async fn inflight_limit_defers_reading_until_a_reply_is_written() {
    let (addr, _handle, task) = start(ServerConfig::in_order().with_max_inflight(2)).await;
    let mut stream = connect(addr, &plain_hello()).await;

    get(&mut stream, 1, "hold").await;
    get(&mut stream, 2, "a").await;
    get(&mut stream, 3, "flush").await;

    let stalled = tokio::time::timeout(Duration::from_millis(200), reply(&mut stream)).await;
    assert!(stalled.is_err(), "flush must stay unread while both permits are held");

    // Shutdown on another connection flushes the shared queue, which frees
    // this connection's permits.
    let mut other = connect(addr, &plain_hello()).await;
    get(&mut other, 1, "shutdown").await;

    let ids = [reply(&mut stream).await.0, reply(&mut stream).await.0];
    assert_eq!(ids, [1, 2]);
    tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
}

#[tokio::test]
async fn stalled_reader_is_closed_after_send_timeout() {
    let mut config = ServerConfig::out_of_order().with_max_inflight(0);
    config.send_timeout = Duration::from_millis(50);
    let (addr, handle, _task) = start(config).await;
    let mut stalled = connect(addr, &plain_hello()).await;

    // Far more reply bytes than loopback socket buffers hold.
    for request_id in 1..=8 {
        get(&mut stalled, request_id, "value_size:8388608").await;
    }
    tokio::time::sleep(Duration::from_millis(500)).await;

    let drained = tokio::time::timeout(Duration::from_secs(5), async {
        while let Ok(Some(_)) = frame_io::read_frame(&mut stalled).await {}
    })
    .await;
    assert!(drained.is_ok(), "connection must be closed once a reply write times out");

    let mut fresh = connect(addr, &plain_hello()).await;
    get(&mut fresh, 1, "abc").await;
    assert_eq!(reply(&mut fresh).await, (1, Reply::found("abc", "abc")));
    assert!(!handle.is_shutdown());
    handle.shutdown();
}

#[tokio::test]
async fn hook_sees_variant_and_qos() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut server =
        ServerHarness::new(SystemEnv::new(), listener, ServerConfig::out_of_order()).unwrap();
    let addr = server.local_addr().unwrap();
    let handle = server.handle();

    let seen: Arc<Mutex<Vec<ConnectionInfo>>> = Arc::default();
    let sink = Arc::clone(&seen);
    server.on_connection_accepted(move |info| sink.lock().unwrap().push(info.clone()));
    tokio::spawn(server.run());

    let hello = Hello {
        flags: FrameFlags::session(ProtocolVariant::Compact, true),
        secure_fingerprint: None,
        qos: Some(Qos { class: 3, path: 1 }),
    };
    let mut stream = connect(addr, &hello).await;

    get(&mut stream, 1, "abc").await;
    let (_, compact) = reply(&mut stream).await;
    assert_eq!(compact.key, "", "compact replies omit the key");
    assert_eq!(compact.value.as_deref(), Some(&b"abc"[..]));

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].variant, ProtocolVariant::Compact);
    assert!(seen[0].typed);
    assert!(!seen[0].secure);
    assert_eq!(seen[0].qos, Some(Qos { class: 3, path: 1 }));
    handle.shutdown();
}

#[tokio::test]
async fn connections_over_limit_are_closed() {
    let (addr, handle, _task) = start(ServerConfig::in_order().with_max_connections(1)).await;
    let _first = connect(addr, &plain_hello()).await;

    let mut second = TcpStream::connect(addr).await.unwrap();
    let _ = frame_io::write_frame(&mut second, &plain_hello().to_frame().unwrap()).await;
    let closed = frame_io::read_frame(&mut second).await;
    assert!(!matches!(closed, Ok(Some(_))), "over-limit connection must not be acked");

    assert_eq!(handle.accepted_connections(), 1);
    handle.shutdown();
}

#[tokio::test]
async fn secure_client_rejected_by_plain_server() {
    let (addr, handle, _task) = start(ServerConfig::in_order()).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let hello =
        Hello { flags: FrameFlags::empty(), secure_fingerprint: Some([9; 32]), qos: None };
    frame_io::write_frame(&mut stream, &hello.to_frame().unwrap()).await.unwrap();

    assert!(!matches!(frame_io::read_frame(&mut stream).await, Ok(Some(_))));
    assert_eq!(handle.accepted_connections(), 0);
    handle.shutdown();
}

#[tokio::test]
async fn unreadable_credentials_are_config_errors() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let paths = CredentialPaths::new("/do/not/exist", "/do/not/exist", "/do/not/exist");
    let config = ServerConfig::in_order().with_secure(paths);

    let result = ServerHarness::new(SystemEnv::new(), listener, config);
    assert!(matches!(result, Err(ServerError::Config(_))));
}

#[tokio::test]
async fn oversized_value_is_remote_error() {
    let (addr, handle, _task) = start(ServerConfig::out_of_order()).await;
    let mut stream = connect(addr, &plain_hello()).await;

    get(&mut stream, 1, "value_size:99999999999").await;
    let (_, failed) = reply(&mut stream).await;
    assert_eq!(failed.status, ReplyStatus::RemoteError);
    handle.shutdown();
}

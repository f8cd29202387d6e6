//! Modelled secure channel: credentials are loaded from PEM files and the
//! CA fingerprint is checked during the handshake.

mod common;

use common::{TIMEOUT, client_with, mint_credentials};
use mcpipe_client::SecureChannel;
use mcpipe_core::{CredentialPaths, ServerConfig};
use mcpipe_harness::{Scenario, server_options};
use mcpipe_proto::ReplyStatus;

fn secure_server(dir: &std::path::Path) -> ServerConfig {
    ServerConfig::in_order().with_secure(CredentialPaths::in_dir(dir))
}

/// Run one client sending a single Get that must end with `expected`.
fn single_get(config: ServerConfig, secure: SecureChannel, expected: ReplyStatus) -> usize {
    let scenario = Scenario::new(config);
    let probe = scenario.probe();

    scenario
        .client("client", async move {
            let mut client = client_with(server_options().with_secure(secure));
            client.send_get("abc", expected, TIMEOUT);
            client.wait_for_replies(0).await;
            Ok(())
        })
        .run()
        .unwrap();

    probe.accepted_connections()
}

#[test]
fn valid_credentials_connect() {
    let dir = mint_credentials();
    let scenario = Scenario::new(secure_server(dir.path()));
    let probe = scenario.probe();
    let secure = SecureChannel::valid(dir.path());

    scenario
        .client("client", async move {
            let mut client = client_with(server_options().with_secure(secure));
            client.send_get("abc", ReplyStatus::Found, TIMEOUT);
            client.send_get("value_size:64", ReplyStatus::Found, TIMEOUT);
            client.wait_for_replies(0).await;
            Ok(())
        })
        .run()
        .unwrap();

    let connections = probe.connections();
    assert_eq!(connections.len(), 1);
    assert!(connections[0].secure);
}

#[test]
fn missing_credentials_are_connect_error() {
    let dir = mint_credentials();
    let accepted =
        single_get(secure_server(dir.path()), SecureChannel::invalid(), ReplyStatus::ConnectError);
    assert_eq!(accepted, 0);
}

#[test]
fn broken_credentials_are_connect_error() {
    let dir = mint_credentials();
    let accepted = single_get(
        secure_server(dir.path()),
        SecureChannel::broken(dir.path()),
        ReplyStatus::ConnectError,
    );
    assert_eq!(accepted, 0);
}

#[test]
fn foreign_ca_is_rejected() {
    let server_dir = mint_credentials();
    let client_dir = mint_credentials();
    let accepted = single_get(
        secure_server(server_dir.path()),
        SecureChannel::valid(client_dir.path()),
        ReplyStatus::ConnectError,
    );
    assert_eq!(accepted, 0);
}

#[test]
fn plain_client_rejected_by_secure_server() {
    let dir = mint_credentials();
    let accepted =
        single_get(secure_server(dir.path()), SecureChannel::Plain, ReplyStatus::ConnectError);
    assert_eq!(accepted, 0);
}

#[test]
fn secure_client_rejected_by_plain_server() {
    let dir = mint_credentials();
    let accepted = single_get(
        ServerConfig::in_order(),
        SecureChannel::valid(dir.path()),
        ReplyStatus::ConnectError,
    );
    assert_eq!(accepted, 0);
}

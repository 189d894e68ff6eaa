//! Shared utilities for integration tests.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    time::Duration,
};

use log4j_relay::config::{DialPolicy, Endpoint, RelayConfig};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::{TcpListener, TcpStream},
};

/// Create a TCP listener bound to a free local port.
pub fn unused_listener() -> StdTcpListener {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr).expect("failed to bind port")
}

/// An address nothing is listening on.
///
/// The port was free a moment ago; another process could claim it, so only
/// rely on this where a stray listener would merely fail the test.
pub fn closed_addr() -> SocketAddr {
    let listener = unused_listener();
    listener.local_addr().expect("listener address")
}

/// Relay configuration listening on an ephemeral port and forwarding to
/// `sink`, with a fast dial policy.
pub fn loopback_config(sink: SocketAddr) -> RelayConfig {
    RelayConfig {
        listen: Endpoint::new("127.0.0.1", 0),
        forward: Endpoint::new(sink.ip().to_string(), sink.port()),
        dial: DialPolicy {
            attempts: 2,
            delay: Duration::from_millis(10),
            connect_timeout: Duration::from_secs(1),
        },
        ..RelayConfig::default()
    }
}

/// Downstream sink collecting every line it receives until EOF.
pub async fn collect_lines(listener: TcpListener) -> Vec<String> {
    let (stream, _) = listener.accept().await.expect("sink accept");
    read_lines(stream).await
}

async fn read_lines(stream: TcpStream) -> Vec<String> {
    let mut lines = BufReader::new(stream).lines();
    let mut out = Vec::new();
    while let Some(line) = lines.next_line().await.expect("sink read") {
        out.push(line);
    }
    out
}

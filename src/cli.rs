//! Command line interface for the `log4j-relay` binary.
//!
//! Every option falls back to an environment variable, then to a default.

use std::net::SocketAddr;

use clap::Parser;

/// Relay log4j `SocketAppender` streams to a JSON-lines sink.
#[derive(Debug, Parser)]
#[command(
    name = "log4j-relay",
    version,
    about = "Collect log4j SocketAppender events and forward them as JSON lines"
)]
pub struct Cli {
    /// Host to accept log4j connections on.
    #[arg(long, env = "HOST_LOG4J_INPUT", default_value = "localhost")]
    pub listen_host: String,

    /// Port to accept log4j connections on.
    #[arg(long, env = "PORT_LOG4J_INPUT", default_value_t = 2518)]
    pub listen_port: u16,

    /// Host of the downstream sink.
    #[arg(long, env = "HOST_LOG4J_OUTPUT", default_value = "localhost")]
    pub forward_host: String,

    /// Port of the downstream sink.
    #[arg(long, env = "PORT_LOG4J_OUTPUT", default_value_t = 5540)]
    pub forward_port: u16,

    /// Records held between the collector and the forwarder.
    #[arg(long, env = "BUFFER_LOG4J_OUTPUT", default_value_t = 1000)]
    pub buffer: usize,

    /// Connection attempts made to the sink at startup.
    #[arg(long, env = "DIAL_ATTEMPTS_LOG4J_OUTPUT", default_value_t = 5)]
    pub dial_attempts: u32,

    /// Milliseconds between connection attempts.
    #[arg(long, env = "DIAL_DELAY_MS_LOG4J_OUTPUT", default_value_t = 1000)]
    pub dial_delay_ms: u64,

    /// Write attempts per record before it is dropped.
    #[arg(long, env = "WRITE_ATTEMPTS_LOG4J_OUTPUT", default_value_t = 3)]
    pub write_attempts: u32,

    /// Largest accepted object frame in bytes.
    #[arg(long)]
    pub max_frame_length: Option<usize>,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

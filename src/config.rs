//! Runtime configuration for the relay.
//!
//! [`RelayConfig`] is assembled once at startup (normally from the command
//! line) and handed by value to the acceptor and forwarder. Call
//! [`RelayConfig::normalized`] before use to lift zero counts and clamp
//! limits into range.

use std::{fmt, net::SocketAddr, time::Duration};

use crate::{server::BackoffConfig, splitter};

/// Default host for both endpoints.
pub const DEFAULT_HOST: &str = "localhost";
/// Default port the collector listens on.
pub const DEFAULT_LISTEN_PORT: u16 = 2518;
/// Default port of the downstream sink.
pub const DEFAULT_FORWARD_PORT: u16 = 5540;
/// Default capacity of the outbound queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// A TCP host and port pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or address literal.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Borrow as a tuple accepted by `tokio::net` connect and bind helpers.
    #[must_use]
    pub fn as_tuple(&self) -> (&str, u16) { (&self.host, self.port) }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// How the forwarder establishes its outbound connection.
///
/// # Default Values
/// - `attempts`: 5
/// - `delay`: 1 second between attempts
/// - `connect_timeout`: 5 seconds per attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DialPolicy {
    /// Total connection attempts before giving up.
    pub attempts: u32,
    /// Pause between failed attempts.
    pub delay: Duration,
    /// Upper bound on a single attempt.
    pub connect_timeout: Duration,
}

impl Default for DialPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl DialPolicy {
    /// Ensure at least one attempt with a non-zero timeout.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.attempts = self.attempts.max(1);
        self.connect_timeout = self.connect_timeout.max(Duration::from_millis(1));
        self
    }
}

/// How the forwarder retries a failed record write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WritePolicy {
    /// Total write attempts per record.
    pub attempts: u32,
    /// Pause between failed attempts.
    pub delay: Duration,
}

impl Default for WritePolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::ZERO,
        }
    }
}

impl WritePolicy {
    /// Ensure at least one attempt.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.attempts = self.attempts.max(1);
        self
    }
}

/// Complete relay configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayConfig {
    /// Address the collector accepts log4j connections on.
    pub listen: Endpoint,
    /// Downstream sink receiving JSON lines.
    pub forward: Endpoint,
    /// Capacity of the queue shared by every session.
    pub queue_capacity: usize,
    /// Largest object frame a session accepts.
    pub max_frame_length: usize,
    /// Outbound connection policy.
    pub dial: DialPolicy,
    /// Outbound write retry policy.
    pub write: WritePolicy,
    /// Back-off applied when `accept()` fails.
    pub accept_backoff: BackoffConfig,
    /// Address for the Prometheus exporter, if enabled.
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: Endpoint::new(DEFAULT_HOST, DEFAULT_LISTEN_PORT),
            forward: Endpoint::new(DEFAULT_HOST, DEFAULT_FORWARD_PORT),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_frame_length: splitter::MAX_FRAME_LENGTH,
            dial: DialPolicy::default(),
            write: WritePolicy::default(),
            accept_backoff: BackoffConfig::default(),
            metrics_addr: None,
        }
    }
}

impl RelayConfig {
    /// Lift zero counts to one and clamp limits into their valid ranges.
    ///
    /// # Examples
    ///
    /// ```
    /// use log4j_relay::config::RelayConfig;
    ///
    /// let cfg = RelayConfig {
    ///     queue_capacity: 0,
    ///     max_frame_length: 1,
    ///     ..RelayConfig::default()
    /// }
    /// .normalized();
    /// assert_eq!(cfg.queue_capacity, 1);
    /// assert_eq!(cfg.max_frame_length, 64);
    /// ```
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.queue_capacity = self.queue_capacity.max(1);
        self.max_frame_length = splitter::clamp_frame_length(self.max_frame_length);
        self.dial = self.dial.normalized();
        self.write = self.write.normalized();
        self.accept_backoff = self.accept_backoff.normalized();
        self
    }
}

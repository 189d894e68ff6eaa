//! Tokio-based acceptor for log4j socket connections.
//!
//! `CollectorServer` accepts TCP connections and runs one session task per
//! connection, each pushing onto the shared outbound queue held by its
//! [`SessionContext`].

use std::sync::Arc;

use tokio::{net::TcpListener, sync::oneshot};

use crate::session::SessionContext;

/// Tokio-based acceptor running a session per inbound connection.
///
/// The server carries a typestate `S` indicating whether it is [`Unbound`]
/// (not yet bound to a TCP listener) or [`Bound`]. New servers start
/// `Unbound` and must call [`bind`](CollectorServer::bind) or
/// [`bind_existing_listener`](CollectorServer::bind_existing_listener)
/// before running. Accept failures back off exponentially and never stop
/// the server.
pub struct CollectorServer<S = Unbound>
where
    S: ServerState,
{
    pub(crate) context: SessionContext,
    /// Channel used to notify when the accept loop is running.
    ///
    /// A `oneshot::Sender` can transmit only one readiness notification, so
    /// a fresh sender must be supplied for each run.
    pub(crate) ready_tx: Option<oneshot::Sender<()>>,
    /// Exponential back-off applied after `accept()` failures.
    pub(crate) backoff_config: BackoffConfig,
    /// Typestate tracking whether the server has been bound to a listener.
    pub(crate) state: S,
}

/// Marker indicating the server has not yet bound a listener.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbound;

/// Marker indicating the server is bound to a TCP listener.
#[derive(Debug, Clone)]
pub struct Bound {
    pub(crate) listener: Arc<TcpListener>,
}

/// Trait implemented by [`Unbound`] and [`Bound`] to model binding typestate.
pub trait ServerState: sealed::Sealed {}

mod sealed {
    //! Prevent external implementations of [`ServerState`].

    pub trait Sealed {}
    impl Sealed for super::Unbound {}
    impl Sealed for super::Bound {}
}

impl ServerState for Unbound {}
impl ServerState for Bound {}

mod config;
pub use config::binding;
mod connection;
pub mod error;
mod runtime;

pub use error::ServerError;
/// Re-exported configuration types for accept back-off behaviour.
pub use runtime::BackoffConfig;

#[cfg(test)]
pub(crate) mod test_util;

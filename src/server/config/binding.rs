//! Listener binding for [`CollectorServer`].

use std::{
    net::{SocketAddr, TcpListener as StdTcpListener, ToSocketAddrs},
    sync::Arc,
};

use tokio::net::TcpListener;

use crate::server::{Bound, CollectorServer, ServerError, ServerState, Unbound};

impl<S> CollectorServer<S>
where
    S: ServerState,
{
    fn bind_to_listener(
        self,
        std_listener: StdTcpListener,
    ) -> Result<CollectorServer<Bound>, ServerError> {
        let CollectorServer {
            context,
            ready_tx,
            backoff_config,
            ..
        } = self;

        std_listener
            .set_nonblocking(true)
            .map_err(ServerError::Bind)?;
        let tokio_listener = TcpListener::from_std(std_listener).map_err(ServerError::Bind)?;

        Ok(CollectorServer {
            context,
            ready_tx,
            backoff_config,
            state: Bound {
                listener: Arc::new(tokio_listener),
            },
        })
    }
}

impl CollectorServer<Unbound> {
    /// Return `None` as the server is not bound.
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> { None }

    /// Bind to `addr`, resolving host names with the system resolver.
    ///
    /// # Examples
    ///
    /// ```
    /// use log4j_relay::{forwarder::outbound_queue, server::CollectorServer, session::SessionContext};
    ///
    /// let (tx, _rx) = outbound_queue(8);
    /// # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    /// # let _guard = rt.enter();
    /// let server = CollectorServer::new(SessionContext::new(tx))
    ///     .bind(("127.0.0.1", 0))
    ///     .expect("bind failed");
    /// assert!(server.local_addr().is_some());
    /// ```
    ///
    /// # Errors
    /// Returns [`ServerError::Bind`] if binding or configuring the listener
    /// fails.
    pub fn bind(self, addr: impl ToSocketAddrs) -> Result<CollectorServer<Bound>, ServerError> {
        let std_listener = StdTcpListener::bind(addr).map_err(ServerError::Bind)?;
        self.bind_existing_listener(std_listener)
    }

    /// Bind to an existing `StdTcpListener`.
    ///
    /// # Errors
    /// Returns [`ServerError::Bind`] if configuring the listener fails.
    pub fn bind_existing_listener(
        self,
        std_listener: StdTcpListener,
    ) -> Result<CollectorServer<Bound>, ServerError> {
        self.bind_to_listener(std_listener)
    }
}

impl CollectorServer<Bound> {
    /// Returns the bound address, or `None` if retrieving it fails.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> { self.state.listener.local_addr().ok() }

    /// Rebind to a fresh address.
    ///
    /// # Errors
    /// Returns [`ServerError::Bind`] if binding or configuring the listener
    /// fails.
    pub fn bind(self, addr: impl ToSocketAddrs) -> Result<Self, ServerError> {
        let std_listener = StdTcpListener::bind(addr).map_err(ServerError::Bind)?;
        self.bind_to_listener(std_listener)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::server::{
        CollectorServer,
        ServerError,
        test_util::{context, free_listener, listener_addr},
    };

    #[rstest]
    #[tokio::test]
    async fn binds_existing_listener(free_listener: std::net::TcpListener) {
        let addr = listener_addr(&free_listener);
        let server = CollectorServer::new(context())
            .bind_existing_listener(free_listener)
            .expect("bind");
        assert_eq!(server.local_addr(), Some(addr));
    }

    #[tokio::test]
    async fn unbound_server_has_no_address() {
        assert!(CollectorServer::new(context()).local_addr().is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn bind_to_taken_port_fails(free_listener: std::net::TcpListener) {
        let taken = listener_addr(&free_listener);
        let err = CollectorServer::new(context())
            .bind(taken)
            .err()
            .expect("port is already bound");
        assert!(matches!(err, ServerError::Bind(_)));
    }

    #[tokio::test]
    async fn rebinding_moves_to_new_address() {
        let server = CollectorServer::new(context())
            .bind(("127.0.0.1", 0))
            .expect("bind");
        let first = server.local_addr().expect("first addr");
        let server = server.bind(("127.0.0.1", 0)).expect("rebind");
        let second = server.local_addr().expect("second addr");
        assert_ne!(first.port(), second.port());
    }
}

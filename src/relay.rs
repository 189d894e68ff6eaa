//! Startup orchestration: forwarder first, then the collector.

use std::{future::Future, net::SocketAddr};

use tokio::task::JoinHandle;
use tracing::info;

use crate::{
    config::RelayConfig,
    error::RelayError,
    forwarder::{ForwardSummary, Forwarder, dial, outbound_queue},
    server::{Bound, CollectorServer},
    session::SessionContext,
};

/// A running forwarder paired with a bound, not yet accepting, collector.
///
/// The downstream sink is connected before the listen socket is bound, so a
/// sink that cannot be reached stops startup before any client connects.
pub struct Relay {
    server: CollectorServer<Bound>,
    forwarder: JoinHandle<ForwardSummary>,
}

impl Relay {
    /// Connect downstream, start the forwarder and bind the listen address.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Forward`] when every dial attempt fails and
    /// [`RelayError::Server`] when the listen address cannot be bound.
    pub async fn start(config: RelayConfig) -> Result<Self, RelayError> {
        let config = config.normalized();
        let stream = dial(&config.forward, config.dial).await?;
        let (tx, rx) = outbound_queue(config.queue_capacity);
        let forwarder = tokio::spawn(Forwarder::new(stream, rx, config.write).run());

        let context = SessionContext::new(tx).max_frame_length(config.max_frame_length);
        let server = CollectorServer::new(context)
            .accept_backoff(config.accept_backoff)
            .bind(config.listen.as_tuple())?;
        info!(
            listen = ?server.local_addr(),
            forward = %config.forward,
            queue_capacity = config.queue_capacity,
            "relay started"
        );
        Ok(Self { server, forwarder })
    }

    /// Address the collector is bound to.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> { self.server.local_addr() }

    /// Run until Ctrl+C, then drain the queue downstream.
    ///
    /// # Errors
    ///
    /// See [`run_with_shutdown`](Self::run_with_shutdown).
    pub async fn run(self) -> Result<ForwardSummary, RelayError> {
        self.run_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Once in-flight sessions finish, the queue closes and the forwarder
    /// writes what remains before its totals are returned.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Join`] if the forwarder task panicked.
    pub async fn run_with_shutdown<F>(self, shutdown: F) -> Result<ForwardSummary, RelayError>
    where
        F: Future<Output = ()> + Send,
    {
        let Self { server, forwarder } = self;
        server.run_with_shutdown(shutdown).await?;
        let summary = forwarder.await?;
        info!(
            forwarded = summary.forwarded,
            dropped = summary.dropped,
            "relay stopped"
        );
        Ok(summary)
    }
}

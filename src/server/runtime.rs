//! Runtime control for [`CollectorServer`].

mod accept;
mod backoff;

use std::future::Future;

#[cfg(test)]
pub(super) use accept::MockAcceptListener;
pub(super) use accept::{AcceptLoopOptions, accept_loop};
pub use backoff::BackoffConfig;
use tokio::{select, signal};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::warn;

use super::{Bound, CollectorServer, ServerError};

impl CollectorServer<Bound> {
    /// Run the acceptor until Ctrl+C is received.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use log4j_relay::{forwarder::outbound_queue, server::CollectorServer, session::SessionContext};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), log4j_relay::server::ServerError> {
    /// let (tx, _rx) = outbound_queue(1000);
    /// let server = CollectorServer::new(SessionContext::new(tx)).bind(("localhost", 2518))?;
    /// server.run().await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// Attempting to run a server without binding fails to compile:
    ///
    /// ```compile_fail
    /// use log4j_relay::{forwarder::outbound_queue, server::CollectorServer, session::SessionContext};
    ///
    /// async fn try_run() {
    ///     let (tx, _rx) = outbound_queue(1);
    ///     CollectorServer::new(SessionContext::new(tx))
    ///         .run()
    ///         .await
    ///         .expect("unbound servers do not expose run()");
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// Currently infallible once bound; accept failures are retried with
    /// exponential back-off and do not surface as errors.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(async {
            let _ = signal::ctrl_c().await;
        })
        .await
    }

    /// Run the acceptor until `shutdown` resolves, then wait for in-flight
    /// sessions to finish.
    ///
    /// # Examples
    ///
    /// ```
    /// use log4j_relay::{forwarder::outbound_queue, server::CollectorServer, session::SessionContext};
    /// use tokio::sync::oneshot;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), log4j_relay::server::ServerError> {
    /// let (tx, _rx) = outbound_queue(8);
    /// let server = CollectorServer::new(SessionContext::new(tx)).bind(("127.0.0.1", 0))?;
    ///
    /// let (stop_tx, stop_rx) = oneshot::channel::<()>();
    /// let handle = tokio::spawn(server.run_with_shutdown(async {
    ///     let _ = stop_rx.await;
    /// }));
    ///
    /// let _ = stop_tx.send(());
    /// handle
    ///     .await
    ///     .expect("join server task")
    ///     .expect("server run failed");
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Currently infallible once bound; accept failures are retried with
    /// exponential back-off and do not surface as errors.
    #[expect(
        clippy::integer_division_remainder_used,
        reason = "tokio::select! expands to modulus internally"
    )]
    pub async fn run_with_shutdown<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let CollectorServer {
            context,
            ready_tx,
            backoff_config,
            state: Bound { listener },
        } = self;
        let shutdown_token = CancellationToken::new();
        let tracker = TaskTracker::new();

        tracker.spawn(accept_loop(
            listener,
            context,
            AcceptLoopOptions {
                shutdown: shutdown_token.clone(),
                tracker: tracker.clone(),
                backoff: backoff_config,
            },
        ));

        if let Some(tx) = ready_tx
            && tx.send(()).is_err()
        {
            warn!("Failed to send readiness signal: receiver dropped");
        }

        select! {
            () = shutdown => shutdown_token.cancel(),
            () = tracker.wait() => {},
        }

        tracker.close();
        tracker.wait().await;
        Ok(())
    }
}

//! Builder methods for [`CollectorServer`].

use tokio::sync::oneshot;

use super::{BackoffConfig, CollectorServer, ServerState, Unbound};
use crate::session::SessionContext;

pub mod binding;

impl CollectorServer<Unbound> {
    /// Create a server that runs sessions with `context`.
    ///
    /// The listener is unset; call [`bind`](Self::bind) before running.
    #[must_use]
    pub fn new(context: SessionContext) -> Self {
        Self {
            context,
            ready_tx: None,
            backoff_config: BackoffConfig::default(),
            state: Unbound,
        }
    }
}

impl<S> CollectorServer<S>
where
    S: ServerState,
{
    /// Configure exponential back-off for failed `accept()` calls.
    ///
    /// The configuration is normalized on use.
    #[must_use]
    pub fn accept_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff_config = backoff;
        self
    }

    /// Configure a channel signalled once the accept loop is running.
    #[must_use]
    pub fn ready_signal(mut self, tx: oneshot::Sender<()>) -> Self {
        self.ready_tx = Some(tx);
        self
    }

    /// Returns the configured accept back-off.
    #[must_use]
    pub const fn backoff_config(&self) -> BackoffConfig { self.backoff_config }

    /// Returns the context handed to every session.
    #[must_use]
    pub const fn context(&self) -> &SessionContext { &self.context }
}

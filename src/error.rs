//! Top-level error type for running the relay.

use thiserror::Error;
use tokio::task::JoinError;

use crate::{forwarder::ForwardError, server::ServerError};

/// Errors that stop the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The downstream sink could not be reached at startup.
    #[error(transparent)]
    Forward(#[from] ForwardError),
    /// The collector could not bind its listen address.
    #[error(transparent)]
    Server(#[from] ServerError),
    /// The forwarder task ended abnormally.
    #[error("forwarder task failed: {0}")]
    Join(#[from] JoinError),
    /// The Prometheus exporter could not be installed.
    #[cfg(feature = "metrics")]
    #[error("metrics exporter failed: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

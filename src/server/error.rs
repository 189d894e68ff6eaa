//! Errors raised by [`CollectorServer`](super::CollectorServer) operations.

use std::io;

use thiserror::Error;

/// Errors that may occur while setting up the acceptor.
///
/// Accept failures are retried with back-off and never surface here.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or configuring the listen socket failed.
    #[error("bind error: {0}")]
    Bind(#[source] io::Error),
}

//! Errors raised by the forwarder.

use std::io;

use thiserror::Error;

/// Failure to reach or write to the downstream sink.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// Every connection attempt failed.
    #[error("could not connect to {endpoint} after {attempts} attempts: {source}")]
    Dial {
        /// The endpoint that was dialled.
        endpoint: String,
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        source: io::Error,
    },

    /// Every write attempt for one record failed.
    #[error("write failed after {attempts} attempts: {source}")]
    Write {
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        source: io::Error,
    },
}

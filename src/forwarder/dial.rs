//! Bounded-retry connection to the downstream sink.

use std::io;

use tokio::{
    net::TcpStream,
    time::{sleep, timeout},
};
use tracing::{info, warn};

use super::ForwardError;
use crate::config::{DialPolicy, Endpoint};

/// Connect to `endpoint`, retrying per `policy`.
///
/// Each attempt is bounded by the policy's connect timeout, and failed
/// attempts are separated by its fixed delay.
///
/// # Errors
///
/// Returns [`ForwardError::Dial`] with the last failure once every attempt
/// has failed.
pub async fn dial(endpoint: &Endpoint, policy: DialPolicy) -> Result<TcpStream, ForwardError> {
    let policy = policy.normalized();
    let mut attempt = 1;
    loop {
        let result = match timeout(policy.connect_timeout, TcpStream::connect(endpoint.as_tuple())).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")),
        };
        match result {
            Ok(stream) => {
                info!(%endpoint, attempt, "connected to downstream sink");
                return Ok(stream);
            }
            Err(source) if attempt >= policy.attempts => {
                return Err(ForwardError::Dial {
                    endpoint: endpoint.to_string(),
                    attempts: attempt,
                    source,
                });
            }
            Err(err) => {
                warn!(
                    %endpoint,
                    attempt,
                    max_attempts = policy.attempts,
                    error = %err,
                    "connect failed; retrying"
                );
                sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}

//! Outbound queue and the single task draining it downstream.
//!
//! Every session pushes JSON records onto one bounded queue created by
//! [`outbound_queue`]. A [`Forwarder`] owns the receiving end and the
//! outbound connection: it writes each record followed by `\n`, strictly in
//! queue order, retrying a failed write a fixed number of times before
//! dropping that record with a warning. The connection is never rebuilt.

mod dial;
mod error;

use std::io;

pub use dial::dial;
pub use error::ForwardError;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::mpsc,
    time::sleep,
};
use tracing::{debug, warn};

use crate::config::WritePolicy;

/// Producer handle for the outbound queue, cloned into every session.
pub type OutboundSender = mpsc::Sender<String>;
/// Consumer handle for the outbound queue, owned by the [`Forwarder`].
pub type OutboundReceiver = mpsc::Receiver<String>;

/// Create the bounded outbound queue.
///
/// A zero `capacity` is treated as one.
#[must_use]
pub fn outbound_queue(capacity: usize) -> (OutboundSender, OutboundReceiver) {
    mpsc::channel(capacity.max(1))
}

/// Totals reported when the forwarder stops.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ForwardSummary {
    /// Records written downstream.
    pub forwarded: u64,
    /// Records dropped after exhausting write attempts.
    pub dropped: u64,
}

/// Drains the outbound queue into a writer.
#[derive(Debug)]
pub struct Forwarder<W> {
    writer: W,
    queue: OutboundReceiver,
    policy: WritePolicy,
    line: Vec<u8>,
}

impl<W> Forwarder<W>
where
    W: AsyncWrite + Unpin,
{
    /// Create a forwarder writing records from `queue` to `writer`.
    #[must_use]
    pub fn new(writer: W, queue: OutboundReceiver, policy: WritePolicy) -> Self {
        Self {
            writer,
            queue,
            policy: policy.normalized(),
            line: Vec::new(),
        }
    }

    /// Forward records until every sender has been dropped and the queue is
    /// empty.
    pub async fn run(mut self) -> ForwardSummary {
        let mut summary = ForwardSummary::default();
        while let Some(record) = self.queue.recv().await {
            match self.forward(&record).await {
                Ok(()) => {
                    summary.forwarded += 1;
                    crate::metrics::inc_forwarded();
                }
                Err(err) => {
                    summary.dropped += 1;
                    crate::metrics::inc_dropped();
                    warn!(error = %err, len = record.len(), "dropping record");
                }
            }
        }
        if let Err(err) = self.writer.shutdown().await {
            debug!(error = %err, "outbound shutdown failed");
        }
        debug!(
            forwarded = summary.forwarded,
            dropped = summary.dropped,
            "outbound queue closed"
        );
        summary
    }

    /// Write one record and its newline terminator, retrying per the policy.
    ///
    /// # Errors
    ///
    /// Returns [`ForwardError::Write`] carrying the last I/O error once every
    /// attempt has failed.
    pub async fn forward(&mut self, record: &str) -> Result<(), ForwardError> {
        self.line.clear();
        self.line.extend_from_slice(record.as_bytes());
        self.line.push(b'\n');

        let mut attempt = 1;
        loop {
            match write_line(&mut self.writer, &self.line).await {
                Ok(()) => return Ok(()),
                Err(source) if attempt >= self.policy.attempts => {
                    return Err(ForwardError::Write {
                        attempts: attempt,
                        source,
                    });
                }
                Err(err) => {
                    debug!(attempt, error = %err, "outbound write failed; retrying");
                    if !self.policy.delay.is_zero() {
                        sleep(self.policy.delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &[u8]) -> io::Result<()> {
    writer.write_all(line).await?;
    writer.flush().await
}

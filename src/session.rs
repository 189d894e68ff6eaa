//! Per-connection pipeline from raw bytes to queued JSON records.
//!
//! A session drives one inbound stream through the splitter, decoder
//! adapter and transformer, pushing every resulting record onto the shared
//! outbound queue. Sessions never touch each other; a full queue suspends
//! the session until the forwarder catches up.

use std::{fmt, io, net::SocketAddr, sync::Arc};

use futures::StreamExt;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tracing::{debug, warn};

use crate::{
    decode::{DecodeFailure, FrameDump, decode_frame},
    event::transform,
    forwarder::OutboundSender,
    jserial::{JavaObjectDecoder, ObjectDecoder},
    splitter::{self, FramingError, ObjectStreamCodec},
};

/// Session-fatal failures.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The stream could not be split into frames.
    #[error(transparent)]
    Framing(FramingError),

    /// Reading from the connection failed.
    #[error("inbound read failed: {0}")]
    Io(#[source] io::Error),

    /// The forwarder is gone, so records can no longer be queued.
    #[error("outbound queue closed")]
    QueueClosed,
}

impl From<io::Error> for SessionError {
    fn from(err: io::Error) -> Self {
        match FramingError::from_io(&err) {
            Some(framing) => Self::Framing(framing.clone()),
            None => Self::Io(err),
        }
    }
}

impl From<FramingError> for SessionError {
    fn from(err: FramingError) -> Self { Self::Framing(err) }
}

/// What one session did with its stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Frames produced by the splitter.
    pub frames: u64,
    /// Records pushed onto the outbound queue.
    pub queued: u64,
    /// Frames holding only a stream reset.
    pub reset: u64,
    /// Frames ending mid-object.
    pub truncated: u64,
    /// Frames that failed to decode.
    pub malformed: u64,
}

impl SessionSummary {
    fn record_skip(&mut self, failure: &DecodeFailure) {
        match failure {
            DecodeFailure::BenignReset => self.reset += 1,
            DecodeFailure::Truncated => self.truncated += 1,
            DecodeFailure::Malformed { .. } => self.malformed += 1,
        }
    }
}

/// Shared state every session needs: the decoder, the outbound queue and
/// the frame limit.
#[derive(Clone)]
pub struct SessionContext {
    decoder: Arc<dyn ObjectDecoder>,
    queue: OutboundSender,
    max_frame_length: usize,
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("decoder", &"<decoder>")
            .field("queue_capacity", &self.queue.max_capacity())
            .field("max_frame_length", &self.max_frame_length)
            .finish()
    }
}

impl SessionContext {
    /// Create a context pushing onto `queue` with the built-in decoder.
    #[must_use]
    pub fn new(queue: OutboundSender) -> Self {
        Self {
            decoder: Arc::new(JavaObjectDecoder),
            queue,
            max_frame_length: splitter::MAX_FRAME_LENGTH,
        }
    }

    /// Replace the object decoder.
    #[must_use]
    pub fn with_decoder(mut self, decoder: impl ObjectDecoder + 'static) -> Self {
        self.decoder = Arc::new(decoder);
        self
    }

    /// Limit frame size; the value is clamped to the splitter's bounds.
    #[must_use]
    pub fn max_frame_length(mut self, max_frame_length: usize) -> Self {
        self.max_frame_length = splitter::clamp_frame_length(max_frame_length);
        self
    }

    /// Process `stream` until it ends or fails fatally.
    ///
    /// Decode failures skip the offending frame and never end the session.
    /// The stream is dropped, closing the connection, on every return path.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Framing`] when the prologue is missing or a
    /// frame exceeds the limit, [`SessionError::Io`] on read failure and
    /// [`SessionError::QueueClosed`] once the forwarder has stopped.
    pub async fn run<S>(
        &self,
        stream: S,
        peer_addr: Option<SocketAddr>,
    ) -> Result<SessionSummary, SessionError>
    where
        S: AsyncRead + Unpin,
    {
        let mut frames = FramedRead::new(stream, ObjectStreamCodec::new(self.max_frame_length));
        let mut summary = SessionSummary::default();
        while let Some(frame) = frames.next().await {
            let frame = frame?;
            summary.frames += 1;
            crate::metrics::inc_frames();
            let record = match decode_frame(self.decoder.as_ref(), &frame) {
                Ok(record) => record,
                Err(failure) => {
                    summary.record_skip(&failure);
                    crate::metrics::inc_skipped(failure.label());
                    log_skipped(&failure, &frame, peer_addr);
                    continue;
                }
            };
            let json = match transform(&record).to_json() {
                Ok(json) => json,
                Err(err) => {
                    warn!(?peer_addr, error = %err, "failed to encode event");
                    continue;
                }
            };
            self.queue
                .send(json)
                .await
                .map_err(|_| SessionError::QueueClosed)?;
            summary.queued += 1;
            crate::metrics::inc_queued();
        }
        Ok(summary)
    }
}

fn log_skipped(failure: &DecodeFailure, frame: &[u8], peer_addr: Option<SocketAddr>) {
    match failure {
        DecodeFailure::Malformed { reason } => warn!(
            ?peer_addr,
            %reason,
            len = frame.len(),
            frame = %FrameDump(frame),
            "skipping malformed frame"
        ),
        other => debug!(?peer_addr, reason = other.label(), "skipping frame"),
    }
}

#[cfg(test)]
mod tests;

//! Frame splitting for log4j object streams.
//!
//! A `SocketAppender` writes a single Java serialization stream per
//! connection: the stream prologue, then back-to-back `LoggingEvent` objects,
//! each followed by a stream reset. Nothing on the wire carries a length, so
//! object boundaries are found heuristically. The footer `70 78 79`
//! (`TC_NULL TC_ENDBLOCKDATA TC_RESET`) only ends a frame when it is followed
//! by end-of-stream or by the next object's header prefix `73 72 00 21`.
//!
//! Every emitted frame is prefixed with the stream prologue so it decodes as a
//! standalone stream.
//!
//! # Error Handling
//!
//! Failures that leave the splitter unable to find the next boundary are
//! reported as [`FramingError`] wrapped in an [`io::Error`] of kind
//! [`io::ErrorKind::InvalidData`]. They end the session; see the [`error`]
//! module for details.

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::Decoder;

pub mod error;

pub use error::FramingError;

/// Magic and version bytes opening every Java serialization stream.
pub const STREAM_PROLOGUE: [u8; 4] = [0xAC, 0xED, 0x00, 0x05];

/// Bytes that end a serialized `LoggingEvent` followed by a stream reset.
pub const OBJECT_FOOTER: [u8; 3] = [0x70, 0x78, 0x79];

/// `TC_OBJECT TC_CLASSDESC` followed by the length of
/// `org.apache.log4j.spi.LoggingEvent`.
pub const OBJECT_HEADER_PREFIX: [u8; 4] = [0x73, 0x72, 0x00, 0x21];

/// Minimum frame length in bytes.
///
/// Lengths passed to [`ObjectStreamCodec::new`] are clamped to at least this
/// value.
pub const MIN_FRAME_LENGTH: usize = 64;

/// Maximum frame length in bytes (16 MiB).
///
/// Lengths passed to [`ObjectStreamCodec::new`] are clamped to at most this
/// value to prevent unbounded buffering of a stream that never terminates a
/// frame.
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

pub(crate) fn clamp_frame_length(value: usize) -> usize {
    value.clamp(MIN_FRAME_LENGTH, MAX_FRAME_LENGTH)
}

/// Result of scanning the buffered bytes of the frame being assembled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scan {
    /// No terminator in the buffered bytes; resume scanning at `resume`.
    Seeking { resume: usize },
    /// A footer may start at `at`, but the lookahead bytes have not arrived.
    FooterCandidate { at: usize },
    /// A footer was confirmed; the frame body ends at `end` (exclusive).
    Confirmed { end: usize },
}

/// Scan `buf` from `from` for a confirmed frame terminator.
///
/// A footer is confirmed only once the four bytes after it are known to be
/// the next object's header prefix. With `at_eof` set, missing lookahead is
/// treated as end-of-stream: a footer followed by fewer than four bytes is
/// confirmed, and a trailing `0x70` without its two footer bytes is ordinary
/// payload.
fn scan(buf: &[u8], from: usize, at_eof: bool) -> Scan {
    let mut pos = from;
    while let Some(offset) = buf
        .get(pos..)
        .and_then(|rest| rest.iter().position(|&b| b == OBJECT_FOOTER[0]))
    {
        let at = pos + offset;
        let end = at + OBJECT_FOOTER.len();
        let Some(tail) = buf.get(at + 1..end) else {
            if at_eof {
                break;
            }
            return Scan::FooterCandidate { at };
        };
        if tail == &OBJECT_FOOTER[1..] {
            match buf.get(end..end + OBJECT_HEADER_PREFIX.len()) {
                Some(next) if next == OBJECT_HEADER_PREFIX => return Scan::Confirmed { end },
                Some(_) => {}
                None if at_eof => return Scan::Confirmed { end },
                None => return Scan::FooterCandidate { at },
            }
        }
        pos = at + 1;
    }
    Scan::Seeking { resume: buf.len() }
}

/// Tokio decoder splitting a log4j object stream into prologue-prefixed
/// frames.
///
/// The codec is stateful: it verifies the stream prologue once and remembers
/// how far the current frame has been scanned, so a frame arriving in many
/// small reads is scanned only once.
///
/// # Examples
///
/// ```
/// use bytes::BytesMut;
/// use log4j_relay::splitter::{ObjectStreamCodec, STREAM_PROLOGUE};
/// use tokio_util::codec::Decoder;
///
/// let mut codec = ObjectStreamCodec::default();
/// let mut buf = BytesMut::from(&[0xAC, 0xED, 0x00, 0x05, 0x01, 0x70, 0x78, 0x79][..]);
/// let frame = codec.decode_eof(&mut buf).unwrap().unwrap();
/// assert_eq!(&frame[..4], &STREAM_PROLOGUE);
/// assert_eq!(&frame[4..], &[0x01, 0x70, 0x78, 0x79]);
/// ```
#[derive(Clone, Debug)]
pub struct ObjectStreamCodec {
    max_frame_length: usize,
    prologue_seen: bool,
    cursor: usize,
}

impl ObjectStreamCodec {
    /// Construct a codec rejecting frames longer than `max_frame_length`.
    ///
    /// The limit includes the re-inserted prologue.
    #[must_use]
    pub fn new(max_frame_length: usize) -> Self {
        Self {
            max_frame_length: clamp_frame_length(max_frame_length),
            prologue_seen: false,
            cursor: 0,
        }
    }

    /// Return the maximum frame length accepted by this codec.
    #[must_use]
    pub fn max_frame_length(&self) -> usize { self.max_frame_length }

    /// Consume the stream prologue once it is available.
    ///
    /// Returns `Ok(false)` while fewer than four bytes have arrived and the
    /// bytes seen so far still match.
    fn take_prologue(&mut self, src: &mut BytesMut, at_eof: bool) -> Result<bool, FramingError> {
        if self.prologue_seen {
            return Ok(true);
        }
        let seen = &src[..src.len().min(STREAM_PROLOGUE.len())];
        let cut_short = at_eof && !seen.is_empty() && seen.len() < STREAM_PROLOGUE.len();
        if cut_short || seen != &STREAM_PROLOGUE[..seen.len()] {
            return Err(FramingError::MissingPrologue {
                found: seen.to_vec(),
            });
        }
        if seen.len() < STREAM_PROLOGUE.len() {
            return Ok(false);
        }
        src.advance(STREAM_PROLOGUE.len());
        self.prologue_seen = true;
        Ok(true)
    }

    fn check_length(&self, body_len: usize) -> Result<(), FramingError> {
        let size = body_len + STREAM_PROLOGUE.len();
        if size > self.max_frame_length {
            return Err(FramingError::OversizedFrame {
                size,
                max: self.max_frame_length,
            });
        }
        Ok(())
    }

    fn split_frame(&mut self, src: &mut BytesMut, end: usize) -> Result<Bytes, FramingError> {
        self.check_length(end)?;
        let body = src.split_to(end);
        self.cursor = 0;
        let mut frame = BytesMut::with_capacity(STREAM_PROLOGUE.len() + body.len());
        frame.put_slice(&STREAM_PROLOGUE);
        frame.put_slice(&body);
        Ok(frame.freeze())
    }

    fn next_frame(&mut self, src: &mut BytesMut, at_eof: bool) -> Result<Option<Bytes>, FramingError> {
        if !self.take_prologue(src, at_eof)? {
            return Ok(None);
        }
        match scan(src, self.cursor, at_eof) {
            Scan::Confirmed { end } => self.split_frame(src, end).map(Some),
            Scan::FooterCandidate { at } => {
                self.cursor = at;
                self.check_length(src.len()).map(|()| None)
            }
            Scan::Seeking { resume } => {
                self.cursor = resume;
                self.check_length(src.len()).map(|()| None)
            }
        }
    }
}

impl Default for ObjectStreamCodec {
    fn default() -> Self { Self::new(MAX_FRAME_LENGTH) }
}

impl Decoder for ObjectStreamCodec {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(self.next_frame(src, false)?)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.next_frame(src, true)? {
            return Ok(Some(frame));
        }
        // A closed connection without a single byte is a clean close.
        if src.is_empty() {
            return Ok(None);
        }
        let end = src.len();
        Ok(Some(self.split_frame(src, end)?))
    }
}

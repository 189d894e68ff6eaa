//! Adapter from raw object frames to decoded records.
//!
//! [`decode_frame`] runs one frame through an [`ObjectDecoder`] and sorts
//! failures into the three outcomes a session acts on: a benign reset, a
//! truncated object, or a malformed frame. None of them end the session.

use std::fmt;

use thiserror::Error;

use crate::{
    jserial::{ObjectDecoder, ParseError, Value},
    splitter::error::HexBytes,
};

/// Why a frame produced no record.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecodeFailure {
    /// The frame carried only a stream reset.
    #[error("frame holds only a stream reset")]
    BenignReset,

    /// Input ended in the middle of an object.
    #[error("frame ends mid-object")]
    Truncated,

    /// The frame could not be decoded into a single record.
    #[error("malformed frame: {reason}")]
    Malformed {
        /// Human-readable cause.
        reason: String,
    },
}

impl DecodeFailure {
    /// Short label used in logs and metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::BenignReset => "reset",
            Self::Truncated => "truncated",
            Self::Malformed { .. } => "malformed",
        }
    }
}

impl From<ParseError> for DecodeFailure {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Reset => Self::BenignReset,
            ParseError::UnexpectedEof => Self::Truncated,
            other => Self::Malformed {
                reason: other.to_string(),
            },
        }
    }
}

/// Decode `frame` into exactly one record.
///
/// # Errors
///
/// Returns [`DecodeFailure::Malformed`] when the frame decodes to anything
/// other than a single object, and the mapped [`ParseError`] otherwise.
///
/// # Examples
///
/// ```
/// use log4j_relay::{
///     decode::{DecodeFailure, decode_frame},
///     jserial::JavaObjectDecoder,
/// };
///
/// let reset_only = [0xAC, 0xED, 0x00, 0x05, 0x79];
/// assert_eq!(
///     decode_frame(&JavaObjectDecoder, &reset_only),
///     Err(DecodeFailure::BenignReset)
/// );
/// ```
pub fn decode_frame(decoder: &dyn ObjectDecoder, frame: &[u8]) -> Result<Value, DecodeFailure> {
    let values = decoder.decode(frame)?;
    let count = values.len();
    match <[Value; 1]>::try_from(values) {
        Ok([record @ Value::Object(_)]) => Ok(record),
        Ok([other]) => Err(DecodeFailure::Malformed {
            reason: format!("expected an object, found {}", other.kind()),
        }),
        Err(_) => Err(DecodeFailure::Malformed {
            reason: format!("expected one object, found {count}"),
        }),
    }
}

/// Single-line hex and printable-ASCII rendering of a frame for logs.
///
/// Non-printable bytes appear as `.` in the ASCII column.
///
/// ```
/// use log4j_relay::decode::FrameDump;
///
/// let dump = FrameDump(b"\xac\xed\x00\x05hi").to_string();
/// assert_eq!(dump, "ac ed 00 05 68 69 |....hi|");
/// ```
#[derive(Clone, Copy, Debug)]
pub struct FrameDump<'a>(pub &'a [u8]);

impl fmt::Display for FrameDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.0.is_empty() {
            write!(f, "{} ", HexBytes(self.0))?;
        }
        f.write_str("|")?;
        for &byte in self.0 {
            let shown = if byte.is_ascii_graphic() || byte == b' ' {
                char::from(byte)
            } else {
                '.'
            };
            write!(f, "{shown}")?;
        }
        f.write_str("|")
    }
}

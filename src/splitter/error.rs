//! Error types for the frame splitter.
//!
//! Framing errors are session-fatal: once the splitter cannot trust its
//! position in the stream, no later boundary can be found reliably. Errors
//! reach the session through the [`tokio_util::codec::Decoder`] interface as
//! [`io::Error`] values and are recovered with [`FramingError::from_io`].

use std::{
    fmt::{self, Write as _},
    io,
};

use thiserror::Error;

/// Wire-level errors raised while locating object frame boundaries.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// The connection did not open with the Java serialization prologue.
    #[error("missing stream prologue: expected ac ed 00 05, got {}", HexBytes(.found))]
    MissingPrologue {
        /// The bytes received in place of the prologue.
        found: Vec<u8>,
    },

    /// A frame grew past the configured limit without a confirmed footer.
    #[error("frame exceeds max length: {size} > {max}")]
    OversizedFrame {
        /// Bytes buffered for the frame, including the prologue.
        size: usize,
        /// Maximum allowed frame size.
        max: usize,
    },
}

impl FramingError {
    /// Extract a framing error carried inside an [`io::Error`].
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io;
    ///
    /// use log4j_relay::splitter::FramingError;
    ///
    /// let err: io::Error = FramingError::OversizedFrame { size: 10, max: 5 }.into();
    /// assert!(matches!(
    ///     FramingError::from_io(&err),
    ///     Some(FramingError::OversizedFrame { .. })
    /// ));
    /// assert!(FramingError::from_io(&io::Error::other("reset")).is_none());
    /// ```
    #[must_use]
    pub fn from_io(err: &io::Error) -> Option<&FramingError> {
        err.get_ref().and_then(|inner| inner.downcast_ref())
    }

    /// Returns the error category as a string for logging and metrics.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::MissingPrologue { .. } => "missing_prologue",
            Self::OversizedFrame { .. } => "oversized_frame",
        }
    }
}

impl From<FramingError> for io::Error {
    fn from(err: FramingError) -> Self { io::Error::new(io::ErrorKind::InvalidData, err) }
}

/// Space-separated lowercase hex rendering of a byte slice.
pub(crate) struct HexBytes<'a>(pub &'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, digit) in hex::encode(self.0).chars().enumerate() {
            if i > 0 && i % 2 == 0 {
                f.write_char(' ')?;
            }
            f.write_char(digit)?;
        }
        Ok(())
    }
}

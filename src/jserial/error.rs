//! Errors raised while reading a serialization stream.

use thiserror::Error;

/// Failure to decode a Java serialization stream.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The stream carries reset markers but no object.
    #[error("parsing Reset: stream holds no object")]
    Reset,

    /// Input ended in the middle of a header, object, or block.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// The stream magic did not match `ac ed`.
    #[error("invalid stream magic {0:#06x}")]
    InvalidMagic(u16),

    /// The stream version is not 5.
    #[error("unsupported stream version {0}")]
    UnsupportedVersion(u16),

    /// A type code that cannot start the expected element.
    #[error("unexpected type code {code:#04x} at offset {offset}")]
    UnexpectedTypeCode {
        /// The offending byte.
        code: u8,
        /// Offset of the byte within the stream.
        offset: usize,
    },

    /// A field descriptor carries an unknown type code.
    #[error("unknown field type {0:#04x}")]
    UnknownFieldType(u8),

    /// A back-reference names a handle that was never assigned.
    #[error("invalid handle {0:#x}")]
    InvalidHandle(u32),

    /// A back-reference used as a class descriptor names something else.
    #[error("handle {0:#x} is not a class descriptor")]
    NotAClassDesc(u32),

    /// An array or string declared a length that cannot be valid.
    #[error("invalid length {0}")]
    InvalidLength(i64),

    /// Nesting exceeded the reader's depth limit.
    #[error("objects nested deeper than {0} levels")]
    TooDeep(usize),

    /// Back-references expanded past the decode budget for the stream.
    #[error("decoded values exceed the budget of {0}")]
    TooLarge(usize),

    /// The writer serialized an exception in place of an object.
    #[error("stream carries a serialized exception")]
    Exception,

    /// A valid construct this reader does not handle.
    #[error("unsupported construct: {0}")]
    Unsupported(&'static str),
}

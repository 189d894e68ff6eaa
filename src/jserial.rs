//! Minimal reader for the Java Object Serialization Stream Protocol.
//!
//! The reader turns a serialized object stream into loosely-typed [`Value`]
//! trees: objects become field maps (superclass fields first, subclass fields
//! overriding), arrays become lists or byte strings, and enums and classes
//! become their names. Custom `writeObject` data and externalizable block
//! data are skipped, which is enough for log4j's `LoggingEvent`.
//!
//! Decoding goes through the [`ObjectDecoder`] trait so sessions can be run
//! against a substitute decoder.

mod error;
mod parser;
mod value;

pub use error::ParseError;
pub use value::Value;

/// Decoder turning one serialized stream into its top-level objects.
///
/// Closures with a matching signature implement this trait, which keeps test
/// doubles short.
///
/// # Examples
///
/// ```
/// use log4j_relay::jserial::{ObjectDecoder, ParseError, Value};
///
/// let decoder = |_: &[u8]| -> Result<Vec<Value>, ParseError> { Err(ParseError::Reset) };
/// assert_eq!(decoder.decode(&[]), Err(ParseError::Reset));
/// ```
pub trait ObjectDecoder: Send + Sync {
    /// Decode every top-level object in `stream`.
    ///
    /// `stream` must start with the stream magic and version.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Reset`] when the stream holds nothing but reset
    /// markers, [`ParseError::UnexpectedEof`] when input ends mid-object, and
    /// other variants for malformed input.
    fn decode(&self, stream: &[u8]) -> Result<Vec<Value>, ParseError>;
}

impl<F> ObjectDecoder for F
where
    F: Fn(&[u8]) -> Result<Vec<Value>, ParseError> + Send + Sync,
{
    fn decode(&self, stream: &[u8]) -> Result<Vec<Value>, ParseError> { self(stream) }
}

/// The built-in decoder for Java serialization streams.
#[derive(Clone, Copy, Debug, Default)]
pub struct JavaObjectDecoder;

impl ObjectDecoder for JavaObjectDecoder {
    fn decode(&self, stream: &[u8]) -> Result<Vec<Value>, ParseError> {
        parser::parse_stream(stream)
    }
}

#[cfg(test)]
mod tests;

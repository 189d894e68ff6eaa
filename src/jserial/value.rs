//! Loosely-typed values produced by the stream reader.

use std::collections::BTreeMap;

/// One decoded element of a serialization stream.
///
/// Accessors return `None` on any shape mismatch rather than failing, so
/// callers can probe optional structure safely.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// `null`, or a reference to an object still being read.
    Null,
    /// A `boolean`.
    Bool(bool),
    /// Any integral primitive (`byte`, `short`, `int`, `long`).
    Int(i64),
    /// A `float` or `double`.
    Float(f64),
    /// A `char`.
    Char(char),
    /// A string, enum constant, or class name.
    String(String),
    /// A `byte[]`.
    Bytes(Vec<u8>),
    /// Any other array.
    List(Vec<Value>),
    /// An object's serializable fields keyed by name.
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Look up `field` when this value is an object.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::BTreeMap;
    ///
    /// use log4j_relay::jserial::Value;
    ///
    /// let record = Value::Object(BTreeMap::from([(
    ///     "ndc".to_owned(),
    ///     Value::String("req-7".into()),
    /// )]));
    /// assert_eq!(record.get("ndc").and_then(Value::as_str), Some("req-7"));
    /// assert!(record.get("missing").is_none());
    /// assert!(Value::Null.get("ndc").is_none());
    /// ```
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        match self {
            Value::Object(fields) => fields.get(field),
            _ => None,
        }
    }

    /// Follow a path of field names through nested objects.
    #[must_use]
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(self, |value, field| value.get(field))
    }

    /// Return the string when this value is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Return the integer when this value is integral.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Return the elements when this value is a non-byte array.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Short name of the variant for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }
}

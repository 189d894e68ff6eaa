#![cfg(any(test, feature = "test-helpers"))]
//! Test-only builders for serialized log4j event streams.
//!
//! [`StreamWriter`] emits the subset of the Java serialization grammar that
//! log4j's `SocketAppender` produces, and [`LoggingEventBuilder`] lays out a
//! `LoggingEvent` the way the appender writes it: the object, its
//! `writeObject` level block, then a stream reset.

use bytes::{BufMut, BytesMut};

use crate::splitter::STREAM_PROLOGUE;

const SERIAL_VERSION_UID: i64 = 0x1234_5678_9ABC_DEF0;
const STRING_TYPE: &str = "Ljava/lang/String;";
const LOGGING_EVENT_CLASS: &str = "org.apache.log4j.spi.LoggingEvent";
const LOCATION_INFO_CLASS: &str = "org.apache.log4j.spi.LocationInfo";
const THROWABLE_INFO_CLASS: &str = "org.apache.log4j.spi.ThrowableInformation";

/// `SC_SERIALIZABLE`.
pub const SERIALIZABLE: u8 = 0x02;
/// `SC_SERIALIZABLE | SC_WRITE_METHOD`.
pub const SERIALIZABLE_WITH_WRITE_METHOD: u8 = 0x03;

/// Field declaration used by [`StreamWriter::class_desc`].
#[derive(Clone, Copy, Debug)]
pub struct Field<'a> {
    /// Type code (`b'I'`, `b'J'`, `b'L'`, `b'['`, ...).
    pub code: u8,
    /// Field name.
    pub name: &'a str,
    /// JVM type signature for object fields.
    pub signature: Option<&'a str>,
}

impl<'a> Field<'a> {
    /// A primitive field.
    #[must_use]
    pub const fn primitive(code: u8, name: &'a str) -> Self {
        Self {
            code,
            name,
            signature: None,
        }
    }

    /// An object field with the given JVM signature.
    #[must_use]
    pub const fn object(name: &'a str, signature: &'a str) -> Self {
        let code = if signature.as_bytes()[0] == b'[' { b'[' } else { b'L' };
        Self {
            code,
            name,
            signature: Some(signature),
        }
    }
}

/// Byte-level writer for Java serialization streams.
#[derive(Debug, Default)]
pub struct StreamWriter {
    buf: BytesMut,
}

impl StreamWriter {
    /// Create an empty writer.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Write the stream magic and version.
    pub fn prologue(&mut self) -> &mut Self { self.raw(&STREAM_PROLOGUE) }

    /// Append raw bytes.
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.put_slice(bytes);
        self
    }

    /// Write `TC_NULL`.
    pub fn null(&mut self) -> &mut Self { self.raw(&[0x70]) }

    /// Write `TC_RESET`.
    pub fn reset(&mut self) -> &mut Self { self.raw(&[0x79]) }

    /// Write `TC_REFERENCE` to `handle` (an offset from the first handle).
    pub fn reference(&mut self, handle: u32) -> &mut Self {
        self.buf.put_u8(0x71);
        self.buf.put_u32(0x7E_0000 + handle);
        self
    }

    /// Write a `TC_STRING` object.
    pub fn string(&mut self, value: &str) -> &mut Self {
        self.buf.put_u8(0x74);
        self.utf(value)
    }

    /// Write a length-prefixed UTF string without a type code.
    pub fn utf(&mut self, value: &str) -> &mut Self {
        let len = u16::try_from(value.len()).unwrap_or(u16::MAX);
        self.buf.put_u16(len);
        self.buf.put_slice(&value.as_bytes()[..usize::from(len)]);
        self
    }

    /// Write a big-endian `int`.
    pub fn int(&mut self, value: i32) -> &mut Self {
        self.buf.put_i32(value);
        self
    }

    /// Write a big-endian `long`.
    pub fn long(&mut self, value: i64) -> &mut Self {
        self.buf.put_i64(value);
        self
    }

    /// Write a `TC_CLASSDESC` with no annotation and no superclass.
    pub fn class_desc(&mut self, name: &str, flags: u8, fields: &[Field<'_>]) -> &mut Self {
        self.class_desc_header(name, flags, fields);
        self.raw(&[0x78]).null()
    }

    /// Write a `TC_CLASSDESC` up to its annotation, leaving the superclass
    /// descriptor to the caller.
    pub fn class_desc_header(&mut self, name: &str, flags: u8, fields: &[Field<'_>]) -> &mut Self {
        self.buf.put_u8(0x72);
        self.utf(name).long(SERIAL_VERSION_UID);
        self.buf.put_u8(flags);
        self.buf
            .put_u16(u16::try_from(fields.len()).unwrap_or(u16::MAX));
        for field in fields {
            self.buf.put_u8(field.code);
            self.utf(field.name);
            if let Some(signature) = field.signature {
                self.string(signature);
            }
        }
        self
    }

    /// Write `TC_OBJECT`; the class descriptor and values follow.
    pub fn object(&mut self) -> &mut Self { self.raw(&[0x73]) }

    /// Write a `String[]` array with a fresh class descriptor.
    pub fn string_array(&mut self, items: &[String]) -> &mut Self {
        self.buf.put_u8(0x75);
        self.class_desc("[Ljava.lang.String;", SERIALIZABLE, &[]);
        self.int(i32::try_from(items.len()).unwrap_or(i32::MAX));
        for item in items {
            self.string(item);
        }
        self
    }

    /// Return the bytes written so far.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> { self.buf.to_vec() }
}

/// Builder for one serialized `org.apache.log4j.spi.LoggingEvent`.
#[derive(Clone, Debug)]
pub struct LoggingEventBuilder {
    message: String,
    logger: String,
    thread: String,
    timestamp: i64,
    level: i32,
    ndc: Option<String>,
    location: Option<(String, String)>,
    throwable: Option<Vec<String>>,
}

impl LoggingEventBuilder {
    /// Start an `INFO` event with the given rendered message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            logger: "com.example.App".to_owned(),
            thread: "main".to_owned(),
            timestamp: 1_700_000_000_000,
            level: 20_000,
            ndc: None,
            location: None,
            throwable: None,
        }
    }

    /// Set the logger (category) name.
    #[must_use]
    pub fn logger(mut self, name: impl Into<String>) -> Self {
        self.logger = name.into();
        self
    }

    /// Set the thread name.
    #[must_use]
    pub fn thread(mut self, name: impl Into<String>) -> Self {
        self.thread = name.into();
        self
    }

    /// Set the event timestamp in milliseconds since the epoch.
    #[must_use]
    pub fn timestamp(mut self, millis: i64) -> Self {
        self.timestamp = millis;
        self
    }

    /// Set the nested diagnostic context.
    #[must_use]
    pub fn ndc(mut self, ndc: impl Into<String>) -> Self {
        self.ndc = Some(ndc.into());
        self
    }

    /// Attach location information.
    #[must_use]
    pub fn location(mut self, file: impl Into<String>, method: impl Into<String>) -> Self {
        self.location = Some((file.into(), method.into()));
        self
    }

    /// Attach throwable information as rendered stack trace lines.
    #[must_use]
    pub fn throwable<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.throwable = Some(lines.into_iter().map(Into::into).collect());
        self
    }

    /// Write the event, its level block, and the trailing reset.
    pub fn write_to(&self, w: &mut StreamWriter) {
        w.object().class_desc(
            LOGGING_EVENT_CLASS,
            SERIALIZABLE_WITH_WRITE_METHOD,
            &[
                Field::primitive(b'J', "timeStamp"),
                Field::object("categoryName", STRING_TYPE),
                Field::object("locationInformation", "Lorg/apache/log4j/spi/LocationInfo;"),
                Field::object("ndc", STRING_TYPE),
                Field::object("renderedMessage", STRING_TYPE),
                Field::object("threadName", STRING_TYPE),
                Field::object(
                    "throwableInfo",
                    "Lorg/apache/log4j/spi/ThrowableInformation;",
                ),
            ],
        );
        w.long(self.timestamp).string(&self.logger);
        match &self.location {
            Some((file, method)) => {
                w.object()
                    .class_desc(
                        LOCATION_INFO_CLASS,
                        SERIALIZABLE,
                        &[
                            Field::object("fileName", STRING_TYPE),
                            Field::object("methodName", STRING_TYPE),
                        ],
                    )
                    .string(file)
                    .string(method);
            }
            None => {
                w.null();
            }
        }
        match &self.ndc {
            Some(ndc) => w.string(ndc),
            None => w.null(),
        };
        w.string(&self.message).string(&self.thread);
        match &self.throwable {
            Some(lines) => {
                w.object()
                    .class_desc(
                        THROWABLE_INFO_CLASS,
                        SERIALIZABLE,
                        &[Field::object("throwableStrRep", "[Ljava/lang/String;")],
                    )
                    .string_array(lines);
            }
            None => {
                w.null();
            }
        }
        // writeObject: level as block data, then a null level class.
        w.raw(&[0x77, 0x04]).int(self.level).null().raw(&[0x78]);
        w.reset();
    }

    /// The event as it appears on the wire after the stream prologue.
    #[must_use]
    pub fn to_wire(&self) -> Vec<u8> {
        let mut w = StreamWriter::new();
        self.write_to(&mut w);
        w.into_bytes()
    }

    /// The event as a standalone, prologue-prefixed frame.
    #[must_use]
    pub fn to_frame(&self) -> Vec<u8> {
        let mut w = StreamWriter::new();
        w.prologue();
        self.write_to(&mut w);
        w.into_bytes()
    }
}

/// A full connection's worth of bytes: the prologue followed by `events`.
#[must_use]
pub fn event_stream(events: &[LoggingEventBuilder]) -> Vec<u8> {
    let mut w = StreamWriter::new();
    w.prologue();
    for event in events {
        event.write_to(&mut w);
    }
    w.into_bytes()
}

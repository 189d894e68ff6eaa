//! Tests for the serialization stream reader.

use rstest::rstest;

use super::{JavaObjectDecoder, ObjectDecoder, ParseError, Value};
use crate::test_helpers::{Field, LoggingEventBuilder, SERIALIZABLE, StreamWriter};

fn decode(bytes: &[u8]) -> Result<Vec<Value>, ParseError> { JavaObjectDecoder.decode(bytes) }

fn decode_one(bytes: &[u8]) -> Value {
    let mut values = decode(bytes).expect("stream should decode");
    assert_eq!(values.len(), 1, "expected a single object: {values:?}");
    values.remove(0)
}

fn stream(build: impl FnOnce(&mut StreamWriter)) -> Vec<u8> {
    let mut w = StreamWriter::new();
    w.prologue();
    build(&mut w);
    w.into_bytes()
}

#[test]
fn decodes_logging_event_fields() {
    let frame = LoggingEventBuilder::new("hello")
        .logger("com.acme.Billing")
        .thread("worker-3")
        .timestamp(1_700_000_000_123)
        .ndc("req-42")
        .location("Billing.java", "charge")
        .throwable(["java.lang.IllegalStateException: boom", "\tat com.acme.Billing.charge"])
        .to_frame();

    let event = decode_one(&frame);

    assert_eq!(event.get("renderedMessage").and_then(Value::as_str), Some("hello"));
    assert_eq!(event.get("categoryName").and_then(Value::as_str), Some("com.acme.Billing"));
    assert_eq!(event.get("threadName").and_then(Value::as_str), Some("worker-3"));
    assert_eq!(event.get("timeStamp").and_then(Value::as_i64), Some(1_700_000_000_123));
    assert_eq!(event.get("ndc").and_then(Value::as_str), Some("req-42"));
    assert_eq!(
        event
            .get_path(&["locationInformation", "fileName"])
            .and_then(Value::as_str),
        Some("Billing.java")
    );
    let lines = event
        .get_path(&["throwableInfo", "throwableStrRep"])
        .and_then(Value::as_list)
        .expect("stack trace lines");
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1].as_str(), Some("\tat com.acme.Billing.charge"));
}

#[test]
fn absent_optional_fields_decode_as_null() {
    let event = decode_one(&LoggingEventBuilder::new("plain").to_frame());
    assert_eq!(event.get("ndc"), Some(&Value::Null));
    assert_eq!(event.get("locationInformation"), Some(&Value::Null));
    assert_eq!(event.get("throwableInfo"), Some(&Value::Null));
}

#[test]
fn back_references_resolve_to_earlier_values() {
    // Handles: class 0, field type names 1 and 2, object 3, first value 4.
    let bytes = stream(|w| {
        w.object()
            .class_desc(
                "com.example.Pair",
                SERIALIZABLE,
                &[
                    Field::object("left", "Ljava/lang/String;"),
                    Field::object("right", "Ljava/lang/String;"),
                ],
            )
            .string("shared")
            .reference(4);
    });

    let pair = decode_one(&bytes);
    assert_eq!(pair.get("left"), pair.get("right"));
    assert_eq!(pair.get("right").and_then(Value::as_str), Some("shared"));
}

#[test]
fn superclass_fields_are_merged() {
    let bytes = stream(|w| {
        w.object()
            .class_desc_header("com.example.Child", SERIALIZABLE, &[Field::primitive(b'I', "child")])
            .raw(&[0x78])
            .class_desc("com.example.Parent", SERIALIZABLE, &[Field::primitive(b'I', "parent")])
            .int(1)
            .int(2);
    });

    let object = decode_one(&bytes);
    assert_eq!(object.get("parent").and_then(Value::as_i64), Some(1));
    assert_eq!(object.get("child").and_then(Value::as_i64), Some(2));
}

#[test]
fn arrays_decode_by_element_type() {
    let bytes = stream(|w| {
        w.raw(&[0x75])
            .class_desc("[B", SERIALIZABLE, &[])
            .int(3)
            .raw(&[1, 2, 3]);
        w.raw(&[0x75])
            .class_desc("[I", SERIALIZABLE, &[])
            .int(2)
            .int(-1)
            .int(7);
    });

    let values = decode(&bytes).expect("arrays should decode");
    assert_eq!(
        values,
        vec![
            Value::Bytes(vec![1, 2, 3]),
            Value::List(vec![Value::Int(-1), Value::Int(7)]),
        ]
    );
}

#[test]
fn enum_constants_decode_to_their_names() {
    let bytes = stream(|w| {
        w.raw(&[0x7E])
            .class_desc("com.example.Level", 0x12, &[])
            .string("WARN");
    });
    assert_eq!(decode_one(&bytes), Value::String("WARN".into()));
}

#[rstest]
#[case::null_char(&[0xC0, 0x80], "\0")]
#[case::surrogate_pair(&[0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80], "\u{1F600}")]
#[case::plain(b"caf\xC3\xA9", "caf\u{e9}")]
fn strings_use_modified_utf8(#[case] encoded: &[u8], #[case] expected: &str) {
    let bytes = stream(|w| {
        w.raw(&[0x74, 0x00, u8::try_from(encoded.len()).expect("short string")])
            .raw(encoded);
    });
    assert_eq!(decode_one(&bytes), Value::String(expected.to_owned()));
}

#[test]
fn reset_only_stream_reports_reset() {
    let bytes = stream(|w| {
        w.reset().reset();
    });
    assert_eq!(decode(&bytes), Err(ParseError::Reset));
}

#[test]
fn prologue_only_stream_is_truncated() {
    assert_eq!(decode(&stream(|_| {})), Err(ParseError::UnexpectedEof));
}

#[rstest]
#[case::missing_level_block(9)]
#[case::mid_message(20)]
#[case::mid_logger(40)]
#[case::mid_field_descriptor(90)]
fn truncated_event_reports_unexpected_eof(#[case] cut_from_end: usize) {
    let frame = LoggingEventBuilder::new("truncated").to_frame();
    let cut = frame.len() - cut_from_end;
    assert_eq!(decode(&frame[..cut]), Err(ParseError::UnexpectedEof));
}

#[rstest]
#[case::bad_magic(&[0xCA, 0xFE, 0x00, 0x05], ParseError::InvalidMagic(0xCAFE))]
#[case::bad_version(&[0xAC, 0xED, 0x00, 0x04], ParseError::UnsupportedVersion(4))]
#[case::short_header(&[0xAC, 0xED, 0x00], ParseError::UnexpectedEof)]
#[case::stray_end_block(&[0xAC, 0xED, 0x00, 0x05, 0x78], ParseError::UnexpectedTypeCode { code: 0x78, offset: 4 })]
#[case::dangling_reference(
    &[0xAC, 0xED, 0x00, 0x05, 0x71, 0x00, 0x7E, 0x00, 0x09],
    ParseError::InvalidHandle(0x7E_0009)
)]
#[case::exception(&[0xAC, 0xED, 0x00, 0x05, 0x7B], ParseError::Exception)]
fn malformed_streams_are_rejected(#[case] bytes: &[u8], #[case] expected: ParseError) {
    assert_eq!(decode(bytes), Err(expected));
}

#[test]
fn deeply_nested_arrays_hit_the_depth_limit() {
    let bytes = stream(|w| {
        w.raw(&[0x75])
            .class_desc("[Ljava.lang.Object;", SERIALIZABLE, &[])
            .int(1);
        for _ in 0..100 {
            w.raw(&[0x75]).reference(0).int(1);
        }
        w.null();
    });
    assert_eq!(decode(&bytes), Err(ParseError::TooDeep(64)));
}

/// `Object[100]` of `Object[100]` of one shared `int[100]`: a short stream
/// whose back-references would expand to a million values.
#[test]
fn nested_back_references_exceed_the_decode_budget() {
    let bytes = stream(|w| {
        // handle 0: Object[] class, handle 1: outer array
        w.raw(&[0x75])
            .class_desc("[Ljava.lang.Object;", SERIALIZABLE, &[])
            .int(100);
        // handle 2: middle array
        w.raw(&[0x75]).reference(0).int(100);
        // handle 3: int[] class, handle 4: the shared int array
        w.raw(&[0x75]).class_desc("[I", SERIALIZABLE, &[]).int(100);
        for n in 0..100 {
            w.int(n);
        }
        for _ in 1..100 {
            w.reference(4);
        }
        for _ in 1..100 {
            w.reference(2);
        }
    });
    assert!(bytes.len() < 2048, "stream is {} bytes", bytes.len());
    assert!(matches!(decode(&bytes), Err(ParseError::TooLarge(_))));
}

#[test]
fn repeated_references_within_budget_still_decode() {
    let bytes = stream(|w| {
        w.raw(&[0x75])
            .class_desc("[Ljava.lang.Object;", SERIALIZABLE, &[])
            .int(4)
            .string("shared");
        for _ in 1..4 {
            w.reference(2);
        }
    });
    let items = decode_one(&bytes);
    let items = items.as_list().expect("array decodes to a list");
    assert_eq!(items.len(), 4);
    assert!(items.iter().all(|item| item.as_str() == Some("shared")));
}

#[test]
fn reset_between_objects_clears_handles() {
    let bytes = stream(|w| {
        w.string("first").reset().reference(0);
    });
    assert_eq!(decode(&bytes), Err(ParseError::InvalidHandle(0x7E_0000)));
}

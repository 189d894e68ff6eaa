//! Canonical event records and the transform that produces them.
//!
//! [`transform`] is total: a record missing any source field yields the
//! field's empty default instead of an error.

use serde::{Deserialize, Serialize};

use crate::jserial::Value;

/// Fixed-shape event forwarded downstream as one JSON line.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    /// Rendered log message.
    pub message: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Logger name.
    pub path: String,
    /// Logger name.
    pub logger_name: String,
    /// Thread that emitted the event.
    pub thread: String,
    /// Logger name.
    pub class: String,
    /// Source file from location information.
    pub file: String,
    /// Method from location information.
    pub method: String,
    /// Nested diagnostic context.
    pub ndc: String,
    /// Stack trace lines joined with `\n`.
    pub stack_trace: String,
}

impl CanonicalEvent {
    /// Encode the event as a single-line JSON object.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error; the event's plain string and integer
    /// fields make this unreachable in practice.
    pub fn to_json(&self) -> serde_json::Result<String> { serde_json::to_string(self) }
}

/// Map a decoded `LoggingEvent` record onto a [`CanonicalEvent`].
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
///
/// use log4j_relay::{event::transform, jserial::Value};
///
/// let record = Value::Object(BTreeMap::from([
///     ("renderedMessage".to_owned(), Value::String("hello".into())),
///     ("categoryName".to_owned(), Value::String("com.example.App".into())),
/// ]));
/// let event = transform(&record);
/// assert_eq!(event.message, "hello");
/// assert_eq!(event.logger_name, "com.example.App");
/// assert!(event.stack_trace.is_empty());
/// ```
#[must_use]
pub fn transform(record: &Value) -> CanonicalEvent {
    let logger = string_field(record, &["loggerName"])
        .or_else(|| string_field(record, &["categoryName"]))
        .unwrap_or_default();
    let (file, method) = location(record);
    CanonicalEvent {
        message: string_field(record, &["renderedMessage"]).unwrap_or_default(),
        timestamp: timestamp(record),
        path: logger.clone(),
        logger_name: logger.clone(),
        thread: string_field(record, &["threadName"]).unwrap_or_default(),
        class: logger,
        file,
        method,
        ndc: string_field(record, &["ndc"]).unwrap_or_default(),
        stack_trace: stack_trace(record),
    }
}

fn string_field(record: &Value, path: &[&str]) -> Option<String> {
    record
        .get_path(path)
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn timestamp(record: &Value) -> i64 {
    match record.get("timeStamp") {
        Some(Value::Int(millis)) => *millis,
        Some(boxed @ Value::Object(_)) => boxed.get("value").and_then(Value::as_i64).unwrap_or(0),
        _ => 0,
    }
}

fn location(record: &Value) -> (String, String) {
    let Some(info) = ["locationInformation", "locationInfo"]
        .iter()
        .filter_map(|name| record.get(name))
        .find(|value| matches!(value, Value::Object(_)))
    else {
        return (String::new(), String::new());
    };
    let file = string_field(info, &["fileName"]);
    let method = string_field(info, &["methodName"]);
    if file.is_some() || method.is_some() {
        return (file.unwrap_or_default(), method.unwrap_or_default());
    }
    info.get("fullInfo")
        .and_then(Value::as_str)
        .and_then(parse_full_info)
        .unwrap_or_default()
}

/// Split `pkg.Class.method(File.java:42)` into file and method.
fn parse_full_info(full: &str) -> Option<(String, String)> {
    let (qualified, rest) = full.split_once('(')?;
    let method = qualified.rsplit('.').next().unwrap_or(qualified);
    let inner = rest.strip_suffix(')').unwrap_or(rest);
    let file = inner.split_once(':').map_or(inner, |(file, _line)| file);
    Some((file.to_owned(), method.to_owned()))
}

fn stack_trace(record: &Value) -> String {
    let Some(info @ Value::Object(_)) = record.get("throwableInfo") else {
        return String::new();
    };
    let lines = info
        .get("throwableStrRep")
        .or_else(|| info.get("rep"))
        .or_else(|| record.get("throwableStrRep"))
        .and_then(Value::as_list)
        .unwrap_or_default();
    lines
        .iter()
        .filter_map(Value::as_str)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rstest::rstest;

    use super::*;
    use crate::{decode::decode_frame, jserial::JavaObjectDecoder, test_helpers::LoggingEventBuilder};

    fn object<const N: usize>(fields: [(&str, Value); N]) -> Value {
        Value::Object(
            fields
                .into_iter()
                .map(|(name, value)| (name.to_owned(), value))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    fn string(s: &str) -> Value { Value::String(s.to_owned()) }

    #[test]
    fn transforms_full_logging_event() {
        let frame = LoggingEventBuilder::new("charge failed")
            .logger("com.acme.Billing")
            .thread("worker-1")
            .timestamp(1_700_000_000_500)
            .ndc("req-9")
            .location("Billing.java", "charge")
            .throwable(["java.lang.RuntimeException: boom", "\tat com.acme.Billing.charge"])
            .to_frame();
        let record = decode_frame(&JavaObjectDecoder, &frame).expect("record");

        assert_eq!(
            transform(&record),
            CanonicalEvent {
                message: "charge failed".into(),
                timestamp: 1_700_000_000_500,
                path: "com.acme.Billing".into(),
                logger_name: "com.acme.Billing".into(),
                thread: "worker-1".into(),
                class: "com.acme.Billing".into(),
                file: "Billing.java".into(),
                method: "charge".into(),
                ndc: "req-9".into(),
                stack_trace: "java.lang.RuntimeException: boom\n\tat com.acme.Billing.charge".into(),
            }
        );
    }

    #[test]
    fn missing_optional_sections_leave_fields_empty() {
        let frame = LoggingEventBuilder::new("plain").to_frame();
        let record = decode_frame(&JavaObjectDecoder, &frame).expect("record");
        let event = transform(&record);
        assert_eq!(event.message, "plain");
        assert!(event.file.is_empty());
        assert!(event.method.is_empty());
        assert!(event.stack_trace.is_empty());
        assert!(event.ndc.is_empty());
    }

    #[rstest]
    #[case::not_an_object(Value::Null)]
    #[case::empty_object(object([]))]
    #[case::wrong_shapes(object([
        ("renderedMessage", Value::Int(3)),
        ("timeStamp", string("soon")),
        ("locationInformation", string("here")),
        ("throwableInfo", Value::List(vec![])),
    ]))]
    fn anomalous_records_yield_defaults(#[case] record: Value) {
        assert_eq!(transform(&record), CanonicalEvent::default());
    }

    #[test]
    fn logger_name_prefers_logger_name_field() {
        let record = object([
            ("loggerName", string("a.B")),
            ("categoryName", string("c.D")),
        ]);
        assert_eq!(transform(&record).path, "a.B");
    }

    #[test]
    fn location_falls_back_to_full_info() {
        let record = object([(
            "locationInfo",
            object([("fullInfo", string("com.acme.Billing.charge(Billing.java:42)"))]),
        )]);
        let event = transform(&record);
        assert_eq!(event.file, "Billing.java");
        assert_eq!(event.method, "charge");
    }

    #[rstest]
    #[case::nested_rep(object([(
        "throwableInfo",
        object([("rep", Value::List(vec![string("a"), string("b")]))]),
    )]))]
    #[case::top_level(object([
        ("throwableInfo", object([])),
        ("throwableStrRep", Value::List(vec![string("a"), string("b")])),
    ]))]
    fn stack_trace_aliases_are_honoured(#[case] record: Value) {
        assert_eq!(transform(&record).stack_trace, "a\nb");
    }

    #[test]
    fn top_level_rep_ignored_without_throwable_info() {
        let record = object([("throwableStrRep", Value::List(vec![string("a")]))]);
        assert!(transform(&record).stack_trace.is_empty());
    }

    #[test]
    fn boxed_timestamp_is_unwrapped() {
        let record = object([("timeStamp", object([("value", Value::Int(42))]))]);
        assert_eq!(transform(&record).timestamp, 42);
    }

    #[test]
    fn json_uses_snake_case_field_names() {
        let event = CanonicalEvent {
            message: "hello".into(),
            ..CanonicalEvent::default()
        };
        let json = event.to_json().expect("encode");
        assert!(json.contains("\"message\":\"hello\""));
        assert!(json.contains("\"stack_trace\":\"\""));
        assert!(!json.contains('\n'));
        let back: CanonicalEvent = serde_json::from_str(&json).expect("decode");
        assert_eq!(back, event);
    }
}

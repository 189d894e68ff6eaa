//! Metric helpers for the relay.
//!
//! This module defines metric names and thin helpers wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! the helpers compile to nothing.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking open inbound sessions.
pub const SESSIONS_ACTIVE: &str = "log4j_relay_sessions_active";
/// Name of the counter tracking frames split from inbound streams.
pub const FRAMES_SPLIT: &str = "log4j_relay_frames_split_total";
/// Name of the counter tracking events placed on the outbound queue.
pub const EVENTS_QUEUED: &str = "log4j_relay_events_queued_total";
/// Name of the counter tracking frames skipped, labelled by `reason`.
pub const FRAMES_SKIPPED: &str = "log4j_relay_frames_skipped_total";
/// Name of the counter tracking records written downstream.
pub const RECORDS_FORWARDED: &str = "log4j_relay_records_forwarded_total";
/// Name of the counter tracking records dropped after write retries.
pub const RECORDS_DROPPED: &str = "log4j_relay_records_dropped_total";
/// Name of the counter tracking panics in session tasks.
pub const SESSION_PANICS: &str = "log4j_relay_session_panics_total";

/// Increment the active sessions gauge.
pub fn inc_sessions() {
    #[cfg(feature = "metrics")]
    gauge!(SESSIONS_ACTIVE).increment(1.0);
}

/// Decrement the active sessions gauge.
pub fn dec_sessions() {
    #[cfg(feature = "metrics")]
    gauge!(SESSIONS_ACTIVE).decrement(1.0);
}

/// Record a frame produced by the splitter.
pub fn inc_frames() {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_SPLIT).increment(1);
}

/// Record an event pushed onto the outbound queue.
pub fn inc_queued() {
    #[cfg(feature = "metrics")]
    counter!(EVENTS_QUEUED).increment(1);
}

/// Record a skipped frame.
#[cfg_attr(not(feature = "metrics"), expect(unused_variables, reason = "label only feeds metrics"))]
pub fn inc_skipped(reason: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_SKIPPED, "reason" => reason).increment(1);
}

/// Record a record written downstream.
pub fn inc_forwarded() {
    #[cfg(feature = "metrics")]
    counter!(RECORDS_FORWARDED).increment(1);
}

/// Record a record dropped after exhausting write attempts.
pub fn inc_dropped() {
    #[cfg(feature = "metrics")]
    counter!(RECORDS_DROPPED).increment(1);
}

/// Record a panic caught in a session task.
pub fn inc_session_panics() {
    #[cfg(feature = "metrics")]
    counter!(SESSION_PANICS).increment(1);
}

/// Keeps the active sessions gauge balanced across every exit path.
#[derive(Debug)]
#[must_use]
pub(crate) struct SessionGauge(());

impl SessionGauge {
    pub(crate) fn open() -> Self {
        inc_sessions();
        Self(())
    }
}

impl Drop for SessionGauge {
    fn drop(&mut self) { dec_sessions(); }
}

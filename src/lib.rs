//! Collector for log4j `SocketAppender` streams.
//!
//! Each inbound connection carries a Java object-serialization stream. The
//! [`splitter`] cuts it into one frame per logging event, [`decode`] turns a
//! frame into a [`jserial::Value`], [`event`] maps that onto a flat JSON
//! record, and [`session`] pushes the record onto a bounded queue shared by
//! every connection. A single [`forwarder::Forwarder`] drains that queue to
//! the downstream sink as newline-delimited JSON.

pub mod config;
pub mod decode;
pub mod error;
pub mod event;
pub mod forwarder;
pub mod jserial;
pub mod metrics;
pub mod relay;
pub mod server;
pub mod session;
pub mod splitter;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use error::RelayError;
pub use event::CanonicalEvent;
pub use relay::Relay;

//! Test helpers shared across server modules.

use std::net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener};

use rstest::fixture;

use super::{Bound, CollectorServer};
use crate::{
    forwarder::{OutboundReceiver, outbound_queue},
    session::SessionContext,
};

/// A context whose queue has no receiver.
///
/// Enough for tests that never deliver an event; a session that does will
/// end with `QueueClosed`.
#[must_use]
pub fn context() -> SessionContext { queued_context().0 }

/// A context together with the receiving end of its queue.
#[must_use]
pub fn queued_context() -> (SessionContext, OutboundReceiver) {
    let (tx, rx) = outbound_queue(16);
    (SessionContext::new(tx), rx)
}

/// Returns a bound listener on a free localhost port.
///
/// Holding the listener keeps the port reserved until the test hands it
/// over.
#[fixture]
pub fn free_listener() -> StdTcpListener {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr).expect("Failed to bind free port listener")
}

/// Extract the bound address from a listener.
#[must_use]
pub fn listener_addr(listener: &StdTcpListener) -> SocketAddr {
    listener
        .local_addr()
        .expect("failed to get listener address")
}

pub fn bind_server(context: SessionContext, listener: StdTcpListener) -> CollectorServer<Bound> {
    CollectorServer::new(context)
        .bind_existing_listener(listener)
        .expect("Failed to bind")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_is_on_localhost() {
        let listener = free_listener();
        assert_eq!(
            listener_addr(&listener).ip(),
            std::net::IpAddr::from(Ipv4Addr::LOCALHOST)
        );
    }

    #[tokio::test]
    async fn bound_server_reports_listener_address() {
        let listener = free_listener();
        let addr = listener_addr(&listener);
        let server = bind_server(context(), listener);
        assert_eq!(server.local_addr(), Some(addr));
    }
}

//! Per-connection session tasks.

use std::{any::Any, fmt, net::SocketAddr, panic::AssertUnwindSafe};

use futures::FutureExt;
use log::error;
use tokio::net::TcpStream;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::{metrics::SessionGauge, session::SessionContext};

/// Spawn a session for `stream` on `tracker`.
///
/// A panic inside the session is caught and logged; it never reaches the
/// accept loop or other sessions.
pub(super) fn spawn_connection_task(
    stream: TcpStream,
    peer_addr: Option<SocketAddr>,
    context: SessionContext,
    tracker: &TaskTracker,
) {
    tracker.spawn(async move {
        let session = AssertUnwindSafe(serve(stream, peer_addr, context)).catch_unwind();
        if let Err(panic) = session.await {
            crate::metrics::inc_session_panics();
            let panic_msg = PanicPayload(panic.as_ref());
            // Emit via both `log` and `tracing` for tests that capture either.
            error!("connection task panicked: panic={panic_msg}, peer_addr={peer_addr:?}");
            tracing::error!(panic = %panic_msg, ?peer_addr, "connection task panicked");
        }
    });
}

async fn serve(stream: TcpStream, peer_addr: Option<SocketAddr>, context: SessionContext) {
    let _gauge = SessionGauge::open();
    match context.run(stream, peer_addr).await {
        Ok(summary) => info!(
            ?peer_addr,
            frames = summary.frames,
            queued = summary.queued,
            reset = summary.reset,
            truncated = summary.truncated,
            malformed = summary.malformed,
            "session closed"
        ),
        Err(err) => warn!(?peer_addr, error = %err, "session ended with error"),
    }
}

/// Displays a panic payload, falling back to `Debug` for non-string payloads.
struct PanicPayload<'a>(&'a (dyn Any + Send));

impl fmt::Display for PanicPayload<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.0.downcast_ref::<String>() {
            f.write_str(s)
        } else if let Some(s) = self.0.downcast_ref::<&'static str>() {
            f.write_str(s)
        } else {
            write!(f, "{:?}", self.0)
        }
    }
}

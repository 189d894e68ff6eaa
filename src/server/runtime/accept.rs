//! The accept loop.

use std::{io, net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use log::warn;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    time::{Duration, sleep},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::backoff::BackoffConfig;
use crate::{server::connection::spawn_connection_task, session::SessionContext};

/// Source of inbound connections.
///
/// Dropping a pending `accept()` future must not leak the connection.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub(in crate::server) trait AcceptListener: Send + Sync {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl AcceptListener for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> { TcpListener::local_addr(self) }
}

#[derive(Debug)]
pub(in crate::server) struct AcceptLoopOptions {
    pub shutdown: CancellationToken,
    pub tracker: TaskTracker,
    pub backoff: BackoffConfig,
}

/// Accept connections from `listener` until `options.shutdown` fires.
///
/// Each accepted stream gets its own session task, tracked by
/// `options.tracker` and handed a clone of `context`. A failed accept is
/// logged, then retried after the current back-off delay.
pub(in crate::server) async fn accept_loop<L>(
    listener: Arc<L>,
    context: SessionContext,
    options: AcceptLoopOptions,
) where
    L: AcceptListener + 'static,
{
    let AcceptLoopOptions {
        shutdown,
        tracker,
        backoff,
    } = options;
    let backoff = backoff.normalized();
    let mut delay = backoff.initial_delay;
    loop {
        let Some(outcome) = next_connection(listener.as_ref(), &shutdown).await else {
            break;
        };
        match outcome {
            Ok((stream, peer)) => {
                spawn_connection_task(stream, Some(peer), context.clone(), &tracker);
                delay = backoff.initial_delay;
            }
            Err(e) => {
                let local_addr = listener.local_addr().ok();
                warn!("accept error: error={e:?}, local_addr={local_addr:?}");
                if wait_or_cancel(&shutdown, delay).await {
                    break;
                }
                delay = backoff.next_delay(delay);
            }
        }
    }
}

#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
async fn next_connection<L: AcceptListener + ?Sized>(
    listener: &L,
    shutdown: &CancellationToken,
) -> Option<io::Result<(TcpStream, SocketAddr)>> {
    select! {
        biased;

        () = shutdown.cancelled() => None,
        res = listener.accept() => Some(res),
    }
}

/// Sleep for `delay`; returns `true` if shutdown fired first.
#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
async fn wait_or_cancel(shutdown: &CancellationToken, delay: Duration) -> bool {
    select! {
        biased;

        () = shutdown.cancelled() => true,
        () = sleep(delay) => false,
    }
}

//! HTTP serving with a bounded graceful drain.
//!
//! [`serve`] stops accepting connections once the shutdown signal fires and
//! gives in-flight requests `drain_timeout` to finish. Connections still
//! open after that are abandoned to runtime shutdown.

use std::io;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::time;

use crate::domain::ShutdownListener;

/// How the server stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    /// Every connection closed on its own.
    Complete,
    /// The drain timed out with connections still open.
    Aborted,
}

/// Serves `app` on `listener` until `shutdown` fires, then drains for at
/// most `drain_timeout`.
///
/// # Errors
///
/// Returns the server's I/O error, or an error if the server task panicked.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    mut shutdown: ShutdownListener,
    drain_timeout: Duration,
) -> io::Result<Drain> {
    let mut stop = shutdown.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { stop.triggered().await })
            .await
    });

    tokio::select! {
        joined = &mut server => {
            joined.map_err(io::Error::other)??;
            return Ok(Drain::Complete);
        }
        () = shutdown.triggered() => {}
    }

    tracing::info!(timeout = ?drain_timeout, "draining http connections");
    match time::timeout(drain_timeout, &mut server).await {
        Ok(joined) => {
            joined.map_err(io::Error::other)??;
            Ok(Drain::Complete)
        }
        Err(_) => {
            tracing::warn!(timeout = ?drain_timeout, "http drain timed out, abandoning open connections");
            server.abort();
            Ok(Drain::Aborted)
        }
    }
}

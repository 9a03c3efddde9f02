//! Process-wide shutdown signal.
//!
//! [`Shutdown`] wraps a [`tokio::sync::watch`] channel holding a single
//! "stop requested" flag. The process entry point triggers it on a signal
//! and shares clones with the scheduler; the HTTP server and every
//! background loop hold a [`ShutdownListener`].

use tokio::sync::watch;

/// Sending half of the shutdown signal.
#[derive(Debug, Clone)]
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

impl Shutdown {
    /// Creates a signal in the "running" state.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// Requests shutdown. Idempotent.
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    /// Returns `true` once [`Shutdown::trigger`] has been called.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    /// Creates a listener observing this signal.
    #[must_use]
    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half of the shutdown signal, one per task.
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Completes once shutdown is requested.
    ///
    /// Also completes if every [`Shutdown`] handle has been dropped, since
    /// nobody is left to keep the task alive.
    pub async fn triggered(&mut self) {
        // wait_for errors only when the sender is gone
        let _ = self.receiver.wait_for(|stop| *stop).await;
    }
}

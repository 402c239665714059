//! Open/closed gate used to pause operations while a link is re-established

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::MessagingError;

/// A reusable open/closed signal with cooperative async waiting.
///
/// The gate starts open. [`suspend`](SuspendGate::suspend) closes it and
/// [`resume`](SuspendGate::resume) reopens it; both are idempotent and report
/// whether the state actually changed. [`wait`](SuspendGate::wait) parks the
/// caller until the gate is open, and a single `resume` releases every
/// current waiter at once, in no particular order.
#[derive(Debug)]
pub struct SuspendGate {
    state: watch::Sender<bool>,
}

impl SuspendGate {
    /// Create a gate in the open state
    pub fn new() -> Self {
        let (state, _) = watch::channel(true);
        Self { state }
    }

    /// Close the gate. Returns `true` if the gate was open.
    pub fn suspend(&self) -> bool {
        self.state.send_if_modified(|open| {
            if *open {
                *open = false;
                true
            } else {
                false
            }
        })
    }

    /// Open the gate, releasing all waiters. Returns `true` if the gate was
    /// closed.
    pub fn resume(&self) -> bool {
        self.state.send_if_modified(|open| {
            if *open {
                false
            } else {
                *open = true;
                true
            }
        })
    }

    /// Check whether the gate is currently closed without blocking
    pub fn is_suspended(&self) -> bool {
        !*self.state.borrow()
    }

    /// Wait until the gate is open or the token is cancelled.
    ///
    /// Returns immediately when the gate is already open. Cancellation always
    /// surfaces as [`MessagingError::Cancelled`], never as a resume.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), MessagingError> {
        let mut rx = self.state.subscribe();
        tokio::select! {
            changed = rx.wait_for(|open| *open) => {
                // The sender lives on `self`, so the channel cannot close
                // while this borrow is alive.
                let _ = changed;
                Ok(())
            }
            _ = cancel.cancelled() => Err(MessagingError::Cancelled),
        }
    }
}

impl Default for SuspendGate {
    fn default() -> Self {
        Self::new()
    }
}

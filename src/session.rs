//! Session establishment over a transport connection
//!
//! Opening a session is a handshake: the client sends a begin request and
//! the broker either confirms the open or closes the pending session with an
//! error. [`SessionBuilder`] turns the two observer callbacks into a
//! one-shot settlement that resolves, rejects, or is cancelled - exactly
//! once, first transition wins.

use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::MessagingError;

/// Default incoming and outgoing flow-control window, in frames
pub const DEFAULT_WINDOW_SIZE: u32 = 2048;

/// Default maximum number of concurrently attached links per session
pub const DEFAULT_MAX_LINKS_PER_SESSION: u32 = 63;

const DEFAULT_NEXT_OUTGOING_ID: u32 = u32::MAX - 2;

/// Parameters sent with a session-open request
#[derive(Debug, Clone)]
pub struct BeginOptions {
    /// Incoming flow-control window size
    pub incoming_window: u32,
    /// Outgoing flow-control window size
    pub outgoing_window: u32,
    /// Highest link handle the session will allocate
    pub handle_max: u32,
    /// Initial outgoing transfer id
    pub next_outgoing_id: u32,
}

impl Default for BeginOptions {
    fn default() -> Self {
        Self {
            incoming_window: DEFAULT_WINDOW_SIZE,
            outgoing_window: DEFAULT_WINDOW_SIZE,
            handle_max: DEFAULT_MAX_LINKS_PER_SESSION,
            next_outgoing_id: DEFAULT_NEXT_OUTGOING_ID,
        }
    }
}

/// Error condition reported by the broker when it refuses or tears down a
/// session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCondition {
    /// Protocol error condition, e.g. `amqp:internal-error`
    pub condition: String,
    /// Human-readable description supplied by the broker
    pub description: String,
}

/// Handle to a close observer registration on a [`PendingSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverId(pub u64);

/// Observer callback invoked once when the remote peer confirms the open
pub type OpenObserver = Box<dyn FnOnce() + Send>;

/// Observer callback invoked when the session closes; the condition is
/// present when the close carries an error
pub type CloseObserver = Box<dyn Fn(Option<&ErrorCondition>) + Send + Sync>;

/// A protocol-level session whose lifecycle events can be observed.
///
/// Implemented by the protocol engine. Observers must be invoked outside of
/// any lock the engine needs for [`remove_closed_observer`], and may be
/// invoked from any task.
pub trait PendingSession: Send + Sync {
    /// Register the observer for the remote open confirmation
    fn on_remote_open(&self, observer: OpenObserver);

    /// Register an observer for session close
    fn on_closed(&self, observer: CloseObserver) -> ObserverId;

    /// Deregister a close observer installed by
    /// [`on_closed`](PendingSession::on_closed)
    fn remove_closed_observer(&self, id: ObserverId);
}

/// Transport-level connection handle able to open sessions
pub trait TransportConnection: Send + Sync {
    /// The session type this connection produces
    type Session: PendingSession;

    /// Send a session-open request and return the pending session
    fn begin_session(&self, options: BeginOptions) -> Self::Session;
}

/// Drives the session-open handshake against a transport connection.
pub struct SessionBuilder<'a, C: TransportConnection> {
    connection: &'a C,
    options: BeginOptions,
}

impl<'a, C: TransportConnection> SessionBuilder<'a, C> {
    /// Create a builder with default begin options
    pub fn new(connection: &'a C) -> Self {
        Self {
            connection,
            options: BeginOptions::default(),
        }
    }

    /// Override the begin options
    pub fn with_options(mut self, options: BeginOptions) -> Self {
        self.options = options;
        self
    }

    /// Open a session and wait for the broker's verdict.
    ///
    /// Resolves to the opened session on the remote open confirmation,
    /// fails with [`MessagingError::SessionCreation`] when the broker closes
    /// the pending session with an error, and with
    /// [`MessagingError::Cancelled`] when the token fires first. A close
    /// notification racing a cancellation is absorbed; observers never
    /// panic.
    pub async fn establish(self, cancel: &CancellationToken) -> Result<C::Session, MessagingError> {
        if cancel.is_cancelled() {
            return Err(MessagingError::Cancelled);
        }

        let (settle, settled) = Settlement::new();
        let session = self.connection.begin_session(self.options);

        {
            let settle = settle.clone();
            session.on_remote_open(Box::new(move || settle.resolve()));
        }
        let close_observer = {
            let settle = settle.clone();
            session.on_closed(Box::new(move |error| {
                if let Some(error) = error {
                    settle.reject(MessagingError::SessionCreation {
                        condition: error.condition.clone(),
                        description: error.description.clone(),
                    });
                }
            }))
        };

        tokio::select! {
            outcome = settled.wait() => {
                outcome?;
                // The handshake is settled; a stale close event must not
                // inform it anymore.
                session.remove_closed_observer(close_observer);
                Ok(session)
            }
            _ = cancel.cancelled() => Err(MessagingError::Cancelled),
        }
    }
}

/// Single-assignment settlement for the open handshake. Clones share one
/// underlying slot; the first resolve or reject wins and every later
/// settlement attempt is a no-op.
#[derive(Clone)]
struct Settlement {
    slot: Arc<Mutex<Option<oneshot::Sender<Result<(), MessagingError>>>>>,
}

impl Settlement {
    fn new() -> (Self, Settled) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                slot: Arc::new(Mutex::new(Some(tx))),
            },
            Settled { rx },
        )
    }

    fn resolve(&self) {
        self.settle(Ok(()));
    }

    fn reject(&self, error: MessagingError) {
        self.settle(Err(error));
    }

    fn settle(&self, outcome: Result<(), MessagingError>) {
        let sender = match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(sender) = sender {
            // The receiver may already be gone when the handshake was
            // cancelled; a late settlement is dropped on the floor.
            let _ = sender.send(outcome);
        }
    }
}

struct Settled {
    rx: oneshot::Receiver<Result<(), MessagingError>>,
}

impl Settled {
    async fn wait(self) -> Result<(), MessagingError> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(MessagingError::Connection(
                "session endpoint dropped before the open settled".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_default_begin_options() {
        let options = BeginOptions::default();
        assert_eq!(options.incoming_window, 2048);
        assert_eq!(options.outgoing_window, 2048);
        assert_eq!(options.handle_max, 63);
        assert_eq!(options.next_outgoing_id, u32::MAX - 2);
    }

    #[tokio::test]
    async fn test_settlement_resolves_once() {
        let (settle, settled) = Settlement::new();
        let mut wait = task::spawn(settled.wait());
        assert_pending!(wait.poll());

        settle.resolve();
        // A late rejection is a no-op
        settle.reject(MessagingError::Other("too late".into()));

        assert_ready!(wait.poll()).unwrap();
    }

    #[tokio::test]
    async fn test_settlement_rejects_once() {
        let (settle, settled) = Settlement::new();

        settle.reject(MessagingError::SessionCreation {
            condition: "amqp:internal-error".into(),
            description: "boom".into(),
        });
        settle.resolve();

        let err = settled.wait().await.unwrap_err();
        assert!(matches!(err, MessagingError::SessionCreation { .. }));
    }

    #[test]
    fn test_settlement_after_receiver_dropped_is_absorbed() {
        let (settle, settled) = Settlement::new();
        drop(settled);
        settle.resolve();
        settle.reject(MessagingError::Other("ignored".into()));
    }
}

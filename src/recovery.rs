//! Shared suspend/recover/terminate behavior for producers and consumers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::MessagingError;
use crate::gate::SuspendGate;
use crate::link::LinkFactory;

/// Contract shared by every endpoint the owning connection keeps alive
/// across reconnect cycles.
///
/// The connection is expected to react to a transport failure by calling
/// [`suspend`](Recoverable::suspend) on every registered endpoint,
/// reconnecting, then calling [`recover`](Recoverable::recover) followed by
/// [`resume`](Recoverable::resume) on each - or
/// [`terminate`](Recoverable::terminate) when the outage is unrecoverable.
#[async_trait]
pub trait Recoverable: Send + Sync {
    /// Replace the underlying link with a freshly created one.
    ///
    /// The previous link, if any, is disposed best-effort first. Suspension
    /// is not lifted here; the caller follows a successful recover with
    /// [`resume`](Recoverable::resume) once the new link is ready to use.
    async fn recover(
        &self,
        connection: &dyn LinkFactory,
        cancel: &CancellationToken,
    ) -> Result<(), MessagingError>;

    /// Pause operations until [`resume`](Recoverable::resume) is called
    fn suspend(&self);

    /// Lift a suspension, releasing every blocked operation
    fn resume(&self);

    /// Check whether operations are currently paused
    fn is_suspended(&self) -> bool;

    /// Permanently fail the endpoint.
    ///
    /// The first cause wins; later calls are no-ops. Blocked and future
    /// operations fail with a terminal error wrapping the cause. The current
    /// link is disposed best-effort.
    async fn terminate(&self, cause: MessagingError);

    /// Dispose the underlying link and emit the closed signal
    async fn dispose(&self);

    /// Subscribe to the recovery-requested signal.
    ///
    /// Fires each time a closed link is newly detected while the endpoint is
    /// not terminated. Subscribe before handing the endpoint out; emissions
    /// with no subscriber are dropped.
    fn recovery_requested(&self) -> broadcast::Receiver<()>;

    /// Subscribe to the closed signal, which fires once on disposal
    fn closed(&self) -> broadcast::Receiver<()>;
}

/// Which kind of endpoint a [`RecoveryState`] belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EndpointKind {
    Producer,
    Consumer,
}

impl EndpointKind {
    fn as_str(self) -> &'static str {
        match self {
            EndpointKind::Producer => "producer",
            EndpointKind::Consumer => "consumer",
        }
    }

    fn closed_error(self, cause: Arc<MessagingError>) -> MessagingError {
        match self {
            EndpointKind::Producer => MessagingError::ProducerClosed(cause),
            EndpointKind::Consumer => MessagingError::ConsumerClosed(cause),
        }
    }
}

/// Suspension gate, write-once failure cause and outward signals, embedded
/// in both wrapper kinds.
#[derive(Debug)]
pub(crate) struct RecoveryState {
    kind: EndpointKind,
    address: String,
    gate: SuspendGate,
    failure: OnceLock<Arc<MessagingError>>,
    closed_tx: broadcast::Sender<()>,
    recovery_tx: broadcast::Sender<()>,
    closed_emitted: AtomicBool,
}

impl RecoveryState {
    pub(crate) fn new(kind: EndpointKind, address: impl Into<String>) -> Self {
        let (closed_tx, _) = broadcast::channel(16);
        let (recovery_tx, _) = broadcast::channel(16);
        Self {
            kind,
            address: address.into(),
            gate: SuspendGate::new(),
            failure: OnceLock::new(),
            closed_tx,
            recovery_tx,
            closed_emitted: AtomicBool::new(false),
        }
    }

    /// Fail fast when a terminate cause has been recorded
    pub(crate) fn check_closed(&self) -> Result<(), MessagingError> {
        match self.failure.get() {
            Some(cause) => Err(self.kind.closed_error(Arc::clone(cause))),
            None => Ok(()),
        }
    }

    pub(crate) fn suspend(&self) {
        if self.gate.suspend() {
            debug!(
                address = %self.address,
                "{} suspended", self.kind.as_str()
            );
        }
    }

    pub(crate) fn resume(&self) {
        if self.gate.resume() {
            debug!(
                address = %self.address,
                "{} resumed", self.kind.as_str()
            );
        }
    }

    pub(crate) fn is_suspended(&self) -> bool {
        self.gate.is_suspended()
    }

    pub(crate) async fn wait(&self, cancel: &CancellationToken) -> Result<(), MessagingError> {
        self.gate.wait(cancel).await
    }

    /// Internal path for a newly detected closed link: pause operations and
    /// ask the owning connection for a reconnect cycle.
    pub(crate) fn handle_link_closed(&self) {
        self.suspend();
        if self.failure.get().is_none() {
            let _ = self.recovery_tx.send(());
        }
    }

    /// Record the terminal failure cause and release blocked waiters into
    /// the fail-fast check. First write wins.
    pub(crate) fn terminate(&self, cause: MessagingError) {
        let cause = Arc::new(cause);
        if self.failure.set(Arc::clone(&cause)).is_err() {
            return;
        }
        warn!(
            address = %self.address,
            error = %cause,
            "{} terminated", self.kind.as_str()
        );
        // Cause is recorded before the gate opens; released waiters observe
        // it and fail instead of retrying.
        self.gate.resume();
    }

    /// Emit the closed signal, at most once
    pub(crate) fn emit_closed(&self) {
        if !self.closed_emitted.swap(true, Ordering::SeqCst) {
            let _ = self.closed_tx.send(());
        }
    }

    pub(crate) fn recovery_requested(&self) -> broadcast::Receiver<()> {
        self.recovery_tx.subscribe()
    }

    pub(crate) fn closed(&self) -> broadcast::Receiver<()> {
        self.closed_tx.subscribe()
    }
}

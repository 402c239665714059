//! Auto-recovering producer

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ProducerConfig;
use crate::error::MessagingError;
use crate::link::{LinkFactory, ProducerLink};
use crate::message::Message;
use crate::recovery::{EndpointKind, Recoverable, RecoveryState};
use crate::transaction::TransactionContext;

/// A producer that survives reconnects of the underlying connection.
///
/// The owning connection creates it empty, installs a link through
/// [`recover`](Recoverable::recover), and from then on drives the
/// suspend/recover/resume cycle whenever the transport fails. Callers just
/// call [`send`](RecoveringProducer::send); a send that runs into a closed
/// link blocks until the link is reestablished or the producer is
/// terminated.
pub struct RecoveringProducer {
    config: ProducerConfig,
    state: RecoveryState,
    link: RwLock<Option<Arc<dyn ProducerLink>>>,
}

impl RecoveringProducer {
    /// Create a producer with no link installed yet
    pub fn new(config: ProducerConfig) -> Self {
        let state = RecoveryState::new(EndpointKind::Producer, config.address.clone());
        Self {
            config,
            state,
            link: RwLock::new(None),
        }
    }

    /// The configuration this producer replays on every recovery
    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    /// Send a message, retrying transparently across link recoveries.
    ///
    /// Fails fast with [`MessagingError::ProducerClosed`] once the producer
    /// is terminated, and with [`MessagingError::Cancelled`] when the token
    /// fires while blocked. Any error other than the closed-link condition
    /// propagates unchanged. There is no retry limit and no backoff at this
    /// layer; pacing belongs to the owning connection's reconnect loop.
    pub async fn send(
        &self,
        message: Message,
        transaction: Option<&TransactionContext>,
        cancel: &CancellationToken,
    ) -> Result<(), MessagingError> {
        loop {
            self.state.check_closed()?;

            let outcome = match self.current_link().await {
                Some(link) => link.send(message.clone(), transaction, cancel).await,
                None => Err(MessagingError::LinkClosed("no producer link".into())),
            };

            match outcome {
                Ok(()) => return Ok(()),
                Err(err) if err.is_link_closed() => {
                    self.state.check_closed()?;
                    self.state.handle_link_closed();
                    self.state.wait(cancel).await?;
                    debug!(
                        address = %self.config.address,
                        "Retrying send after producer link reestablished"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn current_link(&self) -> Option<Arc<dyn ProducerLink>> {
        self.link.read().await.clone()
    }

    async fn dispose_link(&self) {
        let link = self.link.write().await.take();
        if let Some(link) = link {
            if let Err(err) = link.dispose().await {
                warn!(
                    address = %self.config.address,
                    error = %err,
                    "Error disposing producer link"
                );
            }
        }
    }
}

#[async_trait]
impl Recoverable for RecoveringProducer {
    async fn recover(
        &self,
        connection: &dyn LinkFactory,
        cancel: &CancellationToken,
    ) -> Result<(), MessagingError> {
        self.dispose_link().await;
        let fresh = connection.create_producer(&self.config, cancel).await?;
        *self.link.write().await = Some(Arc::from(fresh));
        debug!(address = %self.config.address, "Producer recovered");
        Ok(())
    }

    fn suspend(&self) {
        self.state.suspend();
    }

    fn resume(&self) {
        self.state.resume();
    }

    fn is_suspended(&self) -> bool {
        self.state.is_suspended()
    }

    async fn terminate(&self, cause: MessagingError) {
        self.state.terminate(cause);
        self.dispose_link().await;
    }

    async fn dispose(&self) {
        self.dispose_link().await;
        self.state.emit_closed();
    }

    fn recovery_requested(&self) -> broadcast::Receiver<()> {
        self.state.recovery_requested()
    }

    fn closed(&self) -> broadcast::Receiver<()> {
        self.state.closed()
    }
}

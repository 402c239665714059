//! Auto-recovering consumer

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ConsumerConfig;
use crate::error::MessagingError;
use crate::link::{ConsumerLink, LinkFactory};
use crate::message::Message;
use crate::recovery::{EndpointKind, Recoverable, RecoveryState};
use crate::transaction::TransactionContext;

/// A consumer that survives reconnects of the underlying connection.
///
/// Like [`RecoveringProducer`](crate::producer::RecoveringProducer), it is
/// created empty and driven by the owning connection through the
/// suspend/recover/resume cycle. [`receive`](RecoveringConsumer::receive)
/// blocks transparently through an outage; acknowledgements do not.
pub struct RecoveringConsumer {
    config: ConsumerConfig,
    state: RecoveryState,
    link: RwLock<Option<Arc<dyn ConsumerLink>>>,
}

impl RecoveringConsumer {
    /// Create a consumer with no link installed yet
    pub fn new(config: ConsumerConfig) -> Self {
        let state = RecoveryState::new(EndpointKind::Consumer, config.address.clone());
        Self {
            config,
            state,
            link: RwLock::new(None),
        }
    }

    /// The configuration this consumer replays on every recovery
    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Receive the next message, retrying transparently across link
    /// recoveries.
    ///
    /// Fails fast with [`MessagingError::ConsumerClosed`] once the consumer
    /// is terminated, and with [`MessagingError::Cancelled`] when the token
    /// fires while blocked. Any error other than the closed-link condition
    /// propagates unchanged.
    pub async fn receive(&self, cancel: &CancellationToken) -> Result<Message, MessagingError> {
        loop {
            self.state.check_closed()?;

            let outcome = match self.current_link().await {
                Some(link) => link.receive(cancel).await,
                None => Err(MessagingError::LinkClosed("no consumer link".into())),
            };

            match outcome {
                Ok(message) => return Ok(message),
                Err(err) if err.is_link_closed() => {
                    self.state.check_closed()?;
                    self.state.handle_link_closed();
                    self.state.wait(cancel).await?;
                    debug!(
                        address = %self.config.address,
                        "Retrying receive after consumer link reestablished"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Acknowledge a received message.
    ///
    /// Deliberately not retried across recovery: an acknowledgement is bound
    /// to the delivery instance on the link that produced it, and that
    /// instance does not survive link replacement. A failure racing a
    /// recovery surfaces to the caller as-is.
    pub async fn accept(
        &self,
        message: &Message,
        transaction: Option<&TransactionContext>,
    ) -> Result<(), MessagingError> {
        match self.current_link().await {
            Some(link) => link.accept(message, transaction).await,
            None => Err(MessagingError::LinkClosed("no consumer link".into())),
        }
    }

    /// Reject a received message. Same no-retry policy as
    /// [`accept`](RecoveringConsumer::accept).
    pub async fn reject(
        &self,
        message: &Message,
        undeliverable_here: bool,
    ) -> Result<(), MessagingError> {
        match self.current_link().await {
            Some(link) => link.reject(message, undeliverable_here).await,
            None => Err(MessagingError::LinkClosed("no consumer link".into())),
        }
    }

    async fn current_link(&self) -> Option<Arc<dyn ConsumerLink>> {
        self.link.read().await.clone()
    }

    async fn dispose_link(&self) {
        let link = self.link.write().await.take();
        if let Some(link) = link {
            if let Err(err) = link.dispose().await {
                warn!(
                    address = %self.config.address,
                    error = %err,
                    "Error disposing consumer link"
                );
            }
        }
    }
}

#[async_trait]
impl Recoverable for RecoveringConsumer {
    async fn recover(
        &self,
        connection: &dyn LinkFactory,
        cancel: &CancellationToken,
    ) -> Result<(), MessagingError> {
        self.dispose_link().await;
        let fresh = connection.create_consumer(&self.config, cancel).await?;
        *self.link.write().await = Some(Arc::from(fresh));
        debug!(address = %self.config.address, "Consumer recovered");
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProducerConfig;
    use crate::link::ProducerLink;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::watch;

    /// Consumer link fed from a queue; `dispose` fails any pending or later
    /// receive with the closed-link condition, the way a real link does.
    struct StubLink {
        deliveries: StdMutex<VecDeque<Message>>,
        open: watch::Sender<bool>,
        accepts: AtomicUsize,
        rejects: AtomicUsize,
    }

    impl StubLink {
        fn with_deliveries(deliveries: Vec<Message>) -> Arc<Self> {
            let (open, _) = watch::channel(true);
            Arc::new(Self {
                deliveries: StdMutex::new(deliveries.into()),
                open,
                accepts: AtomicUsize::new(0),
                rejects: AtomicUsize::new(0),
            })
        }

        fn empty() -> Arc<Self> {
            Self::with_deliveries(Vec::new())
        }

        fn close(&self) {
            // send_replace updates the value even when no receiver is currently
            // subscribed; a plain send() would be a silent no-op in that case.
            self.open.send_replace(false);
        }
    }

    struct LinkHandle(Arc<StubLink>);

    #[async_trait]
    impl ConsumerLink for LinkHandle {
        async fn receive(&self, cancel: &CancellationToken) -> Result<Message, MessagingError> {
            if !*self.0.open.borrow() {
                return Err(MessagingError::LinkClosed("detached".into()));
            }
            if let Some(message) = self.0.deliveries.lock().unwrap().pop_front() {
                return Ok(message);
            }
            // Nothing buffered: park until the link is closed or the caller
            // gives up.
            let mut open = self.0.open.subscribe();
            tokio::select! {
                _ = open.wait_for(|open| !open) => {
                    Err(MessagingError::LinkClosed("detached".into()))
                }
                _ = cancel.cancelled() => Err(MessagingError::Cancelled),
            }
        }

        async fn accept(
            &self,
            _message: &Message,
            _transaction: Option<&TransactionContext>,
        ) -> Result<(), MessagingError> {
            if !*self.0.open.borrow() {
                return Err(MessagingError::LinkClosed("detached".into()));
            }
            self.0.accepts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn reject(
            &self,
            _message: &Message,
            _undeliverable_here: bool,
        ) -> Result<(), MessagingError> {
            self.0.rejects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn dispose(&self) -> Result<(), MessagingError> {
            self.0.close();
            Ok(())
        }
    }

    struct StubConnection {
        links: StdMutex<Vec<Arc<StubLink>>>,
    }

    impl StubConnection {
        fn with_links(links: Vec<Arc<StubLink>>) -> Self {
            Self {
                links: StdMutex::new(links),
            }
        }
    }

    #[async_trait]
    impl LinkFactory for StubConnection {
        async fn create_producer(
            &self,
            _config: &ProducerConfig,
            _cancel: &CancellationToken,
        ) -> Result<Box<dyn ProducerLink>, MessagingError> {
            Err(MessagingError::Other("not a producer factory".into()))
        }

        async fn create_consumer(
            &self,
            _config: &ConsumerConfig,
            _cancel: &CancellationToken,
        ) -> Result<Box<dyn ConsumerLink>, MessagingError> {
            let link = self
                .links
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| MessagingError::Connection("no links left".into()))?;
            Ok(Box::new(LinkHandle(link)))
        }
    }

    #[tokio::test]
    async fn test_receive_on_healthy_link() {
        let link = StubLink::with_deliveries(vec![Message::text("first")]);
        let consumer = RecoveringConsumer::new(ConsumerConfig::new("orders"));
        let connection = StubConnection::with_links(vec![link]);
        let cancel = CancellationToken::new();

        consumer.recover(&connection, &cancel).await.unwrap();
        let message = consumer.receive(&cancel).await.unwrap();
        assert_eq!(message.body_str().unwrap(), "first");
    }

    #[tokio::test]
    async fn test_terminate_releases_blocked_receive() {
        let link = StubLink::empty();
        let consumer = Arc::new(RecoveringConsumer::new(ConsumerConfig::new("orders")));
        let connection = StubConnection::with_links(vec![link]);
        let cancel = CancellationToken::new();

        consumer.recover(&connection, &cancel).await.unwrap();

        let blocked = {
            let consumer = Arc::clone(&consumer);
            let cancel = cancel.clone();
            tokio::spawn(async move { consumer.receive(&cancel).await })
        };
        tokio::task::yield_now().await;

        consumer
            .terminate(MessagingError::Connection("reconnect failed".into()))
            .await;

        let err = blocked.await.unwrap().unwrap_err();
        match err {
            MessagingError::ConsumerClosed(cause) => {
                assert!(cause.to_string().contains("reconnect failed"));
            }
            other => panic!("expected terminal error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_receive_retries_across_recovery() {
        let detached = StubLink::empty();
        detached.close();
        let fresh = StubLink::with_deliveries(vec![Message::text("after outage")]);
        let consumer = Arc::new(RecoveringConsumer::new(ConsumerConfig::new("orders")));
        let connection = StubConnection::with_links(vec![fresh, detached]);
        let cancel = CancellationToken::new();
        let mut requests = consumer.recovery_requested();

        consumer.recover(&connection, &cancel).await.unwrap();

        let blocked = {
            let consumer = Arc::clone(&consumer);
            let cancel = cancel.clone();
            tokio::spawn(async move { consumer.receive(&cancel).await })
        };

        requests.recv().await.unwrap();
        consumer.recover(&connection, &cancel).await.unwrap();
        consumer.resume();

        let message = blocked.await.unwrap().unwrap();
        assert_eq!(message.body_str().unwrap(), "after outage");
    }

    #[tokio::test]
    async fn test_accept_does_not_retry_on_closed_link() {
        let link = StubLink::with_deliveries(vec![Message::text("first")]);
        let consumer = RecoveringConsumer::new(ConsumerConfig::new("orders"));
        let connection = StubConnection::with_links(vec![link.clone()]);
        let cancel = CancellationToken::new();

        consumer.recover(&connection, &cancel).await.unwrap();
        let message = consumer.receive(&cancel).await.unwrap();

        link.close();
        let err = consumer.accept(&message, None).await.unwrap_err();
        assert!(err.is_link_closed());
        assert_eq!(link.accepts.load(Ordering::SeqCst), 0);
        // The failed acknowledgement does not suspend the consumer
        assert!(!consumer.is_suspended());
    }

    #[tokio::test]
    async fn test_accept_and_reject_delegate() {
        let link = StubLink::with_deliveries(vec![Message::text("a"), Message::text("b")]);
        let consumer = RecoveringConsumer::new(ConsumerConfig::new("orders"));
        let connection = StubConnection::with_links(vec![link.clone()]);
        let cancel = CancellationToken::new();

        consumer.recover(&connection, &cancel).await.unwrap();
        let first = consumer.receive(&cancel).await.unwrap();
        let second = consumer.receive(&cancel).await.unwrap();

        consumer.accept(&first, None).await.unwrap();
        consumer.reject(&second, false).await.unwrap();
        assert_eq!(link.accepts.load(Ordering::SeqCst), 1);
        assert_eq!(link.rejects.load(Ordering::SeqCst), 1);
    }
}

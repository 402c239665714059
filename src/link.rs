//! Interfaces to the protocol engine
//!
//! The recovering wrappers own no wire-level state of their own. They drive
//! live links obtained from the connection, and ask the connection for fresh
//! ones while recovering from a reconnect.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::{ConsumerConfig, ProducerConfig};
use crate::error::MessagingError;
use crate::message::Message;
use crate::transaction::TransactionContext;

/// A live protocol-level sender link.
///
/// Implementations surface a remote or local close of the link as
/// [`MessagingError::LinkClosed`]; the recovering wrappers rely on that
/// condition being distinguishable from every other failure.
#[async_trait]
pub trait ProducerLink: Send + Sync {
    /// Send a message over this link
    async fn send(
        &self,
        message: Message,
        transaction: Option<&TransactionContext>,
        cancel: &CancellationToken,
    ) -> Result<(), MessagingError>;

    /// Release the link and its broker-side resources
    async fn dispose(&self) -> Result<(), MessagingError>;
}

/// A live protocol-level receiver link.
///
/// The same closed-link convention as [`ProducerLink`] applies; a pending
/// `receive` on a link that gets disposed is expected to fail with
/// [`MessagingError::LinkClosed`] rather than hang.
#[async_trait]
pub trait ConsumerLink: Send + Sync {
    /// Receive the next message from this link
    async fn receive(&self, cancel: &CancellationToken) -> Result<Message, MessagingError>;

    /// Acknowledge a delivery received from this link
    async fn accept(
        &self,
        message: &Message,
        transaction: Option<&TransactionContext>,
    ) -> Result<(), MessagingError>;

    /// Reject a delivery received from this link
    async fn reject(
        &self,
        message: &Message,
        undeliverable_here: bool,
    ) -> Result<(), MessagingError>;

    /// Release the link and its broker-side resources
    async fn dispose(&self) -> Result<(), MessagingError>;
}

/// Connection-scoped factory for links.
///
/// Implemented by the owning connection and handed to
/// [`Recoverable::recover`](crate::recovery::Recoverable::recover) after a
/// successful reconnect, so each wrapper can recreate its link from the
/// configuration it was originally created with.
#[async_trait]
pub trait LinkFactory: Send + Sync {
    /// Create a fresh producer link for the given configuration
    async fn create_producer(
        &self,
        config: &ProducerConfig,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn ProducerLink>, MessagingError>;

    /// Create a fresh consumer link for the given configuration
    async fn create_consumer(
        &self,
        config: &ConsumerConfig,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn ConsumerLink>, MessagingError>;
}

//! Error types for resilient messaging operations

use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur during messaging operations
#[derive(Error, Debug)]
pub enum MessagingError {
    /// The underlying link was closed, remotely or locally. This is the
    /// transient condition the recovering wrappers absorb and retry; it only
    /// surfaces to callers through operations that do not retry.
    #[error("link closed: {0}")]
    LinkClosed(String),

    /// The producer was closed due to an unrecoverable error
    #[error("producer was closed due to an unrecoverable error")]
    ProducerClosed(#[source] Arc<MessagingError>),

    /// The consumer was closed due to an unrecoverable error
    #[error("consumer was closed due to an unrecoverable error")]
    ConsumerClosed(#[source] Arc<MessagingError>),

    /// The operation was cancelled by the caller
    #[error("operation cancelled")]
    Cancelled,

    /// The broker refused or tore down a session during establishment
    #[error("session creation failed: {condition}: {description}")]
    SessionCreation {
        /// Protocol-supplied error condition
        condition: String,
        /// Protocol-supplied error description
        description: String,
    },

    /// Failed to connect to the broker
    #[error("connection failed: {0}")]
    Connection(String),

    /// The broker refused or failed a send
    #[error("send failed: {0}")]
    Send(String),

    /// Failed to acknowledge a message
    #[error("acknowledge failed: {0}")]
    Acknowledge(String),

    /// Failed to serialize a message payload
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Failed to deserialize a message payload
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// IO error from the transport
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl MessagingError {
    /// Check if this error is the transient closed-link condition.
    ///
    /// Only this condition makes `send`/`receive` suspend and retry; every
    /// other error propagates to the caller unchanged.
    pub fn is_link_closed(&self) -> bool {
        matches!(self, MessagingError::LinkClosed(_))
    }

    /// Check if this error means the resource was permanently terminated
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MessagingError::ProducerClosed(_) | MessagingError::ConsumerClosed(_)
        )
    }

    /// Check if this error is a caller-initiated cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, MessagingError::Cancelled)
    }
}

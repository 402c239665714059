//! # Armature AMQP
//!
//! Resilient AMQP messaging client layer: auto-recovering producers and
//! consumers with transparent session recovery.
//!
//! The crate sits between caller code and a protocol engine. Producers and
//! consumers obtained from an owning connection keep working across
//! transport failures: when the underlying link reports that it was closed,
//! the wrapper suspends itself, asks the connection for a reconnect cycle,
//! and blocked `send`/`receive` calls retry transparently once the link has
//! been recreated. A connection that gives up instead terminates the
//! wrapper, failing blocked and future calls with the terminal cause.
//!
//! ## Recovery cycle
//!
//! ```rust,ignore
//! use armature_amqp::{LinkFactory, Recoverable, RecoveringProducer, ProducerConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! // Creation: the owning connection installs the first link.
//! let producer = RecoveringProducer::new(ProducerConfig::new("orders"));
//! let mut recovery = producer.recovery_requested();
//! producer.recover(&connection, &cancel).await?;
//! producer.resume();
//!
//! // On transport failure, the connection drives the cycle:
//! recovery.recv().await?;
//! producer.suspend();
//! // ... reconnect the transport ...
//! producer.recover(&connection, &cancel).await?;
//! producer.resume(); // blocked sends retry on the fresh link
//! ```
//!
//! ## Cancellation
//!
//! Every blocking operation takes a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) and returns
//! [`MessagingError::Cancelled`] promptly when it fires, never a fabricated
//! success or closed-resource error.

pub mod config;
pub mod consumer;
pub mod error;
pub mod gate;
pub mod link;
pub mod message;
pub mod producer;
pub mod recovery;
pub mod session;
pub mod transaction;

pub use config::{ConsumerConfig, ProducerConfig, RoutingType};
pub use consumer::RecoveringConsumer;
pub use error::MessagingError;
pub use gate::SuspendGate;
pub use link::{ConsumerLink, LinkFactory, ProducerLink};
pub use message::Message;
pub use producer::RecoveringProducer;
pub use recovery::Recoverable;
pub use session::{
    BeginOptions, CloseObserver, DEFAULT_MAX_LINKS_PER_SESSION, DEFAULT_WINDOW_SIZE,
    ErrorCondition, ObserverId, OpenObserver, PendingSession, SessionBuilder, TransportConnection,
};
pub use transaction::TransactionContext;

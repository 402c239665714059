//! Transaction context passed through to the protocol engine

use uuid::Uuid;

/// Identifies the transaction a send or acknowledgement takes part in.
///
/// Coordinator enrolment, commit and rollback are driven by the protocol
/// engine; this layer only threads the context through to the underlying
/// link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionContext {
    id: Uuid,
}

impl TransactionContext {
    /// Create a new transaction context
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    /// The transaction identity
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Default for TransactionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contexts_are_distinct() {
        assert_ne!(TransactionContext::new().id(), TransactionContext::new().id());
    }
}

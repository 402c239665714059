//! Configuration for producer and consumer links
//!
//! Each recovering wrapper keeps the configuration it was created with and
//! replays it against the connection whenever its underlying link is
//! recreated after a reconnect.

use serde::{Deserialize, Serialize};

/// Routing semantics of a broker address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoutingType {
    /// Each message is delivered to at most one consumer of the address
    #[default]
    Anycast,
    /// Each message is delivered to every consumer of the address
    Multicast,
}

/// Configuration for a producer link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    /// Address messages are sent to
    pub address: String,
    /// Routing semantics requested when attaching to the address
    #[serde(default)]
    pub routing_type: RoutingType,
    /// Default priority applied to messages that do not set one
    pub message_priority: Option<u8>,
    /// Whether messages are sent durable unless they say otherwise
    #[serde(default)]
    pub durable: bool,
}

impl ProducerConfig {
    /// Create a producer configuration for the given address
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            routing_type: RoutingType::default(),
            message_priority: None,
            durable: false,
        }
    }

    /// Set the routing type
    pub fn with_routing_type(mut self, routing_type: RoutingType) -> Self {
        self.routing_type = routing_type;
        self
    }

    /// Set the default message priority
    pub fn with_message_priority(mut self, priority: u8) -> Self {
        self.message_priority = Some(priority);
        self
    }

    /// Send messages durable by default
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }
}

fn default_credit() -> u32 {
    200
}

/// Configuration for a consumer link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Address messages are consumed from
    pub address: String,
    /// Specific queue on the address, when not using the default
    pub queue: Option<String>,
    /// Routing semantics requested when attaching to the address
    #[serde(default)]
    pub routing_type: RoutingType,
    /// Link credit - how many messages the broker may send ahead of
    /// acknowledgements
    #[serde(default = "default_credit")]
    pub credit: u32,
    /// Broker-side filter expression
    pub filter_expression: Option<String>,
}

impl ConsumerConfig {
    /// Create a consumer configuration for the given address
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            queue: None,
            routing_type: RoutingType::default(),
            credit: default_credit(),
            filter_expression: None,
        }
    }

    /// Consume from a specific queue on the address
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// Set the routing type
    pub fn with_routing_type(mut self, routing_type: RoutingType) -> Self {
        self.routing_type = routing_type;
        self
    }

    /// Set the link credit
    pub fn with_credit(mut self, credit: u32) -> Self {
        self.credit = credit;
        self
    }

    /// Set a broker-side filter expression
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter_expression = Some(filter.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_producer_config_defaults() {
        let config = ProducerConfig::new("orders");
        assert_eq!(config.address, "orders");
        assert_eq!(config.routing_type, RoutingType::Anycast);
        assert_eq!(config.message_priority, None);
        assert!(!config.durable);
    }

    #[test]
    fn test_producer_config_builder() {
        let config = ProducerConfig::new("orders")
            .with_routing_type(RoutingType::Multicast)
            .with_message_priority(4)
            .durable();

        assert_eq!(config.routing_type, RoutingType::Multicast);
        assert_eq!(config.message_priority, Some(4));
        assert!(config.durable);
    }

    #[test]
    fn test_consumer_config_defaults() {
        let config = ConsumerConfig::new("orders");
        assert_eq!(config.routing_type, RoutingType::Anycast);
        assert_eq!(config.credit, 200);
        assert_eq!(config.queue, None);
        assert_eq!(config.filter_expression, None);
    }

    #[test]
    fn test_consumer_config_builder() {
        let config = ConsumerConfig::new("orders")
            .with_queue("orders.eu")
            .with_credit(50)
            .with_filter("region = 'eu'");

        assert_eq!(config.queue, Some("orders.eu".to_string()));
        assert_eq!(config.credit, 50);
        assert_eq!(config.filter_expression, Some("region = 'eu'".to_string()));
    }
}

//! Message model shared by producers and consumers

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MessagingError;

/// A message sent to or received from the broker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier
    pub id: String,
    /// Message body as bytes
    pub body: Vec<u8>,
    /// Application-defined properties
    pub application_properties: HashMap<String, String>,
    /// Timestamp when the message was created
    pub creation_time: DateTime<Utc>,
    /// Optional correlation ID for request-response patterns
    pub correlation_id: Option<String>,
    /// Optional reply-to address
    pub reply_to: Option<String>,
    /// Message content type (e.g., "application/json")
    pub content_type: Option<String>,
    /// Message priority (0-9, where 9 is highest)
    pub priority: Option<u8>,
    /// Time-to-live in milliseconds
    pub ttl: Option<u64>,
    /// Whether the message survives a broker restart
    pub durable: bool,
}

impl Message {
    /// Create a new message with the given body
    pub fn new<T: Into<Vec<u8>>>(body: T) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            body: body.into(),
            application_properties: HashMap::new(),
            creation_time: Utc::now(),
            correlation_id: None,
            reply_to: None,
            content_type: None,
            priority: None,
            ttl: None,
            durable: false,
        }
    }

    /// Create a message from a UTF-8 text body
    pub fn text(body: impl Into<String>) -> Self {
        let mut msg = Self::new(body.into().into_bytes());
        msg.content_type = Some("text/plain".to_string());
        msg
    }

    /// Create a message from a JSON-serializable value
    pub fn json<T: Serialize>(value: &T) -> Result<Self, MessagingError> {
        let body =
            serde_json::to_vec(value).map_err(|e| MessagingError::Serialization(e.to_string()))?;
        let mut msg = Self::new(body);
        msg.content_type = Some("application/json".to_string());
        Ok(msg)
    }

    /// Parse the body as JSON
    pub fn parse_json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, MessagingError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| MessagingError::Deserialization(e.to_string()))
    }

    /// Get the body as a UTF-8 string
    pub fn body_str(&self) -> Result<&str, MessagingError> {
        std::str::from_utf8(&self.body).map_err(|e| MessagingError::Deserialization(e.to_string()))
    }

    /// Add an application property to the message
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.application_properties.insert(key.into(), value.into());
        self
    }

    /// Set the correlation ID
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Set the reply-to address
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Set the content type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the priority (0-9)
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority.min(9));
        self
    }

    /// Set the time-to-live in milliseconds
    pub fn with_ttl(mut self, ttl_ms: u64) -> Self {
        self.ttl = Some(ttl_ms);
        self
    }

    /// Set the time-to-live from a Duration
    pub fn with_ttl_duration(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl.as_millis() as u64);
        self
    }

    /// Mark the message as durable
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message {{ id: {}, size: {} bytes }}",
            self.id,
            self.body.len()
        )
    }
}

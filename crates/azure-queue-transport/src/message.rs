//! Message types and the identifiers the queue service hands back.

use crate::error::{ArgumentError, ConfigurationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

// ============================================================================
// Core Domain Identifiers
// ============================================================================

/// Validated Azure queue name
///
/// Azure requires 3-63 characters of lowercase letters, digits and hyphens,
/// starting and ending with a letter or digit, with no consecutive hyphens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueName(String);

impl QueueName {
    /// Create new queue name with validation
    pub fn new(name: String) -> Result<Self, ConfigurationError> {
        let invalid = |message: &str| ConfigurationError::Invalid {
            key: "queue_name".to_string(),
            message: message.to_string(),
        };

        if name.len() < 3 || name.len() > 63 {
            return Err(invalid("must be 3-63 characters"));
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(invalid(
                "only lowercase ASCII letters, digits, and hyphens allowed",
            ));
        }

        if name.starts_with('-') || name.ends_with('-') || name.contains("--") {
            return Err(invalid(
                "no leading/trailing hyphens or consecutive hyphens",
            ));
        }

        Ok(Self(name))
    }

    /// Get queue name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueName {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

/// Service-assigned message identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap an identifier issued by a queue service
    pub(crate) fn from_service(id: String) -> Self {
        Self(id)
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ArgumentError::MissingMessageId);
        }

        Ok(Self(s.to_string()))
    }
}

/// Opaque token issued with each delivery, required to delete that delivery
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PopReceipt(String);

impl PopReceipt {
    pub(crate) fn from_service(receipt: String) -> Self {
        Self(receipt)
    }

    /// Get pop receipt as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PopReceipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PopReceipt {
    type Err = ArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ArgumentError::MissingPopReceipt);
        }

        Ok(Self(s.to_string()))
    }
}

/// Handle to one delivery of a message: the id plus the pop receipt that
/// acknowledges it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueReceipt {
    message_id: MessageId,
    pop_receipt: PopReceipt,
}

impl QueueReceipt {
    /// Create new receipt
    pub fn new(message_id: MessageId, pop_receipt: PopReceipt) -> Self {
        Self {
            message_id,
            pop_receipt,
        }
    }

    /// Build a receipt from raw strings, rejecting empty parts
    pub fn parse(message_id: &str, pop_receipt: &str) -> Result<Self, ArgumentError> {
        Ok(Self::new(message_id.parse()?, pop_receipt.parse()?))
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    pub fn pop_receipt(&self) -> &PopReceipt {
        &self.pop_receipt
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// Message headers; order is irrelevant
pub type Headers = HashMap<String, Value>;

/// A message travelling through the transport
///
/// `original` is only populated by the transport after a successful send or
/// receive, so a message built locally can never be deleted by accident.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub body: String,
    pub headers: Headers,
    original: Option<QueueReceipt>,
}

impl Message {
    /// Create new message with body
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            headers: Headers::new(),
            original: None,
        }
    }

    /// Create message from body and headers
    pub fn with_parts(body: impl Into<String>, headers: Headers) -> Self {
        Self {
            body: body.into(),
            headers,
            original: None,
        }
    }

    /// Add a header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Receipt of the send or receive round-trip that produced this message
    pub fn original(&self) -> Option<&QueueReceipt> {
        self.original.as_ref()
    }

    pub(crate) fn with_receipt(mut self, receipt: QueueReceipt) -> Self {
        self.original = Some(receipt);
        self
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;

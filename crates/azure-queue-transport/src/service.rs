//! The queue-service seam the transport talks through.
//!
//! [`QueueService`] mirrors the four REST operations the transport needs.
//! [`AzureQueueClient`](crate::providers::AzureQueueClient) implements it
//! against Azure Queue Storage and
//! [`InMemoryQueueService`](crate::providers::InMemoryQueueService) in
//! process.

use crate::error::ServiceError;
use crate::message::{MessageId, PopReceipt, QueueName, QueueReceipt};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A message as returned by a get-messages call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessageItem {
    pub message_id: MessageId,
    pub pop_receipt: PopReceipt,
    pub message_text: String,
    pub dequeue_count: u32,
    pub expiration_time: Option<DateTime<Utc>>,
    pub time_next_visible: Option<DateTime<Utc>>,
}

impl QueueMessageItem {
    /// Receipt for this delivery
    pub fn receipt(&self) -> QueueReceipt {
        QueueReceipt::new(self.message_id.clone(), self.pop_receipt.clone())
    }
}

/// Result of a put-message call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueuedMessage {
    pub message_id: MessageId,
    pub pop_receipt: PopReceipt,
    pub expiration_time: Option<DateTime<Utc>>,
    pub time_next_visible: Option<DateTime<Utc>>,
}

impl EnqueuedMessage {
    /// Receipt for the enqueued message
    pub fn receipt(&self) -> QueueReceipt {
        QueueReceipt::new(self.message_id.clone(), self.pop_receipt.clone())
    }
}

/// Client for a queue service
///
/// Each method is exactly one request/response round-trip. Implementations
/// report failures as [`ServiceError`] and never retry.
#[async_trait]
pub trait QueueService: Send + Sync {
    /// Create the queue; succeeds if it already exists
    async fn create_queue(&self, queue: &QueueName) -> Result<(), ServiceError>;

    /// Retrieve up to `max_messages` visible messages, hiding them for
    /// `visibility_timeout` seconds (service default when `None`)
    async fn get_messages(
        &self,
        queue: &QueueName,
        visibility_timeout: Option<u32>,
        max_messages: u32,
    ) -> Result<Vec<QueueMessageItem>, ServiceError>;

    /// Enqueue message text, expiring after `time_to_live` seconds (service
    /// default when `None`, never when `-1`)
    async fn put_message(
        &self,
        queue: &QueueName,
        message_text: &str,
        time_to_live: Option<i64>,
    ) -> Result<EnqueuedMessage, ServiceError>;

    /// Delete one delivery of a message
    async fn delete_message(
        &self,
        queue: &QueueName,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
    ) -> Result<(), ServiceError>;
}

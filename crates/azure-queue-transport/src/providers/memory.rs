//! In-memory queue service for testing and development.
//!
//! Models the parts of Azure Queue Storage the transport relies on:
//! - Queues must be created before use
//! - Retrieved messages are hidden for a visibility timeout
//! - Each retrieval issues a fresh pop receipt; deletes must present the latest one
//! - Messages expire after their time-to-live (`-1` never expires)

use crate::error::ServiceError;
use crate::message::{MessageId, PopReceipt, QueueName};
use crate::service::{EnqueuedMessage, QueueMessageItem, QueueService};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use uuid::Uuid;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// Visibility timeout applied when a get-messages call gives none
pub const DEFAULT_VISIBILITY_TIMEOUT_SECONDS: i64 = 30;

/// Time-to-live applied when a put-message call gives none (seven days)
pub const DEFAULT_TIME_TO_LIVE_SECONDS: i64 = 7 * 24 * 60 * 60;

// ============================================================================
// Internal Storage Structures
// ============================================================================

struct StoredMessage {
    message_id: MessageId,
    message_text: String,
    pop_receipt: PopReceipt,
    dequeue_count: u32,
    expiration_time: Option<DateTime<Utc>>,
    time_next_visible: DateTime<Utc>,
}

impl StoredMessage {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_time.is_some_and(|expires| expires <= now)
    }
}

type QueueStorage = HashMap<String, VecDeque<StoredMessage>>;

fn new_pop_receipt() -> PopReceipt {
    PopReceipt::from_service(Uuid::new_v4().to_string())
}

fn status(status: u16, code: &str, message: &str) -> ServiceError {
    ServiceError::Status {
        status,
        code: code.to_string(),
        message: message.to_string(),
    }
}

// ============================================================================
// InMemoryQueueService
// ============================================================================

/// In-memory queue service
///
/// Clones share the same storage.
#[derive(Clone, Default)]
pub struct InMemoryQueueService {
    storage: Arc<RwLock<QueueStorage>>,
}

impl InMemoryQueueService {
    /// Create an empty service with no queues
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unexpired messages in a queue, visible or not
    ///
    /// Returns `None` when the queue does not exist.
    pub fn message_count(&self, queue: &QueueName) -> Option<usize> {
        let now = Utc::now();
        let storage = self.storage.read().unwrap_or_else(PoisonError::into_inner);
        storage
            .get(queue.as_str())
            .map(|messages| messages.iter().filter(|m| !m.is_expired(now)).count())
    }

    fn storage(&self) -> RwLockWriteGuard<'_, QueueStorage> {
        // Every mutation completes under a single guard
        self.storage.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for InMemoryQueueService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let storage = self.storage.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("InMemoryQueueService")
            .field("queues", &storage.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl QueueService for InMemoryQueueService {
    async fn create_queue(&self, queue: &QueueName) -> Result<(), ServiceError> {
        self.storage()
            .entry(queue.as_str().to_string())
            .or_default();
        Ok(())
    }

    async fn get_messages(
        &self,
        queue: &QueueName,
        visibility_timeout: Option<u32>,
        max_messages: u32,
    ) -> Result<Vec<QueueMessageItem>, ServiceError> {
        let now = Utc::now();
        let visibility = visibility_timeout
            .map(i64::from)
            .unwrap_or(DEFAULT_VISIBILITY_TIMEOUT_SECONDS);

        let mut storage = self.storage();
        let messages = storage
            .get_mut(queue.as_str())
            .ok_or_else(|| status(404, "QueueNotFound", "The specified queue does not exist."))?;

        messages.retain(|m| !m.is_expired(now));

        let items = messages
            .iter_mut()
            .filter(|m| m.time_next_visible <= now)
            .take(max_messages as usize)
            .map(|m| {
                m.pop_receipt = new_pop_receipt();
                m.dequeue_count += 1;
                m.time_next_visible = now + Duration::seconds(visibility);

                QueueMessageItem {
                    message_id: m.message_id.clone(),
                    pop_receipt: m.pop_receipt.clone(),
                    message_text: m.message_text.clone(),
                    dequeue_count: m.dequeue_count,
                    expiration_time: m.expiration_time,
                    time_next_visible: Some(m.time_next_visible),
                }
            })
            .collect();

        Ok(items)
    }

    async fn put_message(
        &self,
        queue: &QueueName,
        message_text: &str,
        time_to_live: Option<i64>,
    ) -> Result<EnqueuedMessage, ServiceError> {
        let now = Utc::now();
        let expiration_time = match time_to_live.unwrap_or(DEFAULT_TIME_TO_LIVE_SECONDS) {
            -1 => None,
            ttl if ttl >= 1 => Some(
                Duration::try_seconds(ttl)
                    .and_then(|ttl| now.checked_add_signed(ttl))
                    .ok_or_else(|| {
                        status(
                            400,
                            "OutOfRangeQueryParameterValue",
                            "messagettl is too large.",
                        )
                    })?,
            ),
            _ => {
                return Err(status(
                    400,
                    "OutOfRangeQueryParameterValue",
                    "messagettl must be -1 or a positive number of seconds.",
                ))
            }
        };

        let mut storage = self.storage();
        let messages = storage
            .get_mut(queue.as_str())
            .ok_or_else(|| status(404, "QueueNotFound", "The specified queue does not exist."))?;

        let stored = StoredMessage {
            message_id: MessageId::from_service(Uuid::new_v4().to_string()),
            message_text: message_text.to_string(),
            pop_receipt: new_pop_receipt(),
            dequeue_count: 0,
            expiration_time,
            time_next_visible: now,
        };

        let enqueued = EnqueuedMessage {
            message_id: stored.message_id.clone(),
            pop_receipt: stored.pop_receipt.clone(),
            expiration_time,
            time_next_visible: Some(now),
        };
        messages.push_back(stored);

        Ok(enqueued)
    }

    async fn delete_message(
        &self,
        queue: &QueueName,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
    ) -> Result<(), ServiceError> {
        let now = Utc::now();
        let mut storage = self.storage();
        let messages = storage
            .get_mut(queue.as_str())
            .ok_or_else(|| status(404, "QueueNotFound", "The specified queue does not exist."))?;

        let index = messages
            .iter()
            .position(|m| &m.message_id == message_id && !m.is_expired(now))
            .ok_or_else(|| status(404, "MessageNotFound", "The specified message does not exist."))?;

        if &messages[index].pop_receipt != pop_receipt {
            return Err(status(
                400,
                "PopReceiptMismatch",
                "The specified pop receipt did not match the pop receipt for a dequeued message.",
            ));
        }

        messages.remove(index);
        Ok(())
    }
}

//! # Azure Queue Transport
//!
//! Message-bus transport over Azure Queue Storage.
//!
//! This library provides:
//! - Queue setup, receive, send and delete for a single queue
//! - Versioned JSON envelope or body-only wire encoding, always base64
//! - DSN and storage connection-string parsing
//! - Layered configuration from files and `AZURE_QUEUE__*` environment variables
//! - An in-memory queue service for tests and local development
//!
//! ## Module Organization
//!
//! - [`transport`] - The transport operations
//! - [`codec`] - Wire encoding of messages
//! - [`message`] - Messages, receipts and identifiers
//! - [`connection`] - DSN and connection-string parsing
//! - [`options`] - Options and settings loading
//! - [`service`] - The queue-service trait
//! - [`providers`] - Azure and in-memory queue services
//! - [`error`] - Error types

pub mod codec;
pub mod connection;
pub mod error;
pub mod message;
pub mod options;
pub mod providers;
pub mod service;
pub mod transport;

// Re-export commonly used types at crate root for convenience
pub use codec::WireFormat;
pub use connection::{ConnectionDescriptor, StorageConnectionString};
pub use error::{ArgumentError, ConfigurationError, DecodingError, ServiceError, TransportError};
pub use message::{Headers, Message, MessageId, PopReceipt, QueueName, QueueReceipt};
pub use options::{ReceiveOptions, SettingsOverrides, TransportOptions, TransportSettings};
pub use providers::{AzureQueueClient, InMemoryQueueService};
pub use service::{EnqueuedMessage, QueueMessageItem, QueueService};
pub use transport::{DeleteTarget, QueueTransport, Received, UndecodableMessage};

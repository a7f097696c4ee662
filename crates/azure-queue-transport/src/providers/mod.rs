//! Queue service implementations.

pub mod azure;
pub mod memory;

pub use azure::AzureQueueClient;
pub use memory::InMemoryQueueService;

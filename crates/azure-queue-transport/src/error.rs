//! Error types for transport operations.

use thiserror::Error;

/// Top-level error for every [`QueueTransport`](crate::QueueTransport) operation
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Decoding error: {0}")]
    Decoding(#[from] DecodingError),

    #[error("Invalid argument: {0}")]
    Argument(#[from] ArgumentError),

    #[error("Queue service call '{operation}' on queue '{queue}' failed: {source}")]
    Service {
        operation: &'static str,
        queue: String,
        #[source]
        source: ServiceError,
    },
}

impl TransportError {
    /// Attach call context to a queue service failure
    pub fn service(operation: &'static str, queue: impl Into<String>, source: ServiceError) -> Self {
        Self::Service {
            operation,
            queue: queue.into(),
            source,
        }
    }

    /// The underlying service error, if this failure came from the queue service
    pub fn service_error(&self) -> Option<&ServiceError> {
        match self {
            Self::Service { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("Invalid DSN: {message}")]
    InvalidDsn { message: String },

    #[error("Invalid connection string: {message}")]
    InvalidConnectionString { message: String },

    #[error("Configuration loading failed: {0}")]
    Loading(#[from] config::ConfigError),
}

/// Errors while turning a [`Message`](crate::Message) into queue text or back
#[derive(Debug, Error)]
pub enum DecodingError {
    #[error("Payload is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Payload is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("JSON processing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message body must be a JSON object in body-only mode")]
    BodyNotObject,

    #[error("Reserved key '{key}' must hold a JSON object")]
    InvalidHeaders { key: &'static str },

    #[error("Unsupported envelope version {version}")]
    UnsupportedEnvelopeVersion { version: u32 },
}

/// Caller supplied something the transport cannot act on
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("Message has no queue receipt attached; it was never sent or received")]
    MissingReceipt,

    #[error("Message id must not be empty")]
    MissingMessageId,

    #[error("Pop receipt must not be empty")]
    MissingPopReceipt,
}

/// Failure reported by, or while talking to, the queue service
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("Queue service returned {status}: {code} - {message}")]
    Status {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response from queue service: {0}")]
    InvalidResponse(String),
}

impl ServiceError {
    /// HTTP status reported by the service, when there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Service error code such as `QueueNotFound`
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Status { code, .. } => Some(code),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

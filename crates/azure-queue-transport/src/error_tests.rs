//! Tests for error types.

use super::*;

#[test]
fn test_service_error_accessors() {
    let err = ServiceError::Status {
        status: 404,
        code: "QueueNotFound".to_string(),
        message: "The specified queue does not exist.".to_string(),
    };

    assert_eq!(err.status(), Some(404));
    assert_eq!(err.code(), Some("QueueNotFound"));

    let network = ServiceError::Network("connection reset".to_string());
    assert_eq!(network.status(), None);
    assert_eq!(network.code(), None);
}

#[test]
fn test_transport_error_keeps_call_context() {
    let err = TransportError::service(
        "delete_message",
        "orders",
        ServiceError::Network("timed out".to_string()),
    );

    let text = err.to_string();
    assert!(text.contains("delete_message"));
    assert!(text.contains("orders"));
    assert!(matches!(err.service_error(), Some(ServiceError::Network(_))));
}

#[test]
fn test_conversions_into_transport_error() {
    let err: TransportError = ArgumentError::MissingReceipt.into();
    assert!(matches!(
        err,
        TransportError::Argument(ArgumentError::MissingReceipt)
    ));

    let err: TransportError = DecodingError::BodyNotObject.into();
    assert!(matches!(
        err,
        TransportError::Decoding(DecodingError::BodyNotObject)
    ));

    let err: TransportError = ConfigurationError::Missing {
        key: "queue_name".to_string(),
    }
    .into();
    assert!(err.service_error().is_none());
    assert_eq!(
        err.to_string(),
        "Configuration error: Missing required configuration: queue_name"
    );
}

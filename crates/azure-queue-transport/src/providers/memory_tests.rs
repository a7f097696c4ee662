//! Tests for the in-memory queue service.

use super::*;

fn queue() -> QueueName {
    QueueName::new("orders".to_string()).unwrap()
}

async fn service_with_queue() -> InMemoryQueueService {
    let service = InMemoryQueueService::new();
    service.create_queue(&queue()).await.unwrap();
    service
}

#[tokio::test]
async fn test_operations_on_missing_queue_fail() {
    let service = InMemoryQueueService::new();

    let put = service.put_message(&queue(), "text", None).await.unwrap_err();
    let get = service.get_messages(&queue(), None, 1).await.unwrap_err();

    assert_eq!(put.code(), Some("QueueNotFound"));
    assert_eq!(get.status(), Some(404));
    assert_eq!(service.message_count(&queue()), None);
}

#[tokio::test]
async fn test_create_queue_is_idempotent() {
    let service = service_with_queue().await;
    service.put_message(&queue(), "text", None).await.unwrap();

    service.create_queue(&queue()).await.unwrap();

    assert_eq!(service.message_count(&queue()), Some(1));
}

#[tokio::test]
async fn test_put_then_get_returns_text_in_order() {
    let service = service_with_queue().await;
    service.put_message(&queue(), "first", None).await.unwrap();
    service.put_message(&queue(), "second", None).await.unwrap();

    let messages = service.get_messages(&queue(), None, 32).await.unwrap();

    let texts: Vec<_> = messages.iter().map(|m| m.message_text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);
    assert!(messages.iter().all(|m| m.dequeue_count == 1));
}

#[tokio::test]
async fn test_get_respects_max_messages() {
    let service = service_with_queue().await;
    for text in ["a", "b", "c"] {
        service.put_message(&queue(), text, None).await.unwrap();
    }

    let messages = service.get_messages(&queue(), None, 2).await.unwrap();

    assert_eq!(messages.len(), 2);
}

#[tokio::test]
async fn test_retrieved_messages_are_hidden() {
    let service = service_with_queue().await;
    service.put_message(&queue(), "text", None).await.unwrap();

    let first = service.get_messages(&queue(), Some(60), 1).await.unwrap();
    let second = service.get_messages(&queue(), Some(60), 1).await.unwrap();

    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
    assert_eq!(service.message_count(&queue()), Some(1));
}

#[tokio::test]
async fn test_zero_visibility_timeout_redelivers_with_new_pop_receipt() {
    let service = service_with_queue().await;
    service.put_message(&queue(), "text", None).await.unwrap();

    let first = service.get_messages(&queue(), Some(0), 1).await.unwrap();
    let second = service.get_messages(&queue(), Some(0), 1).await.unwrap();

    assert_eq!(first[0].message_id, second[0].message_id);
    assert_ne!(first[0].pop_receipt, second[0].pop_receipt);
    assert_eq!(second[0].dequeue_count, 2);
}

#[tokio::test]
async fn test_delete_with_current_pop_receipt_removes_message() {
    let service = service_with_queue().await;
    service.put_message(&queue(), "text", None).await.unwrap();
    let received = service.get_messages(&queue(), None, 1).await.unwrap();

    service
        .delete_message(&queue(), &received[0].message_id, &received[0].pop_receipt)
        .await
        .unwrap();

    assert_eq!(service.message_count(&queue()), Some(0));
}

#[tokio::test]
async fn test_delete_with_receipt_from_put_succeeds() {
    let service = service_with_queue().await;
    let enqueued = service.put_message(&queue(), "text", None).await.unwrap();

    service
        .delete_message(&queue(), &enqueued.message_id, &enqueued.pop_receipt)
        .await
        .unwrap();

    assert_eq!(service.message_count(&queue()), Some(0));
}

#[tokio::test]
async fn test_delete_with_stale_pop_receipt_fails() {
    let service = service_with_queue().await;
    let enqueued = service.put_message(&queue(), "text", None).await.unwrap();
    service.get_messages(&queue(), Some(0), 1).await.unwrap();

    let error = service
        .delete_message(&queue(), &enqueued.message_id, &enqueued.pop_receipt)
        .await
        .unwrap_err();

    assert_eq!(error.status(), Some(400));
    assert_eq!(error.code(), Some("PopReceiptMismatch"));
}

#[tokio::test]
async fn test_delete_unknown_message_fails() {
    let service = service_with_queue().await;

    let error = service
        .delete_message(&queue(), &"42".parse().unwrap(), &"abc".parse().unwrap())
        .await
        .unwrap_err();

    assert_eq!(error.code(), Some("MessageNotFound"));
}

#[tokio::test]
async fn test_time_to_live_controls_expiration() {
    let service = service_with_queue().await;

    let forever = service.put_message(&queue(), "a", Some(-1)).await.unwrap();
    let defaulted = service.put_message(&queue(), "b", None).await.unwrap();

    assert!(forever.expiration_time.is_none());
    let remaining = defaulted.expiration_time.unwrap() - Utc::now();
    assert!(remaining > Duration::days(6));
}

#[tokio::test]
async fn test_invalid_time_to_live_is_rejected() {
    let service = service_with_queue().await;

    let error = service.put_message(&queue(), "a", Some(0)).await.unwrap_err();

    assert_eq!(error.status(), Some(400));
}

#[tokio::test]
async fn test_clones_share_storage() {
    let service = service_with_queue().await;
    let clone = service.clone();

    clone.put_message(&queue(), "text", None).await.unwrap();

    assert_eq!(service.message_count(&queue()), Some(1));
}

#[tokio::test]
async fn test_time_to_live_beyond_calendar_range_is_rejected() {
    let service = service_with_queue().await;

    for ttl in [20_000_000_000_000, i64::MAX] {
        let error = service.put_message(&queue(), "a", Some(ttl)).await.unwrap_err();

        assert_eq!(error.status(), Some(400));
        assert_eq!(error.code(), Some("OutOfRangeQueryParameterValue"));
    }
    assert_eq!(service.message_count(&queue()), Some(0));
}

mod common;

use atlaseats_backend::gateways::types::{GatewayCode, TransactionStatus};
use atlaseats_backend::security::audit::{AuditContext, AuditStatus};
use atlaseats_backend::services::payment_orchestrator::CreatePayment;
use atlaseats_backend::services::webhook_processor::CallbackError;
use bigdecimal::BigDecimal;
use chrono::Utc;
use common::*;

fn callback_body(external_id: &str, status: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "transaction_id": external_id,
        "status": status,
        "amount": "150",
        "merchant_id": TEST_MERCHANT,
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .unwrap()
}

async fn processing_transaction(h: &Harness) -> uuid::Uuid {
    h.orders.put(order("O1", 150));
    let result = h
        .orchestrator
        .create_payment(
            CreatePayment {
                order_id: "O1".to_string(),
                amount: BigDecimal::from(150),
                currency: "MAD".to_string(),
                provider_code: "orange_money".to_string(),
                phone_number: Some("+212661234567".to_string()),
                customer_name: None,
                description: None,
            },
            &AuditContext::default(),
        )
        .await
        .expect("create should succeed");
    result.transaction_id.unwrap()
}

#[tokio::test]
async fn success_callback_completes_the_transaction() {
    let h = harness(MockGateway::acknowledging(
        GatewayCode::OrangeMoney,
        "EXT-1",
    ));
    let id = processing_transaction(&h).await;

    let outcome = h
        .processor
        .process_callback(
            "orange_money",
            &callback_body("EXT-1", "SUCCESS"),
            None,
            &AuditContext::default(),
        )
        .await
        .expect("callback should be accepted");

    assert!(outcome.applied);
    assert_eq!(outcome.previous_status, TransactionStatus::Processing);
    assert_eq!(outcome.new_status, TransactionStatus::Completed);

    let stored = h.store.get(id).unwrap();
    assert_eq!(stored.status, TransactionStatus::Completed);
    assert!(stored.callback_data.is_some());
    assert_eq!(h.rewards.loyalty_count(), 1);
    assert_eq!(h.rewards.promotion_count(), 1);
}

#[tokio::test]
async fn replayed_callback_is_a_no_op_without_duplicate_rewards() {
    let h = harness(MockGateway::acknowledging(
        GatewayCode::OrangeMoney,
        "EXT-1",
    ));
    let id = processing_transaction(&h).await;
    let body = callback_body("EXT-1", "SUCCESS");

    let first = h
        .processor
        .process_callback("orange_money", &body, None, &AuditContext::default())
        .await
        .unwrap();
    assert!(first.applied);

    let second = h
        .processor
        .process_callback("orange_money", &body, None, &AuditContext::default())
        .await
        .expect("replay must not error");
    assert!(!second.applied);
    assert_eq!(second.new_status, TransactionStatus::Completed);

    assert_eq!(h.store.get(id).unwrap().status, TransactionStatus::Completed);
    assert_eq!(h.rewards.loyalty_count(), 1);
    assert_eq!(h.rewards.promotion_count(), 1);
}

#[tokio::test]
async fn failure_callback_cannot_resurrect_a_completed_transaction() {
    let h = harness(MockGateway::acknowledging(
        GatewayCode::OrangeMoney,
        "EXT-1",
    ));
    let id = processing_transaction(&h).await;

    h.processor
        .process_callback(
            "orange_money",
            &callback_body("EXT-1", "SUCCESS"),
            None,
            &AuditContext::default(),
        )
        .await
        .unwrap();

    let outcome = h
        .processor
        .process_callback(
            "orange_money",
            &callback_body("EXT-1", "FAILED"),
            None,
            &AuditContext::default(),
        )
        .await
        .expect("late failure callback is ignored, not an error");

    assert!(!outcome.applied);
    assert_eq!(h.store.get(id).unwrap().status, TransactionStatus::Completed);
}

#[tokio::test]
async fn unknown_external_id_is_rejected_with_one_failure_audit_entry() {
    let h = harness(MockGateway::acknowledging(
        GatewayCode::OrangeMoney,
        "EXT-1",
    ));
    let id = processing_transaction(&h).await;

    let err = h
        .processor
        .process_callback(
            "orange_money",
            &callback_body("EXT-UNKNOWN", "SUCCESS"),
            None,
            &AuditContext::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CallbackError::TransactionNotFound(_)));
    // No transaction was mutated.
    assert_eq!(h.store.get(id).unwrap().status, TransactionStatus::Processing);
    // Exactly one failure entry on the audit trail.
    let failures = h
        .validator
        .trail()
        .recent(100)
        .into_iter()
        .filter(|e| e.status == AuditStatus::Failure)
        .count();
    assert_eq!(failures, 1);
}

#[tokio::test]
async fn structurally_invalid_callback_never_touches_state() {
    let h = harness(MockGateway::acknowledging(
        GatewayCode::OrangeMoney,
        "EXT-1",
    ));
    let id = processing_transaction(&h).await;

    let body = serde_json::to_vec(&serde_json::json!({
        "status": "SUCCESS",
        "amount": "150",
        // wrong merchant, missing transaction_id
        "merchant_id": "M-OTHER",
    }))
    .unwrap();

    let err = h
        .processor
        .process_callback("orange_money", &body, None, &AuditContext::default())
        .await
        .unwrap_err();

    assert!(matches!(err, CallbackError::InvalidPayload(_)));
    assert_eq!(h.store.get(id).unwrap().status, TransactionStatus::Processing);
    assert_eq!(h.rewards.loyalty_count(), 0);
}

#[tokio::test]
async fn invalid_signature_is_a_hard_rejection() {
    let h = harness(MockGateway::signing(GatewayCode::OrangeMoney, "EXT-1"));
    let id = processing_transaction(&h).await;

    let err = h
        .processor
        .process_callback(
            "orange_money",
            &callback_body("EXT-1", "SUCCESS"),
            Some("forged-signature"),
            &AuditContext::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CallbackError::SecurityRejected(_)));
    assert_eq!(h.store.get(id).unwrap().status, TransactionStatus::Processing);
}

#[tokio::test]
async fn missing_signature_on_signing_gateway_is_only_a_warning() {
    let h = harness(MockGateway::signing(GatewayCode::OrangeMoney, "EXT-1"));
    let id = processing_transaction(&h).await;

    let outcome = h
        .processor
        .process_callback(
            "orange_money",
            &callback_body("EXT-1", "SUCCESS"),
            None,
            &AuditContext::default(),
        )
        .await
        .expect("missing signature downgrades to a warning");

    assert!(outcome.applied);
    assert_eq!(h.store.get(id).unwrap().status, TransactionStatus::Completed);
}

#[tokio::test]
async fn valid_signature_is_accepted() {
    let h = harness(MockGateway::signing(GatewayCode::OrangeMoney, "EXT-1"));
    processing_transaction(&h).await;

    let outcome = h
        .processor
        .process_callback(
            "orange_money",
            &callback_body("EXT-1", "SUCCESS"),
            Some("valid-signature"),
            &AuditContext::default(),
        )
        .await
        .unwrap();
    assert!(outcome.applied);
}

#[tokio::test]
async fn unknown_provider_code_is_rejected() {
    let h = harness(MockGateway::acknowledging(
        GatewayCode::OrangeMoney,
        "EXT-1",
    ));

    let err = h
        .processor
        .process_callback(
            "mpesa",
            &callback_body("EXT-1", "SUCCESS"),
            None,
            &AuditContext::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CallbackError::UnknownProvider(_)));
}

#[tokio::test]
async fn unknown_native_status_maps_to_pending_and_never_completes() {
    let h = harness(MockGateway::acknowledging(
        GatewayCode::OrangeMoney,
        "EXT-1",
    ));
    let id = processing_transaction(&h).await;

    let outcome = h
        .processor
        .process_callback(
            "orange_money",
            &callback_body("EXT-1", "SETTLEMENT_DELAYED"),
            None,
            &AuditContext::default(),
        )
        .await
        .expect("unknown status is conservative, not an error");

    // Pending is unreachable from processing, so nothing changes.
    assert!(!outcome.applied);
    assert_eq!(h.store.get(id).unwrap().status, TransactionStatus::Processing);
    assert_eq!(h.rewards.loyalty_count(), 0);
}

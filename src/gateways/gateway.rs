use crate::gateways::error::GatewayResult;
use crate::gateways::types::{
    CallbackValidation, CancellationOutcome, ChargeRequest, ChargeResponse, GatewayCode,
    GatewayStatus, TransactionStatus,
};
use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// Contract every mobile-money gateway adapter implements.
///
/// Adapters own their gateway's HTTP shape, signing scheme and phone-number
/// format. They never mutate persisted state; the orchestrator is the single
/// writer for transactions.
#[async_trait]
pub trait MobileMoneyGateway: Send + Sync {
    fn code(&self) -> GatewayCode;

    /// Initiate a payment. Malformed phone numbers are rejected locally
    /// before any network call.
    async fn create_payment(&self, request: &ChargeRequest) -> GatewayResult<ChargeResponse>;

    async fn check_status(&self, external_id: &str) -> GatewayResult<GatewayStatus>;

    /// Best-effort cancellation. Gateways without a real cancellation API
    /// report success with an explanatory message; local state stays
    /// authoritative either way.
    async fn cancel(&self, external_id: &str) -> GatewayResult<CancellationOutcome>;

    /// Structural check of an inbound callback: required fields, merchant
    /// identity, amount parseability. Signature and replay checks belong to
    /// the security validator.
    fn validate_callback_data(&self, payload: &JsonValue) -> CallbackValidation;

    /// Per-gateway native status table. `None` for vocabulary the adapter
    /// does not recognize.
    fn map_native_status(&self, native_status: &str) -> Option<TransactionStatus>;

    /// Unrecognized native statuses fall back to `Pending`, never to a
    /// terminal status.
    fn map_callback_status(&self, native_status: &str) -> TransactionStatus {
        self.map_native_status(native_status)
            .unwrap_or(TransactionStatus::Pending)
    }

    fn supports_signatures(&self) -> bool;

    fn verify_signature(&self, payload: &[u8], signature: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use uuid::Uuid;

    struct MockGateway;

    #[async_trait]
    impl MobileMoneyGateway for MockGateway {
        fn code(&self) -> GatewayCode {
            GatewayCode::OrangeMoney
        }

        async fn create_payment(&self, request: &ChargeRequest) -> GatewayResult<ChargeResponse> {
            request.validate_amount()?;
            Ok(ChargeResponse {
                external_transaction_id: Some(format!("MOCK-{}", request.transaction_id)),
                status: TransactionStatus::Processing,
                message: "payment request accepted".to_string(),
                redirect_url: Some("https://pay.example.com/mock".to_string()),
                callback_data: None,
            })
        }

        async fn check_status(&self, _external_id: &str) -> GatewayResult<GatewayStatus> {
            Ok(GatewayStatus {
                status: TransactionStatus::Completed,
                message: "paid".to_string(),
                amount: Some(BigDecimal::from(150)),
                transaction_date: None,
            })
        }

        async fn cancel(&self, _external_id: &str) -> GatewayResult<CancellationOutcome> {
            Ok(CancellationOutcome {
                success: true,
                message: "cancelled".to_string(),
            })
        }

        fn validate_callback_data(&self, _payload: &JsonValue) -> CallbackValidation {
            CallbackValidation {
                is_valid: true,
                external_transaction_id: Some("MOCK-1".to_string()),
                native_status: Some("SUCCESS".to_string()),
                amount: Some(BigDecimal::from(150)),
                errors: vec![],
            }
        }

        fn map_native_status(&self, native_status: &str) -> Option<TransactionStatus> {
            match native_status {
                "SUCCESS" => Some(TransactionStatus::Completed),
                "FAILED" => Some(TransactionStatus::Failed),
                _ => None,
            }
        }

        fn supports_signatures(&self) -> bool {
            false
        }

        fn verify_signature(&self, _payload: &[u8], _signature: &str) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn trait_can_be_implemented_by_mock_gateway() {
        let gateway: Box<dyn MobileMoneyGateway> = Box::new(MockGateway);
        let response = gateway
            .create_payment(&ChargeRequest {
                transaction_id: Uuid::new_v4(),
                order_id: "O1".to_string(),
                amount: BigDecimal::from(150),
                currency: "MAD".to_string(),
                phone_number: Some("+212661234567".to_string()),
                customer_name: Some("Amine".to_string()),
                description: "Order O1".to_string(),
            })
            .await
            .expect("charge should succeed");
        assert_eq!(response.status, TransactionStatus::Processing);
        assert!(response.external_transaction_id.is_some());
    }

    #[test]
    fn unknown_native_status_maps_to_pending() {
        let gateway = MockGateway;
        assert_eq!(
            gateway.map_callback_status("SOMETHING_NEW"),
            TransactionStatus::Pending
        );
        assert_eq!(
            gateway.map_callback_status("SUCCESS"),
            TransactionStatus::Completed
        );
    }
}

use crate::database::transaction_repository::PaymentTransaction;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NotificationType {
    PaymentCompleted,
    PaymentFailed,
    PaymentCancelled,
}

pub struct NotificationService;

impl NotificationService {
    pub fn new() -> Self {
        Self
    }

    pub async fn send_status_notification(
        &self,
        tx: &PaymentTransaction,
        notification_type: NotificationType,
        message: &str,
    ) {
        // Placeholder for the template delivery pipeline (SMS, push, email).
        // For now, we just log it with a structured format.
        match notification_type {
            NotificationType::PaymentCompleted => {
                info!(
                    transaction_id = %tx.id,
                    order_id = %tx.order_id,
                    amount = %tx.amount,
                    currency = %tx.currency,
                    "🔔 NOTIFICATION: Payment Completed - {}", message
                );
            }
            NotificationType::PaymentFailed => {
                error!(
                    transaction_id = %tx.id,
                    order_id = %tx.order_id,
                    "🔔 NOTIFICATION: Payment Failed - {}", message
                );
            }
            NotificationType::PaymentCancelled => {
                info!(
                    transaction_id = %tx.id,
                    order_id = %tx.order_id,
                    "🔔 NOTIFICATION: Payment Cancelled - {}", message
                );
            }
        }
    }
}

impl Default for NotificationService {
    fn default() -> Self {
        Self::new()
    }
}
